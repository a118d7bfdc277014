// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bearer token generation.
//!
//! The token itself lives in configuration (`GATEWAY_AUTH_TOKEN` / the
//! loaded `gateway.auth_token`), not on a separate disk file — this module
//! only generates fresh random tokens for an operator to place there, via
//! the `conduit gateway token regenerate` command.

use rand::RngCore;

/// Generate a new random bearer token, hex-encoded.
///
/// 32 bytes of CSPRNG output, ample margin against brute force given the
/// gateway's own per-IP failed-auth lockout (see [`crate::auth`]).
pub fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_64_hex_chars() {
        let t = generate();
        assert_eq!(t.len(), 64);
        assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_is_not_deterministic() {
        assert_ne!(generate(), generate());
    }
}
