// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bearer-token authentication and per-IP rate limiting of failed attempts.
//!
//! # Token check
//!
//! The configured token (`gateway.auth_token`, `None` disables auth
//! entirely) is compared against the caller-supplied token in constant time
//! via [`subtle::ConstantTimeEq`], so a timing side channel can't be used to
//! recover it a byte at a time.
//!
//! # Rate limiting
//!
//! Uses `governor` (GCRA algorithm) keyed by peer IP. Only failed attempts
//! consume a rate-limit token — legitimate, already-authenticated traffic is
//! never throttled by its own volume. Loopback addresses are exempt, since a
//! process with loopback access already has local access to the machine.

use std::{
    net::{IpAddr, Ipv4Addr},
    num::NonZeroU32,
    sync::Arc,
};

use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use subtle::ConstantTimeEq;
use tracing::warn;

type IpLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Shared auth state: the configured token (if any) plus the failed-attempt
/// limiter.
pub struct AuthState {
    token: Option<String>,
    limiter: Arc<IpLimiter>,
}

impl AuthState {
    pub fn new(token: Option<String>, max_per_minute: u32, burst: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(max_per_minute.max(1)).unwrap())
            .allow_burst(NonZeroU32::new(burst.max(1)).unwrap());
        Self { token, limiter: Arc::new(RateLimiter::keyed(quota)) }
    }

    /// Whether auth is required at all. `chat.send`/etc still require a
    /// matching token when this is true; `health` never does.
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Verify `provided` against the configured token. When no token is
    /// configured, every request is accepted (local development mode).
    /// Loopback callers bypass rate limiting; everyone else is locked out
    /// for the remainder of the current quota window after repeated
    /// failures.
    pub fn verify(&self, ip: IpAddr, provided: Option<&str>) -> AuthResult {
        let Some(expected) = &self.token else {
            return AuthResult::Ok;
        };

        if let Some(provided) = provided {
            if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
                return AuthResult::Ok;
            }
        }

        if !is_loopback(ip) && self.limiter.check_key(&ip).is_err() {
            warn!(%ip, "rate limit exceeded after repeated auth failures");
            return AuthResult::RateLimited;
        }
        warn!(%ip, "authentication failed");
        AuthResult::Unauthorized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Ok,
    Unauthorized,
    RateLimited,
}

/// Extract a bearer token from a `Bearer <token>` `Authorization` header
/// value.
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST,
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn remote() -> IpAddr {
        "203.0.113.7".parse().unwrap()
    }

    #[test]
    fn no_token_configured_accepts_anything() {
        let auth = AuthState::new(None, 5, 2);
        assert!(!auth.enabled());
        assert_eq!(auth.verify(remote(), None), AuthResult::Ok);
    }

    #[test]
    fn matching_token_is_accepted() {
        let auth = AuthState::new(Some("secret".into()), 5, 2);
        assert!(auth.enabled());
        assert_eq!(auth.verify(remote(), Some("secret")), AuthResult::Ok);
    }

    #[test]
    fn mismatched_token_is_rejected() {
        let auth = AuthState::new(Some("secret".into()), 5, 2);
        assert_eq!(auth.verify(remote(), Some("wrong")), AuthResult::Unauthorized);
    }

    #[test]
    fn missing_token_is_rejected() {
        let auth = AuthState::new(Some("secret".into()), 5, 2);
        assert_eq!(auth.verify(remote(), None), AuthResult::Unauthorized);
    }

    #[test]
    fn repeated_failures_trigger_rate_limit() {
        let auth = AuthState::new(Some("secret".into()), 2, 1);
        let ip = remote();
        let mut saw_rate_limited = false;
        for _ in 0..10 {
            if auth.verify(ip, Some("wrong")) == AuthResult::RateLimited {
                saw_rate_limited = true;
                break;
            }
        }
        assert!(saw_rate_limited);
    }

    #[test]
    fn loopback_is_exempt_from_rate_limiting() {
        let auth = AuthState::new(Some("secret".into()), 1, 1);
        for _ in 0..20 {
            assert_eq!(auth.verify(loopback(), Some("wrong")), AuthResult::Unauthorized);
        }
    }

    #[test]
    fn strip_bearer_parses_header() {
        assert_eq!(strip_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(strip_bearer("Basic xyz"), None);
    }
}
