// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! WebSocket JSON-RPC 2.0 gateway for conduit.
//!
//! Bridges the wire protocol (one connection, one JSON text frame per
//! request/response/event) onto [`conduit_core::SupervisorAgent`] and
//! [`conduit_session::SessionStore`]. Everything else — the model, the
//! tools, the memory system, the delivery queue, the channel bus — is
//! assembled by the caller and handed in already constructed; this crate
//! only owns the socket.

mod auth;
mod gateway;
mod http;
mod rpc;
mod token;
mod ws;

pub use auth::{AuthResult, AuthState};
pub use gateway::{Gateway, GatewayState};
pub use token::generate as generate_token;
