// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Gateway startup — binds the WebSocket JSON-RPC listener and serves it
//! until shutdown.
//!
//! # Startup sequence
//!
//! 1. Build [`GatewayState`] from configuration plus the already-constructed
//!    [`SupervisorAgent`] and [`SessionStore`] (both owned by the caller;
//!    this crate only wires them onto the wire protocol).
//! 2. Build the axum [`Router`]: a single WebSocket upgrade route plus the
//!    security-header and CSRF middleware.
//! 3. Bind `host:port` and serve with `axum::serve`, blocking until the
//!    process is asked to shut down.

use std::{
    net::SocketAddr,
    sync::{atomic::AtomicUsize, Arc},
};

use axum::{routing::get, Router};
use tracing::info;

use conduit_config::GatewayConfig;
use conduit_core::SupervisorAgent;
use conduit_session::SessionStore;

use crate::auth::AuthState;
use crate::http::security::{csrf_guard, security_headers};
use crate::ws::ws_handler;

/// Shared state threaded through every connection handler.
pub struct GatewayState {
    pub agent: Arc<SupervisorAgent>,
    pub sessions: Arc<SessionStore>,
    pub config: GatewayConfig,
    pub auth: AuthState,
    pub connections: AtomicUsize,
}

impl GatewayState {
    /// Attempt to register a new connection against `max_connections`.
    /// Returns `false` if the gateway is already at capacity, in which
    /// case the caller must close the socket with WebSocket status 1013.
    pub fn try_acquire_connection(&self) -> bool {
        use std::sync::atomic::Ordering;
        loop {
            let current = self.connections.load(Ordering::SeqCst);
            if current >= self.config.max_connections {
                return false;
            }
            if self
                .connections
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release_connection(&self) {
        use std::sync::atomic::Ordering;
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The assembled gateway, ready to serve.
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, agent: Arc<SupervisorAgent>, sessions: Arc<SessionStore>) -> Self {
        let auth = AuthState::new(
            config.auth_token.clone(),
            config.auth_failures_per_minute,
            config.auth_failure_burst,
        );
        let state = Arc::new(GatewayState {
            agent,
            sessions,
            config,
            auth,
            connections: AtomicUsize::new(0),
        });
        Self { state }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .layer(axum::middleware::from_fn(csrf_guard))
            .layer(axum::middleware::from_fn(security_headers))
            .with_state(self.state.clone())
    }

    /// Bind and serve. Blocks until the listener errors or the process is
    /// terminated.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.state.config.host, self.state.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, max_connections = self.state.config.max_connections, "gateway listening");
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
        Ok(())
    }
}
