// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The confirmation gate: when the model proposes a destructive tool call,
//! the turn stops short of executing it and records a [`PendingConfirmation`]
//! keyed by session. The *next* turn on that session checks the user's reply
//! against the confirm/cancel lexeme lists before ever consulting the model
//! again - this is the one branch of the agent loop that has no LLM round
//! trip at all.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub tool_name: String,
    pub parameters: Value,
    pub created_at: DateTime<Utc>,
}

/// What the user's reply to a pending confirmation resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    Cancelled,
    /// Input matched neither lexeme list, or no confirmation was pending.
    NotApplicable,
    /// A confirmation was pending but its TTL had already elapsed; it was
    /// discarded and the turn should proceed normally, consulting the LLM.
    Expired,
}

/// Per-sessionKey store of at-most-one pending confirmation each.
pub struct ConfirmationStore {
    ttl_secs: u64,
    confirm_lexemes: Vec<String>,
    cancel_lexemes: Vec<String>,
    pending: Mutex<HashMap<String, PendingConfirmation>>,
}

impl ConfirmationStore {
    pub fn new(ttl_secs: u64, confirm_lexemes: Vec<String>, cancel_lexemes: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            ttl_secs,
            confirm_lexemes: confirm_lexemes.into_iter().map(|s| s.to_lowercase()).collect(),
            cancel_lexemes: cancel_lexemes.into_iter().map(|s| s.to_lowercase()).collect(),
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub async fn set(&self, session_key: &str, tool_name: String, parameters: Value) {
        let mut pending = self.pending.lock().await;
        pending.insert(session_key.to_string(), PendingConfirmation { tool_name, parameters, created_at: Utc::now() });
    }

    fn is_expired(&self, entry: &PendingConfirmation) -> bool {
        (Utc::now() - entry.created_at).num_seconds() as u64 > self.ttl_secs
    }

    /// Consume whatever pending confirmation exists for `session_key`, if
    /// any, classifying `user_input` against the lexeme lists. Returns the
    /// outcome and, on `Confirmed`/`Cancelled`, the consumed entry.
    pub async fn resolve(&self, session_key: &str, user_input: &str) -> (ConfirmationOutcome, Option<PendingConfirmation>) {
        let mut pending = self.pending.lock().await;
        let Some(entry) = pending.get(session_key).cloned() else {
            return (ConfirmationOutcome::NotApplicable, None);
        };

        if self.is_expired(&entry) {
            pending.remove(session_key);
            return (ConfirmationOutcome::Expired, None);
        }

        let normalized = user_input.trim().to_lowercase();
        if self.confirm_lexemes.iter().any(|l| l == &normalized) {
            pending.remove(session_key);
            return (ConfirmationOutcome::Confirmed, Some(entry));
        }
        if self.cancel_lexemes.iter().any(|l| l == &normalized) {
            pending.remove(session_key);
            return (ConfirmationOutcome::Cancelled, Some(entry));
        }
        (ConfirmationOutcome::NotApplicable, None)
    }
}
