// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single outbound delivery sitting in the on-disk queue.
///
/// Persisted as one JSON file per delivery under `queue_dir`. The file's
/// name (not its content) is the source of truth for the delivery id, so
/// `id` is duplicated inside the body only for convenience when loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedDelivery {
    pub id: Uuid,
    pub channel: String,
    pub to: String,
    pub text: String,
    pub agent_id: String,
    pub session_key: String,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub next_retry_at: DateTime<Utc>,
}

impl QueuedDelivery {
    pub fn new(channel: impl Into<String>, to: impl Into<String>, text: impl Into<String>, agent_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            to: to.into(),
            text: text.into(),
            agent_id: agent_id.into(),
            session_key: session_key.into(),
            retry_count: 0,
            max_retries: 5,
            last_error: None,
            enqueued_at: now,
            next_retry_at: now,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at <= now
    }

    /// Record a failed delivery attempt: bump the retry count, stash the
    /// error, and schedule the next attempt per the given backoff schedule.
    pub fn record_failure(&mut self, error: impl Into<String>, backoff_schedule_secs: &[i64]) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.next_retry_at = Utc::now() + crate::backoff::delay_for(self.retry_count, backoff_schedule_secs);
    }
}

/// Outcome of attempting to hand a delivery to its channel.
pub enum DeliveryOutcome {
    Delivered,
    /// Transient failure; worth retrying per the backoff schedule.
    Retryable(String),
    /// The delivery itself is invalid and retrying will never succeed
    /// (e.g. unknown recipient) - sent straight to the dead-letter queue.
    Permanent(String),
}

/// Per-channel delivery attempt. Implemented by whatever owns the actual
/// transport (a channel bus, an HTTP client, ...).
#[async_trait::async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn deliver(&self, delivery: &QueuedDelivery) -> DeliveryOutcome;
}
