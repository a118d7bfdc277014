// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::types::OutboundMessage;

/// A concrete transport (Telegram, Discord, ...) plugged into the bus.
///
/// `name()` must match the `channel` field used on `InboundMessage`/
/// `OutboundMessage` so the bus can route between the two.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Hand a message to the transport. Errors are transport-level (the
    /// bus itself never retries - retryable outbound delivery lives in
    /// the delivery queue, one layer up).
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
