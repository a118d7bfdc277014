// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Concrete channel backends. Gated behind Cargo features so the dependency
//! stack only pulls in `teloxide`/`serenity` when actually requested; neither
//! backend is wired up to a live API here, only the `Channel` contract.

use crate::channel::Channel;
use crate::types::OutboundMessage;

#[cfg(feature = "telegram")]
pub struct TelegramChannel;

#[cfg(feature = "telegram")]
#[async_trait::async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, _message: &OutboundMessage) -> anyhow::Result<()> {
        anyhow::bail!("telegram channel is not built in this configuration")
    }
}

#[cfg(feature = "discord")]
pub struct DiscordChannel;

#[cfg(feature = "discord")]
#[async_trait::async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, _message: &OutboundMessage) -> anyhow::Result<()> {
        anyhow::bail!("discord channel is not built in this configuration")
    }
}
