// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod bus;
mod channel;
mod stubs;
mod types;

pub use bus::ChannelBus;
pub use channel::Channel;
pub use types::{InboundMessage, OutboundMessage};

#[cfg(feature = "telegram")]
pub use stubs::TelegramChannel;
#[cfg(feature = "discord")]
pub use stubs::DiscordChannel;
