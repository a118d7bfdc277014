// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message arriving from an external channel, addressed to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    pub channel: String,
    pub from: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), from: from.into(), text: text.into(), received_at: Utc::now() }
    }
}

/// A message to be sent out through a channel to a specific peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub channel: String,
    pub to: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), to: to.into(), text: text.into() }
    }
}
