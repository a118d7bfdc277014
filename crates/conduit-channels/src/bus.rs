// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use conduit_config::ChannelsConfig;
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::{InboundMessage, OutboundMessage};

const DEFAULT_CAPACITY: usize = 256;

/// Pub/sub bus between channel adapters and the agent layer.
///
/// Inbound messages are filtered through a per-channel allow-list before
/// being broadcast: a sender not on the list for their channel is dropped
/// silently (no error surfaced to the sender) and counted, never delivered
/// to any subscriber. Each subscriber receives its own [`broadcast::Receiver`],
/// so delivery is at-most-once per subscriber - a slow subscriber can lag
/// and miss messages, but never sees the same message twice.
pub struct ChannelBus {
    allow_lists: HashMap<String, Vec<String>>,
    inbound_tx: broadcast::Sender<InboundMessage>,
    outbound_tx: broadcast::Sender<OutboundMessage>,
    dropped: Mutex<HashMap<String, AtomicU64>>,
}

impl ChannelBus {
    pub fn new(config: ChannelsConfig) -> Self {
        let (inbound_tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            allow_lists: config.allow_lists,
            inbound_tx,
            outbound_tx,
            dropped: Mutex::new(HashMap::new()),
        }
    }

    fn is_allowed(&self, channel: &str, from: &str) -> bool {
        match self.allow_lists.get(channel) {
            None => true,
            Some(list) if list.is_empty() => true,
            Some(list) => list.iter().any(|peer| peer == from),
        }
    }

    fn record_drop(&self, channel: &str) {
        let mut dropped = self.dropped.lock().unwrap();
        dropped.entry(channel.to_string()).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::Relaxed);
    }

    /// Number of inbound messages silently dropped for a channel due to the
    /// allow-list, since this bus was created.
    pub fn dropped_count(&self, channel: &str) -> u64 {
        self.dropped.lock().unwrap().get(channel).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Publish an inbound message, subject to the channel's allow-list.
    /// Returns `true` if it was accepted and broadcast, `false` if it was
    /// dropped. Broadcasting to zero subscribers is not an error.
    pub fn publish_inbound(&self, message: InboundMessage) -> bool {
        if !self.is_allowed(&message.channel, &message.from) {
            warn!(channel = %message.channel, from = %message.from, "dropping inbound message: sender not on allow-list");
            self.record_drop(&message.channel);
            return false;
        }
        let _ = self.inbound_tx.send(message);
        true
    }

    pub fn subscribe_inbound(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound_tx.subscribe()
    }

    pub fn publish_outbound(&self, message: OutboundMessage) {
        let _ = self.outbound_tx.send(message);
    }

    pub fn subscribe_outbound(&self) -> broadcast::Receiver<OutboundMessage> {
        self.outbound_tx.subscribe()
    }
}
