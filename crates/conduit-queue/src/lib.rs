// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Crash-safe at-least-once delivery queue.
//!
//! Pending deliveries live as individual JSON files on disk so the queue
//! survives a process restart with no implicit reordering. A single worker
//! scans the directory on a fixed interval, retrying failed deliveries with
//! exponential backoff until they either succeed or exhaust their retry
//! budget and land in the dead-letter (`failed/`) directory.

mod backoff;
mod delivery;
mod queue;

pub use delivery::{DeliveryHandler, DeliveryOutcome, QueuedDelivery};
pub use queue::DeliveryQueue;
