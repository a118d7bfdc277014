// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Three-tier memory system: working memory (tier 0, in the supervisor
//! agent's own context window), long-term memory (tier 1, this crate's
//! `sqlite`/fallback backends with hybrid vector+keyword retrieval), and a
//! raw append-only event log (tier 2) that every capture is durably written
//! to regardless of which tier 1 backend is active.

mod consolidate;
mod embedder;
mod entry;
mod fallback;
mod longterm;
mod rawlog;
mod rif;
mod system;
mod working;

pub use consolidate::{consolidate, decay_confidence, is_forgettable, Cluster};
pub use embedder::{cosine_similarity, Embedder, HashEmbedder};
pub use entry::{MemoryEntry, RecallFilters, DEFAULT_CONFIDENCE, DEFAULT_ENTRY_TYPE};
pub use rif::rif_score;
pub use system::MemorySystem;
pub use working::compress_working_set;
