// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use conduit_config::MemoryConfig;

use crate::entry::MemoryEntry;

/// Recency/Importance/Frequency composite score used to rank long-term
/// memories during retrieval and to decide forgetting eligibility.
///
/// `recency = exp(-hoursSinceLastAccess / tau)`, `importance = confidence`,
/// `frequency = min(1, accessCount / 10)`.
pub fn rif_score(entry: &MemoryEntry, now: DateTime<Utc>, cfg: &MemoryConfig) -> f32 {
    let hours = (now - entry.last_accessed_at).num_seconds().max(0) as f32 / 3600.0;
    let recency = (-hours / cfg.recency_tau_hours).exp();
    let importance = entry.confidence;
    let frequency = (entry.access_count as f32 / 10.0).min(1.0);
    cfg.rif_w_recency * recency + cfg.rif_w_importance * importance + cfg.rif_w_frequency * frequency
}
