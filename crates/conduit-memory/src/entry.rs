// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single long-term memory: a fact, belief, event, execution pattern, or
/// consolidation summary. Created by `capture`, mutated by access-statistics
/// updates and by consolidation, destroyed by forgetting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub entry_type: String,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u32,
    pub tags: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    /// Fixed-dimension embedding vector, `None` only transiently before the
    /// store assigns one during `capture`.
    pub embedding: Vec<f32>,
}

pub const DEFAULT_ENTRY_TYPE: &str = "fact";
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

impl MemoryEntry {
    pub fn new(content: impl Into<String>, entry_type: Option<String>, tags: Vec<String>, metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            entry_type: entry_type.unwrap_or_else(|| DEFAULT_ENTRY_TYPE.to_string()),
            confidence: DEFAULT_CONFIDENCE,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            tags,
            metadata,
            embedding: Vec::new(),
        }
    }

    /// Entries of these types survive forgetting regardless of confidence or
    /// access count.
    pub fn is_forgetting_exempt(&self) -> bool {
        matches!(self.entry_type.as_str(), "fact" | "solution")
    }
}

/// Optional filters applied to `recall` before scoring.
#[derive(Debug, Clone, Default)]
pub struct RecallFilters {
    pub entry_types: Vec<String>,
    pub tags: Vec<String>,
}

impl RecallFilters {
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if !self.entry_types.is_empty() && !self.entry_types.contains(&entry.entry_type) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| entry.tags.contains(t)) {
            return false;
        }
        true
    }
}
