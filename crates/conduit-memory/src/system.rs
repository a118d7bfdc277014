// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Public facade over the three-tier memory store. This is the only type
//! the rest of the crate graph (the supervisor agent, the gateway) should
//! depend on - backend choice, fusion scoring, and tier bookkeeping are all
//! internal to [`MemorySystem`].

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use conduit_config::MemoryConfig;
use conduit_model::ModelProvider;
use tracing::warn;

use crate::embedder::{cosine_similarity, Embedder, HashEmbedder};
use crate::entry::{MemoryEntry, RecallFilters};
use crate::fallback::FallbackStore;
use crate::longterm::LongTermMemory;
use crate::rawlog::RawLog;
use crate::rif::rif_score;

const DEFAULT_TOP_K: usize = 5;

enum Backend {
    Sqlite(LongTermMemory),
    Fallback(FallbackStore),
}

pub struct MemorySystem {
    backend: Backend,
    raw_log: RawLog,
    embedder: Arc<dyn Embedder>,
    cfg: MemoryConfig,
}

impl MemorySystem {
    /// Open (or create) the memory store rooted at `data_dir`. Tries the
    /// sqlite-backed long-term store first; if opening it fails for any
    /// reason, falls back to the degraded file-only backend rather than
    /// refusing to start.
    pub fn open(data_dir: &Path, cfg: MemoryConfig) -> anyhow::Result<Self> {
        Self::open_with_embedder(data_dir, cfg, Arc::new(HashEmbedder::default()))
    }

    pub fn open_with_embedder(data_dir: &Path, cfg: MemoryConfig, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self> {
        let root = data_dir.join("memories");
        let backend = match LongTermMemory::open(&root.join("long_term.db")) {
            Ok(db) => Backend::Sqlite(db),
            Err(err) => {
                warn!(error = %err, "falling back to file-only memory backend");
                Backend::Fallback(FallbackStore::open(&root.join("fallback"))?)
            }
        };
        let raw_log = RawLog::open(&root.join("raw.jsonl"))?;
        Ok(Self { backend, raw_log, embedder, cfg })
    }

    /// Record a new memory. Embeds the content, writes it to the raw log
    /// unconditionally, and inserts it into whichever Tier 1 backend is
    /// active.
    pub async fn capture(
        &self,
        content: impl Into<String>,
        entry_type: Option<String>,
        tags: Vec<String>,
        metadata: Option<serde_json::Value>,
    ) -> anyhow::Result<MemoryEntry> {
        let mut entry = MemoryEntry::new(content, entry_type, tags, metadata);
        entry.embedding = self.embedder.embed(&entry.content).await?;

        self.raw_log.append(&entry).await?;
        match &self.backend {
            Backend::Sqlite(db) => db.insert(&entry).await?,
            Backend::Fallback(fs) => fs.insert(&entry).await?,
        }
        Ok(entry)
    }

    /// Recall the `top_k` memories most relevant to `query`, fusing vector
    /// similarity, keyword rank, and RIF score. Every returned entry has its
    /// access statistics bumped as a side effect, exactly as if a human had
    /// just been reminded of it. Returns the concatenated content of the
    /// selected entries, most relevant first.
    pub async fn recall(&self, query: &str, top_k: Option<usize>, filters: Option<RecallFilters>) -> anyhow::Result<String> {
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        let filters = filters.unwrap_or_default();
        let fan_out = (top_k * 2).max(top_k);

        let query_embedding = self.embedder.embed(query).await?;

        let (vector_hits, keyword_hits) = match &self.backend {
            Backend::Sqlite(db) => (db.vector_candidates(&query_embedding, fan_out).await?, db.keyword_candidates(query, fan_out).await?),
            Backend::Fallback(fs) => (fs.vector_candidates(&query_embedding, fan_out).await?, fs.keyword_candidates(query, fan_out).await?),
        };

        let now = Utc::now();
        let mut by_id: std::collections::HashMap<String, (MemoryEntry, f32, f32)> = std::collections::HashMap::new();
        for (entry, sim) in vector_hits {
            by_id.entry(entry.id.clone()).or_insert((entry, 0.0, 0.0)).1 = sim;
        }
        for (entry, kw_rank) in keyword_hits {
            by_id.entry(entry.id.clone()).or_insert((entry, 0.0, 0.0)).2 = kw_rank;
        }

        let mut scored: Vec<(MemoryEntry, f32)> = by_id
            .into_values()
            .filter(|(entry, _, _)| filters.matches(entry))
            .map(|(entry, vec_sim, kw_rank)| {
                let rif = rif_score(&entry, now, &self.cfg);
                let score = self.cfg.w_vec * vec_sim + self.cfg.w_kw * kw_rank + self.cfg.w_rif * rif;
                (entry, score)
            })
            .collect();

        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => b.0.last_accessed_at.cmp(&a.0.last_accessed_at),
            other => other,
        });
        scored.truncate(top_k);

        let mut contents = Vec::with_capacity(scored.len());
        for (entry, _) in &scored {
            match &self.backend {
                Backend::Sqlite(db) => db.record_access(&entry.id).await?,
                Backend::Fallback(fs) => fs.record_access(&entry.id).await?,
            }
            contents.push(entry.content.clone());
        }
        Ok(contents.join("\n"))
    }

    /// Run one consolidation + forgetting pass over every stored entry.
    /// Returns the number of entries merged and the number forgotten.
    pub async fn consolidate(&self, provider: &dyn ModelProvider) -> anyhow::Result<(usize, usize)> {
        let all_entries = match &self.backend {
            Backend::Sqlite(db) => db.all_entries().await?,
            Backend::Fallback(fs) => fs.all_entries().await?,
        };

        let clusters = crate::consolidate::consolidate(&all_entries, provider, &self.cfg).await?;
        let mut merged = 0;
        for mut cluster in clusters {
            cluster.consolidated.embedding = self.embedder.embed(&cluster.consolidated.content).await?;
            match &self.backend {
                Backend::Sqlite(db) => db.insert(&cluster.consolidated).await?,
                Backend::Fallback(fs) => fs.insert(&cluster.consolidated).await?,
            }
            self.raw_log.append(&cluster.consolidated).await?;
            for source_id in &cluster.source_ids {
                if let Some(source) = all_entries.iter().find(|e| &e.id == source_id) {
                    let decayed = crate::consolidate::decay_confidence(source.confidence, &self.cfg);
                    match &self.backend {
                        Backend::Sqlite(db) => db.update_confidence(source_id, decayed).await?,
                        Backend::Fallback(fs) => fs.update_confidence(source_id, decayed).await?,
                    }
                }
                merged += 1;
            }
        }

        let mut forgotten = 0;
        let refreshed = match &self.backend {
            Backend::Sqlite(db) => db.all_entries().await?,
            Backend::Fallback(fs) => fs.all_entries().await?,
        };
        for entry in refreshed {
            if crate::consolidate::is_forgettable(&entry, &self.cfg) {
                match &self.backend {
                    Backend::Sqlite(db) => db.delete(&entry.id).await?,
                    Backend::Fallback(fs) => fs.delete(&entry.id).await?,
                }
                forgotten += 1;
            }
        }

        Ok((merged, forgotten))
    }

    /// Cosine similarity helper exposed for callers (e.g. the supervisor
    /// agent) that want to dedupe a proposed memory against what is already
    /// recalled without going through a full `recall` round trip.
    pub fn embed_similarity(a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}
