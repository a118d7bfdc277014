// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Degraded file-only backend used when opening the `rusqlite` store fails
//! (schema mismatch, read-only filesystem, missing bundled sqlite). One JSON
//! file per entry under a directory, keyword recall by substring/term
//! overlap, vector recall by the same cosine scan the primary backend uses.
//! Durability matters more than query speed here: this path only runs when
//! something has already gone wrong with the preferred backend.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::embedder::cosine_similarity;
use crate::entry::MemoryEntry;

pub struct FallbackStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FallbackStore {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf(), lock: Mutex::new(()) })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub async fn insert(&self, entry: &MemoryEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.entry_path(&entry.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entry)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub async fn all_entries(&self) -> anyhow::Result<Vec<MemoryEntry>> {
        let _guard = self.lock.lock().await;
        let mut out = Vec::new();
        for f in std::fs::read_dir(&self.dir)? {
            let f = f?;
            if f.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read(f.path())?;
            if let Ok(entry) = serde_json::from_slice::<MemoryEntry>(&data) {
                out.push(entry);
            }
        }
        Ok(out)
    }

    pub async fn vector_candidates(&self, query_embedding: &[f32], k: usize) -> anyhow::Result<Vec<(MemoryEntry, f32)>> {
        let mut scored: Vec<(MemoryEntry, f32)> = self
            .all_entries()
            .await?
            .into_iter()
            .map(|e| {
                let sim = cosine_similarity(query_embedding, &e.embedding);
                (e, sim)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Keyword score is the fraction of query terms found as a substring of
    /// the entry content, case-insensitive. Crude compared to BM25 but
    /// dependency-free and good enough for the degraded path.
    pub async fn keyword_candidates(&self, query: &str, k: usize) -> anyhow::Result<Vec<(MemoryEntry, f32)>> {
        let terms: Vec<String> = query.to_lowercase().split_whitespace().map(String::from).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(MemoryEntry, f32)> = self
            .all_entries()
            .await?
            .into_iter()
            .filter_map(|e| {
                let lower = e.content.to_lowercase();
                let hits = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if hits == 0 {
                    None
                } else {
                    Some((e, hits as f32 / terms.len() as f32))
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn record_access(&self, id: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.entry_path(id);
        let data = std::fs::read(&path)?;
        let mut entry: MemoryEntry = serde_json::from_slice(&data)?;
        entry.access_count += 1;
        entry.last_accessed_at = chrono::Utc::now();
        drop(_guard);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&entry)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub async fn update_confidence(&self, id: &str, confidence: f32) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.entry_path(id);
        let data = std::fs::read(&path)?;
        let mut entry: MemoryEntry = serde_json::from_slice(&data)?;
        entry.confidence = confidence;
        drop(_guard);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&entry)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.entry_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
