// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tier 2: an append-only JSONL log of every `capture()` call, independent of
//! whichever Tier 1 backend is active. The long-term store is rebuildable
//! from this log alone - it is the source of truth, the sqlite/fallback
//! tables are a queryable index over it.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::entry::MemoryEntry;

pub struct RawLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RawLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path: path.to_path_buf(), lock: Mutex::new(()) })
    }

    pub async fn append(&self, entry: &MemoryEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Replay every logged entry in append order. Used for diagnostics and
    /// to rebuild a Tier 1 backend that was lost or corrupted.
    pub async fn replay(&self) -> anyhow::Result<Vec<MemoryEntry>> {
        let _guard = self.lock.lock().await;
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let mut out = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<MemoryEntry>(line) {
                out.push(entry);
            }
        }
        Ok(out)
    }
}
