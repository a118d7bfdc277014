// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Primary long-term memory backend: a `rusqlite` database combining a plain
//! table over [`MemoryEntry`] fields, an FTS5 virtual table for keyword/BM25
//! recall, and a brute-force cosine scan over embeddings for vector recall.
//! No ANN index crate is in this codebase's dependency surface at any scale
//! this store needs to handle, so a linear scan is the correct choice here.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::embedder::cosine_similarity;
use crate::entry::MemoryEntry;

/// Schema version stamped into the database on creation. A mismatch on open
/// means the on-disk format is incompatible with this build and the caller
/// must fall back to the degraded file-only backend rather than risk reading
/// garbage.
const SCHEMA_VERSION: i64 = 1;

pub struct LongTermMemory {
    conn: Mutex<Connection>,
}

fn embedding_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntry> {
    let tags_json: String = row.get("tags")?;
    let metadata_json: Option<String> = row.get("metadata")?;
    let embedding_blob: Vec<u8> = row.get("embedding")?;
    Ok(MemoryEntry {
        id: row.get("id")?,
        content: row.get("content")?,
        entry_type: row.get("entry_type")?,
        confidence: row.get("confidence")?,
        created_at: row.get("created_at")?,
        last_accessed_at: row.get("last_accessed_at")?,
        access_count: row.get("access_count")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        metadata: metadata_json.and_then(|m| serde_json::from_str(&m).ok()),
        embedding: blob_to_embedding(&embedding_blob),
    })
}

impl LongTermMemory {
    /// Open (creating if absent) the database at `path`. Returns an error if
    /// the file exists but its schema version doesn't match this build -
    /// callers should treat that as a signal to use the fallback backend
    /// instead of attempting to repair the file in place.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS memory_entries (
                 id TEXT PRIMARY KEY,
                 content TEXT NOT NULL,
                 entry_type TEXT NOT NULL,
                 confidence REAL NOT NULL,
                 created_at TEXT NOT NULL,
                 last_accessed_at TEXT NOT NULL,
                 access_count INTEGER NOT NULL,
                 tags TEXT NOT NULL,
                 metadata TEXT,
                 embedding BLOB NOT NULL
             );
             CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
                 id UNINDEXED, content, tags
             );",
        )?;

        let version: Option<i64> = conn
            .query_row("SELECT version FROM schema_meta LIMIT 1", [], |r| r.get(0))
            .ok();
        match version {
            None => {
                conn.execute("INSERT INTO schema_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            }
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => anyhow::bail!("memory database schema version {v} is incompatible with this build (expected {SCHEMA_VERSION})"),
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    pub async fn insert(&self, entry: &MemoryEntry) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO memory_entries
                (id, content, entry_type, confidence, created_at, last_accessed_at, access_count, tags, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.content,
                entry.entry_type,
                entry.confidence,
                entry.created_at,
                entry.last_accessed_at,
                entry.access_count,
                serde_json::to_string(&entry.tags)?,
                entry.metadata.as_ref().map(|m| m.to_string()),
                embedding_to_blob(&entry.embedding),
            ],
        )?;
        conn.execute(
            "INSERT INTO memory_fts (id, content, tags) VALUES (?1, ?2, ?3)",
            params![entry.id, entry.content, entry.tags.join(" ")],
        )?;
        Ok(())
    }

    pub async fn all_entries(&self) -> anyhow::Result<Vec<MemoryEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM memory_entries")?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Vector candidates ranked by cosine similarity to `query_embedding`,
    /// highest first, truncated to `k`. Linear scan over every stored entry.
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

    /// Keyword candidates via FTS5 BM25 ranking, normalized into `[0, 1]`
    /// where 1 is the best match in this result set (sqlite's `bm25()`
    /// returns more-negative-is-better, so the normalization also flips sign).
    pub async fn keyword_candidates(&self, query: &str, k: usize) -> anyhow::Result<Vec<(MemoryEntry, f32)>> {
        let conn = self.conn.lock().await;
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(
            "SELECT memory_entries.*, bm25(memory_fts) as rank
             FROM memory_fts JOIN memory_entries ON memory_entries.id = memory_fts.id
             WHERE memory_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![sanitized, k as i64], |row| {
            let entry = row_to_entry(row)?;
            let rank: f64 = row.get("rank")?;
            Ok((entry, rank as f32))
        })?;
        let mut raw = Vec::new();
        for r in rows {
            raw.push(r?);
        }
        drop(stmt);
        drop(conn);

        if raw.is_empty() {
            return Ok(raw);
        }
        let min_rank = raw.iter().map(|(_, r)| *r).fold(f32::INFINITY, f32::min);
        let max_rank = raw.iter().map(|(_, r)| *r).fold(f32::NEG_INFINITY, f32::max);
        let span = (max_rank - min_rank).max(1e-6);
        Ok(raw.into_iter().map(|(e, r)| (e, 1.0 - (r - min_rank) / span)).collect())
    }

    pub async fn record_access(&self, id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE memory_entries SET access_count = access_count + 1, last_accessed_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    pub async fn update_confidence(&self, id: &str, confidence: f32) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("UPDATE memory_entries SET confidence = ?1 WHERE id = ?2", params![confidence, id])?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM memory_entries WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM memory_fts WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// FTS5 query syntax treats `"`, `*`, `-`, `(`, `)` specially; quote each
/// token individually so arbitrary user text never produces a syntax error.
fn sanitize_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, LongTermMemory) {
        let dir = tempdir().unwrap();
        let db = LongTermMemory::open(&dir.path().join("memory.db")).unwrap();
        (dir, db)
    }

    fn entry_with_embedding(content: &str, embedding: Vec<f32>) -> MemoryEntry {
        let mut e = MemoryEntry::new(content, None, vec![], None);
        e.embedding = embedding;
        e
    }

    #[tokio::test]
    async fn insert_then_all_entries_round_trips() {
        let (_dir, db) = store().await;
        let e = entry_with_embedding("user likes rust", vec![1.0, 0.0]);
        db.insert(&e).await.unwrap();
        let all = db.all_entries().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "user likes rust");
    }

    #[tokio::test]
    async fn vector_candidates_ranks_by_cosine_similarity() {
        let (_dir, db) = store().await;
        db.insert(&entry_with_embedding("a", vec![1.0, 0.0])).await.unwrap();
        db.insert(&entry_with_embedding("b", vec![0.0, 1.0])).await.unwrap();
        let results = db.vector_candidates(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].0.content, "a");
    }

    #[tokio::test]
    async fn keyword_candidates_finds_matching_content() {
        let (_dir, db) = store().await;
        db.insert(&entry_with_embedding("user prefers python 3.12 with uv", vec![])).await.unwrap();
        db.insert(&entry_with_embedding("the weather is cold today", vec![])).await.unwrap();
        let results = db.keyword_candidates("python", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].0.content.contains("python"));
    }

    #[tokio::test]
    async fn keyword_candidates_empty_query_returns_nothing() {
        let (_dir, db) = store().await;
        db.insert(&entry_with_embedding("anything", vec![])).await.unwrap();
        let results = db.keyword_candidates("   ", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn record_access_increments_count_and_advances_timestamp() {
        let (_dir, db) = store().await;
        let e = entry_with_embedding("x", vec![]);
        let id = e.id.clone();
        let before = e.last_accessed_at;
        db.insert(&e).await.unwrap();
        db.record_access(&id).await.unwrap();
        let all = db.all_entries().await.unwrap();
        let updated = all.iter().find(|e| e.id == id).unwrap();
        assert_eq!(updated.access_count, 1);
        assert!(updated.last_accessed_at >= before);
    }

    #[tokio::test]
    async fn delete_removes_entry_from_both_tables() {
        let (_dir, db) = store().await;
        let e = entry_with_embedding("x", vec![]);
        let id = e.id.clone();
        db.insert(&e).await.unwrap();
        db.delete(&id).await.unwrap();
        assert!(db.all_entries().await.unwrap().is_empty());
        assert!(db.keyword_candidates("x", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_same_path_preserves_schema_version_check() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.db");
        {
            let db = LongTermMemory::open(&path).unwrap();
            db.insert(&entry_with_embedding("persisted", vec![])).await.unwrap();
        }
        let db2 = LongTermMemory::open(&path).unwrap();
        assert_eq!(db2.all_entries().await.unwrap().len(), 1);
    }
}
