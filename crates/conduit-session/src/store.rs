// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use conduit_model::Message;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::key::SessionKey;
use crate::session::Session;

/// Compact index entry persisted to `sessions.jsonl`. One per active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub key: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Persists per-session JSONL transcripts plus a compact `sessions.jsonl`
/// index. All operations on a given session key are serialized through a
/// per-key lock so two concurrent writers to the same transcript produce a
/// consistent append order; operations on different keys run in parallel.
pub struct SessionStore {
    data_dir: PathBuf,
    default_max_tokens: usize,
    /// How many trailing transcript lines are loaded into the in-memory
    /// working set on `getOrCreate`/`get`.
    working_set_size: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    index: Mutex<HashMap<String, SessionMeta>>,
}

impl SessionStore {
    pub async fn open(data_dir: impl Into<PathBuf>, default_max_tokens: usize) -> anyhow::Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join("transcripts")).await?;
        fs::create_dir_all(data_dir.join("archive")).await?;

        let index = load_index(&data_dir.join("sessions.jsonl")).await?;

        Ok(Self {
            data_dir,
            default_max_tokens,
            working_set_size: 200,
            locks: Mutex::new(HashMap::new()),
            index: Mutex::new(index),
        })
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquires `key`'s per-session lock for the duration the returned
    /// guard is held. Callers that span more than one store operation in a
    /// single logical turn (the supervisor agent's `handle`) should acquire
    /// once up front and use the `_locked` methods below for the rest of the
    /// turn, so that a second concurrent request for the same session
    /// genuinely queues behind the first rather than interleaving between
    /// individual store calls. Any per-session state outside this store
    /// (e.g. pending confirmations) that is only ever touched while holding
    /// this guard inherits the same serialization for free.
    pub async fn acquire(&self, key: &SessionKey) -> tokio::sync::OwnedMutexGuard<()> {
        self.lock_for(&key.to_string()).await.lock_owned().await
    }

    /// Like `get_or_create`, but assumes the caller already holds `key`'s
    /// lock (via `acquire`) and must not attempt to take it again.
    pub async fn get_or_create_locked(&self, key: &SessionKey) -> Session {
        self.load_working_set(key).await
    }

    fn transcript_path(&self, key: &SessionKey) -> PathBuf {
        self.data_dir.join("transcripts").join(format!("{}.jsonl", key.sanitized()))
    }

    fn index_path(&self) -> PathBuf {
        self.data_dir.join("sessions.jsonl")
    }

    /// Load an existing session's working set, or create a fresh one.
    /// Never fails: a missing or corrupt transcript just yields an empty
    /// session rather than propagating an error to the caller.
    pub async fn get_or_create(&self, key: &SessionKey) -> Session {
        let canonical = key.to_string();
        let _guard = self.lock_for(&canonical).await.lock_owned().await;
        self.load_working_set(key).await
    }

    /// Read-only snapshot, or `None` if the session has never been saved.
    pub async fn get(&self, key: &SessionKey) -> Option<Session> {
        let canonical = key.to_string();
        if !self.index.lock().await.contains_key(&canonical) {
            return None;
        }
        let _guard = self.lock_for(&canonical).await.lock_owned().await;
        Some(self.load_working_set(key).await)
    }

    async fn load_working_set(&self, key: &SessionKey) -> Session {
        let mut session = Session::new(key.to_string(), self.default_max_tokens);
        let path = self.transcript_path(key);
        let Ok(text) = fs::read_to_string(&path).await else {
            return session;
        };
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(self.working_set_size);
        let messages: Vec<Message> = lines[start..]
            .iter()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        session.messages = messages;
        session.recalculate_tokens();
        session
    }

    /// Flush a session's buffered new messages to the transcript and update
    /// the index. Clears the session's pending buffer on success.
    pub async fn save(&self, session: &mut Session) -> anyhow::Result<()> {
        let key = SessionKey::parse(&session.key)?;
        let canonical = key.to_string();
        let _guard = self.lock_for(&canonical).await.lock_owned().await;
        self.save_inner(&key, &canonical, session).await
    }

    /// Like `save`, but assumes the caller already holds the session's lock
    /// (via `acquire`) and must not attempt to take it again.
    pub async fn save_locked(&self, session: &mut Session) -> anyhow::Result<()> {
        let key = SessionKey::parse(&session.key)?;
        let canonical = key.to_string();
        self.save_inner(&key, &canonical, session).await
    }

    async fn save_inner(&self, key: &SessionKey, canonical: &str, session: &mut Session) -> anyhow::Result<()> {
        let pending = session.take_pending();
        if !pending.is_empty() {
            let path = self.transcript_path(key);
            let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
            for msg in &pending {
                let line = serde_json::to_string(msg)?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
            }
            file.flush().await?;
        }

        let now = Utc::now();
        let mut index = self.index.lock().await;
        let entry = index.entry(canonical.to_string()).or_insert_with(|| SessionMeta {
            key: canonical.to_string(),
            agent_id: key.agent_id.clone(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        });
        entry.updated_at = now;
        entry.message_count += pending.len();
        persist_index(&self.index_path(), &index).await?;
        debug!(session_key = %canonical, appended = pending.len(), "session saved");
        Ok(())
    }

    /// Sessions ordered by `updatedAt` descending, optionally filtered by
    /// agent id.
    pub async fn list_sessions(&self, agent_id: Option<&str>) -> Vec<SessionMeta> {
        let index = self.index.lock().await;
        let mut metas: Vec<SessionMeta> = index
            .values()
            .filter(|m| agent_id.map(|a| a == m.agent_id).unwrap_or(true))
            .cloned()
            .collect();
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        metas
    }

    /// Remove a session from the index and move its transcript to
    /// `archive/` rather than deleting it outright.
    pub async fn delete(&self, key: &SessionKey) -> anyhow::Result<()> {
        let canonical = key.to_string();
        let _guard = self.lock_for(&canonical).await.lock_owned().await;

        self.archive_transcript(key).await?;
        let mut index = self.index.lock().await;
        index.remove(&canonical);
        persist_index(&self.index_path(), &index).await?;
        Ok(())
    }

    /// Bulk-move sessions whose `updatedAt` is older than `days` to
    /// `archive/`. Returns the keys archived.
    pub async fn archive_old_sessions(&self, days: i64) -> anyhow::Result<Vec<String>> {
        let cutoff = Utc::now() - Duration::days(days);
        let stale: Vec<String> = {
            let index = self.index.lock().await;
            index
                .values()
                .filter(|m| m.updated_at < cutoff)
                .map(|m| m.key.clone())
                .collect()
        };

        for key_str in &stale {
            if let Ok(key) = SessionKey::parse(key_str) {
                let _guard = self.lock_for(key_str).await.lock_owned().await;
                self.archive_transcript(&key).await?;
            }
        }

        let mut index = self.index.lock().await;
        for key_str in &stale {
            index.remove(key_str);
        }
        persist_index(&self.index_path(), &index).await?;
        Ok(stale)
    }

    async fn archive_transcript(&self, key: &SessionKey) -> anyhow::Result<()> {
        let src = self.transcript_path(key);
        if !fs::try_exists(&src).await.unwrap_or(false) {
            return Ok(());
        }
        let dest = self.data_dir.join("archive").join(format!("{}.jsonl", key.sanitized()));
        fs::rename(&src, &dest).await?;
        Ok(())
    }
}

async fn load_index(path: &Path) -> anyhow::Result<HashMap<String, SessionMeta>> {
    let mut map = HashMap::new();
    if let Ok(text) = fs::read_to_string(path).await {
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(meta) = serde_json::from_str::<SessionMeta>(line) {
                map.insert(meta.key.clone(), meta);
            }
        }
    }
    Ok(map)
}

/// Rewrite the index atomically: write every entry to a `.tmp` sibling, then
/// rename over the real path, so a crash mid-write never leaves a truncated
/// index behind.
async fn persist_index(path: &Path, index: &HashMap<String, SessionMeta>) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");
    let mut body = String::new();
    let mut metas: Vec<&SessionMeta> = index.values().collect();
    metas.sort_by(|a, b| a.key.cmp(&b.key));
    for meta in metas {
        body.push_str(&serde_json::to_string(meta)?);
        body.push('\n');
    }
    fs::write(&tmp_path, body).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
