// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::delivery::{DeliveryHandler, DeliveryOutcome, QueuedDelivery};

/// A crash-safe, at-least-once on-disk delivery queue.
///
/// Every pending delivery is one `<uuid>.json` file under `queue_dir`.
/// Writes go through a `.tmp` sibling that is flushed, fsynced and then
/// renamed into place, so a crash mid-write never leaves a half-written
/// file where the worker expects a complete one. Deliveries that exhaust
/// their retry budget are moved to `queue_dir/failed/` rather than deleted.
pub struct DeliveryQueue {
    queue_dir: PathBuf,
    scan_interval: StdDuration,
    max_retries: u32,
    backoff_schedule_secs: Vec<i64>,
}

impl DeliveryQueue {
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            scan_interval: StdDuration::from_secs(5),
            max_retries: 5,
            backoff_schedule_secs: vec![5, 25, 120, 600],
        }
    }

    pub fn with_scan_interval(mut self, interval: StdDuration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Sets the `maxRetries` ceiling stamped onto every delivery that
    /// passes through `enqueue`, overriding `QueuedDelivery::new`'s own
    /// default. Normally sourced from `QueueConfig::max_retries`.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff schedule (in seconds) used by `record_failure` for
    /// every retry on this queue. Normally sourced from
    /// `QueueConfig::backoff_schedule_secs`.
    pub fn with_backoff_schedule_secs(mut self, schedule: Vec<i64>) -> Self {
        self.backoff_schedule_secs = schedule;
        self
    }

    fn failed_dir(&self) -> PathBuf {
        self.queue_dir.join("failed")
    }

    fn entry_path(&self, id: Uuid) -> PathBuf {
        self.queue_dir.join(format!("{id}.json"))
    }

    fn tmp_path(&self, id: Uuid) -> PathBuf {
        self.queue_dir.join(format!("{id}.tmp"))
    }

    /// Ensure the queue directory (and its `failed/` subdirectory) exist,
    /// and delete any stray `.tmp` files left behind by a crash mid-write -
    /// their corresponding `.json` either never existed or is already
    /// complete, so the partial write carries no information worth keeping.
    pub async fn recover(&self) -> anyhow::Result<usize> {
        tokio::fs::create_dir_all(&self.queue_dir).await?;
        tokio::fs::create_dir_all(self.failed_dir()).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.queue_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            warn!(removed, "removed stray .tmp files from delivery queue on recovery");
        }
        Ok(removed)
    }

    /// Atomically write a delivery to disk: write to a `.tmp` path, flush,
    /// fsync, then rename over the final `.json` path. On any error the
    /// `.tmp` file is removed rather than left behind.
    async fn write_atomic(&self, id: Uuid, delivery: &QueuedDelivery) -> anyhow::Result<()> {
        let tmp = self.tmp_path(id);
        let result = self.write_atomic_inner(&tmp, id, delivery).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn write_atomic_inner(&self, tmp: &Path, id: Uuid, delivery: &QueuedDelivery) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;
        let body = serde_json::to_vec_pretty(delivery)?;
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(tmp, self.entry_path(id)).await?;
        Ok(())
    }

    /// Persists `delivery`, stamping it with this queue's configured
    /// `maxRetries` so an operator's `queue.max_retries` setting applies
    /// uniformly to every delivery the queue carries.
    pub async fn enqueue(&self, mut delivery: QueuedDelivery) -> anyhow::Result<()> {
        delivery.max_retries = self.max_retries;
        self.write_atomic(delivery.id, &delivery).await
    }

    /// Load every pending delivery currently on disk, in filename order.
    /// The spec makes no ordering guarantee across deliveries, so this is
    /// just whatever order the directory listing returns - callers must
    /// not rely on FIFO across different deliveries.
    pub async fn load_pending(&self) -> anyhow::Result<Vec<QueuedDelivery>> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.queue_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<QueuedDelivery>(&bytes) {
                    Ok(d) => out.push(d),
                    Err(e) => warn!(path = %path.display(), error = %e, "dropping unreadable queue entry"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read queue entry"),
            }
        }
        Ok(out)
    }

    /// Loads every dead-lettered delivery under `queue_dir/failed/`, for
    /// read-only inspection. The worker never calls this; deliveries that
    /// land in `failed/` are not retried automatically.
    pub async fn load_failed(&self) -> anyhow::Result<Vec<QueuedDelivery>> {
        let dir = self.failed_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<QueuedDelivery>(&bytes) {
                    Ok(d) => out.push(d),
                    Err(e) => warn!(path = %path.display(), error = %e, "dropping unreadable dead-letter entry"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read dead-letter entry"),
            }
        }
        Ok(out)
    }

    async fn move_to_failed(&self, delivery: &QueuedDelivery) -> anyhow::Result<()> {
        let from = self.entry_path(delivery.id);
        let to = self.failed_dir().join(format!("{}.json", delivery.id));
        tokio::fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<()> {
        tokio::fs::remove_file(self.entry_path(id)).await?;
        Ok(())
    }

    /// Process one delivery: deliver it, and update its on-disk state
    /// according to the outcome. Never propagates the handler's error -
    /// the worker loop must never crash the host process over a single
    /// bad delivery.
    async fn process_one(&self, mut delivery: QueuedDelivery, handler: &dyn DeliveryHandler) {
        if delivery.is_exhausted() {
            if let Err(e) = self.move_to_failed(&delivery).await {
                warn!(id = %delivery.id, error = %e, "failed to move exhausted delivery to dead-letter queue");
            } else {
                warn!(id = %delivery.id, retries = delivery.retry_count, "delivery moved to dead-letter queue");
            }
            return;
        }

        match handler.deliver(&delivery).await {
            DeliveryOutcome::Delivered => {
                if let Err(e) = self.delete_entry(delivery.id).await {
                    warn!(id = %delivery.id, error = %e, "failed to remove delivered queue entry");
                }
            }
            DeliveryOutcome::Retryable(err) => {
                delivery.record_failure(err, &self.backoff_schedule_secs);
                if let Err(e) = self.write_atomic(delivery.id, &delivery).await {
                    warn!(id = %delivery.id, error = %e, "failed to persist delivery retry state");
                }
            }
            DeliveryOutcome::Permanent(err) => {
                delivery.last_error = Some(err);
                delivery.retry_count = delivery.max_retries;
                if let Err(e) = self.move_to_failed(&delivery).await {
                    warn!(id = %delivery.id, error = %e, "failed to move permanently-failed delivery to dead-letter queue");
                }
            }
        }
    }

    /// Run a single scan: load every pending delivery and process the ones
    /// that are due.
    pub async fn tick(&self, handler: &dyn DeliveryHandler) -> anyhow::Result<()> {
        let now = Utc::now();
        for delivery in self.load_pending().await? {
            if delivery.due(now) {
                self.process_one(delivery, handler).await;
            }
        }
        Ok(())
    }

    /// Run the worker loop forever, scanning every `scan_interval`. Intended
    /// to be spawned as a background task; it never returns under normal
    /// operation.
    pub async fn run_worker(&self, handler: &dyn DeliveryHandler) {
        info!(interval = ?self.scan_interval, "delivery queue worker started");
        let mut ticker = tokio::time::interval(self.scan_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(handler).await {
                warn!(error = %e, "delivery queue scan failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysOk;
    #[async_trait::async_trait]
    impl DeliveryHandler for AlwaysOk {
        async fn deliver(&self, _d: &QueuedDelivery) -> DeliveryOutcome {
            DeliveryOutcome::Delivered
        }
    }

    struct AlwaysRetry;
    #[async_trait::async_trait]
    impl DeliveryHandler for AlwaysRetry {
        async fn deliver(&self, _d: &QueuedDelivery) -> DeliveryOutcome {
            DeliveryOutcome::Retryable("transient".into())
        }
    }

    struct AlwaysPermanent;
    #[async_trait::async_trait]
    impl DeliveryHandler for AlwaysPermanent {
        async fn deliver(&self, _d: &QueuedDelivery) -> DeliveryOutcome {
            DeliveryOutcome::Permanent("unknown recipient".into())
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);
    #[async_trait::async_trait]
    impl DeliveryHandler for CountingHandler {
        async fn deliver(&self, _d: &QueuedDelivery) -> DeliveryOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            DeliveryOutcome::Delivered
        }
    }

    #[tokio::test]
    async fn recover_creates_dirs_and_removes_stray_tmp_files() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        tokio::fs::write(dir.path().join("leftover.tmp"), b"garbage").await.unwrap();
        let removed = q.recover().await.unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("failed").is_dir());
        assert!(!dir.path().join("leftover.tmp").exists());
    }

    #[tokio::test]
    async fn enqueue_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        q.enqueue(d.clone()).await.unwrap();
        let pending = q.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, d.id);
        assert!(!dir.path().join(format!("{}.tmp", d.id)).exists());
        assert!(dir.path().join(format!("{}.json", d.id)).exists());
    }

    #[tokio::test]
    async fn tick_deletes_entry_on_successful_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        let id = d.id;
        q.enqueue(d).await.unwrap();
        q.tick(&AlwaysOk).await.unwrap();
        assert!(!dir.path().join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn tick_reschedules_on_retryable_failure() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        let id = d.id;
        q.enqueue(d).await.unwrap();
        q.tick(&AlwaysRetry).await.unwrap();
        let pending = q.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].retry_count, 1);
        assert!(pending[0].last_error.is_some());
        assert!(!pending[0].due(Utc::now()));
    }

    #[tokio::test]
    async fn tick_skips_entries_not_yet_due() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        d.next_retry_at = Utc::now() + chrono::Duration::seconds(60);
        q.enqueue(d).await.unwrap();
        q.tick(&CountingHandler(counter.clone())).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tick_moves_exhausted_delivery_to_failed_without_calling_handler() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path()).with_max_retries(1);
        q.recover().await.unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        d.retry_count = 1;
        let id = d.id;
        q.enqueue(d).await.unwrap();
        q.tick(&CountingHandler(counter.clone())).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(format!("{id}.json")).exists());
        assert!(dir.path().join("failed").join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn enqueue_stamps_queues_configured_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path()).with_max_retries(2);
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        q.enqueue(d).await.unwrap();
        let pending = q.load_pending().await.unwrap();
        assert_eq!(pending[0].max_retries, 2);
    }

    #[tokio::test]
    async fn tick_reschedules_using_the_queues_configured_backoff_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path()).with_backoff_schedule_secs(vec![1]);
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        q.enqueue(d).await.unwrap();
        q.tick(&AlwaysRetry).await.unwrap();
        let pending = q.load_pending().await.unwrap();
        assert!(!pending[0].due(Utc::now()));
        assert!(pending[0].due(Utc::now() + chrono::Duration::seconds(2)));
    }

    #[tokio::test]
    async fn tick_moves_permanent_failure_straight_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        let id = d.id;
        q.enqueue(d).await.unwrap();
        q.tick(&AlwaysPermanent).await.unwrap();
        assert!(!dir.path().join(format!("{id}.json")).exists());
        assert!(dir.path().join("failed").join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn load_failed_reads_dead_lettered_entries() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        let id = d.id;
        q.enqueue(d).await.unwrap();
        q.tick(&AlwaysPermanent).await.unwrap();
        let failed = q.load_failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert!(q.load_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_failed_is_empty_when_directory_absent() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path().join("not-yet-created"));
        assert!(q.load_failed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recover_is_idempotent_and_preserves_pending_entries() {
        let dir = tempfile::tempdir().unwrap();
        let q = DeliveryQueue::new(dir.path());
        q.recover().await.unwrap();
        let d = QueuedDelivery::new("telegram", "123", "hi", "agent-a", "agent:a:main");
        q.enqueue(d.clone()).await.unwrap();
        q.recover().await.unwrap();
        let pending = q.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, d.id);
    }
}
