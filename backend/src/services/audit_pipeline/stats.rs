use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by producers, workers and the committer.
#[derive(Debug, Default)]
pub struct PipelineStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    batches: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    /// Events accepted by the ingestion or batch queue.
    pub enqueued: u64,
    /// Events rejected by a full or closed queue, or stranded at shutdown.
    pub dropped: u64,
    /// Events whose insert reached the store and stayed there.
    pub persisted: u64,
    /// Events whose insert failed or whose transaction was rolled back.
    pub failed: u64,
    /// Batches handed to the committer.
    pub batches: u64,
}

impl PipelineStats {
    pub fn record_enqueued(&self, count: u64) {
        self.enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_commit(&self, persisted: u64, failed: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(persisted, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}
