//! Asynchronous audit-event pipeline.
//!
//! Request handlers enqueue [`AuditEvent`]s through an [`AuditProducer`] without ever
//! blocking. A fixed pool of workers pulls from the shared ingestion queue, batches
//! events locally and commits each batch through the [`BatchCommitter`]. A dedicated
//! worker commits pre-formed batches. [`AuditPipeline::stop`] cancels every worker,
//! waits for them to drain and exit, and accounts for anything left behind.

pub mod accumulator;
pub mod committer;
pub mod producer;
pub mod stats;
mod worker;

use async_channel::{Receiver, Sender};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::AuditPipelineConfig;
use crate::models::audit_event::AuditEvent;
use crate::services::audit_store::AuditStore;

pub use accumulator::BatchAccumulator;
pub use committer::{BatchCommitter, CommitMode, CommitReport};
pub use producer::AuditProducer;
pub use stats::{PipelineStats, PipelineStatsSnapshot};

use worker::{BatchWorker, EventWorker};

pub struct AuditPipeline {
    config: AuditPipelineConfig,
    committer: Arc<BatchCommitter>,
    stats: Arc<PipelineStats>,
    events_tx: Sender<AuditEvent>,
    events_rx: Receiver<AuditEvent>,
    batches_tx: Sender<Vec<AuditEvent>>,
    batches_rx: Receiver<Vec<AuditEvent>>,
    shutdown: CancellationToken,
    workers: JoinSet<()>,
    running: bool,
}

impl AuditPipeline {
    /// Builds the queues and committer. Nothing runs until [`start`](Self::start);
    /// events enqueued before then wait in the queue.
    pub fn new(config: AuditPipelineConfig, store: Arc<dyn AuditStore>) -> Self {
        let config = config.normalized();
        let stats = Arc::new(PipelineStats::default());
        let committer = Arc::new(BatchCommitter::new(store, stats.clone()));
        let (events_tx, events_rx) = async_channel::bounded(config.queue_capacity);
        let (batches_tx, batches_rx) = async_channel::bounded(config.batch_queue_capacity);

        Self {
            config,
            committer,
            stats,
            events_tx,
            events_rx,
            batches_tx,
            batches_rx,
            shutdown: CancellationToken::new(),
            workers: JoinSet::new(),
            running: false,
        }
    }

    pub fn producer(&self) -> AuditProducer {
        AuditProducer::new(
            self.events_tx.clone(),
            self.batches_tx.clone(),
            self.stats.clone(),
        )
    }

    pub fn config(&self) -> &AuditPipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Spawns the event workers and the batch worker on the current Tokio runtime.
    pub fn start(&mut self) {
        if self.running {
            tracing::warn!("Audit pipeline already started");
            return;
        }

        for worker_id in 0..self.config.worker_count {
            let worker = EventWorker::new(
                worker_id,
                self.events_rx.clone(),
                self.committer.clone(),
                self.shutdown.clone(),
                self.config.batch_size,
                self.config.flush_interval(),
            );
            self.workers.spawn(worker.run());
        }

        let batch_worker = BatchWorker::new(
            self.batches_rx.clone(),
            self.committer.clone(),
            self.shutdown.clone(),
        );
        self.workers.spawn(batch_worker.run());
        self.running = true;

        tracing::info!(
            worker_count = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            batch_queue_capacity = self.config.batch_queue_capacity,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval_ms,
            "Audit pipeline started"
        );
    }

    /// Signals every worker, waits until all of them have drained and exited, then
    /// closes the queues. Events that no worker picked up are logged and counted as
    /// dropped.
    pub async fn stop(mut self) -> PipelineStatsSnapshot {
        self.shutdown.cancel();

        while let Some(result) = self.workers.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "Audit worker terminated abnormally");
            }
        }
        self.running = false;

        self.events_tx.close();
        self.batches_tx.close();
        self.discard_stranded();

        let snapshot = self.stats.snapshot();
        tracing::info!(
            enqueued = snapshot.enqueued,
            persisted = snapshot.persisted,
            failed = snapshot.failed,
            dropped = snapshot.dropped,
            batches = snapshot.batches,
            "Audit pipeline stopped"
        );
        snapshot
    }

    fn discard_stranded(&self) {
        let mut stranded = 0usize;
        while let Ok(event) = self.events_rx.try_recv() {
            tracing::debug!(
                event_type = %event.kind(),
                table_name = event.resource_type(),
                record_id = event.resource_id(),
                "Discarding audit event left in queue"
            );
            stranded += 1;
        }
        while let Ok(batch) = self.batches_rx.try_recv() {
            stranded += batch.len();
        }

        if stranded > 0 {
            tracing::warn!(
                stranded,
                "Audit events were still queued after shutdown and have been dropped"
            );
            self.stats.record_dropped(stranded as u64);
        }
    }
}

// Dropping the `JoinSet` aborts every worker, so nothing is drained here.
impl Drop for AuditPipeline {
    fn drop(&mut self) {
        if self.running {
            tracing::warn!(
                queued = self.events_rx.len(),
                "Audit pipeline dropped without stop; workers aborted and queued audit events lost"
            );
        }
    }
}

/// Builds and starts a pipeline. Called once at process startup.
pub fn start_pipeline(config: AuditPipelineConfig, store: Arc<dyn AuditStore>) -> AuditPipeline {
    let mut pipeline = AuditPipeline::new(config, store);
    pipeline.start();
    pipeline
}

/// Stops a pipeline started with [`start_pipeline`]. Called once at process shutdown.
pub async fn stop_pipeline(pipeline: AuditPipeline) -> PipelineStatsSnapshot {
    pipeline.stop().await
}
