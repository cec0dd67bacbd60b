use async_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::audit_event::AuditEvent;

use super::accumulator::BatchAccumulator;
use super::committer::BatchCommitter;

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Size,
    Timer,
    Shutdown,
    QueueClosed,
}

impl FlushTrigger {
    fn as_str(self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Shutdown => "shutdown",
            FlushTrigger::QueueClosed => "queue_closed",
        }
    }
}

/// Pulls events off the shared queue and flushes them in size- or time-bounded batches.
pub(crate) struct EventWorker {
    id: usize,
    events: Receiver<AuditEvent>,
    committer: Arc<BatchCommitter>,
    shutdown: CancellationToken,
    batch: BatchAccumulator,
    flush_interval: Duration,
}

impl EventWorker {
    pub(crate) fn new(
        id: usize,
        events: Receiver<AuditEvent>,
        committer: Arc<BatchCommitter>,
        shutdown: CancellationToken,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            id,
            events,
            committer,
            shutdown,
            batch: BatchAccumulator::new(batch_size),
            flush_interval,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!(worker_id = self.id, "Audit worker started");

        let timer = tokio::time::sleep(self.flush_interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.drain().await;
                    break;
                }
                () = &mut timer => {
                    self.flush(FlushTrigger::Timer).await;
                    timer.as_mut().reset(Instant::now() + self.flush_interval);
                }
                received = self.events.recv() => match received {
                    Ok(event) => {
                        if let Some(batch) = self.batch.push(event) {
                            self.commit(batch, FlushTrigger::Size).await;
                            timer.as_mut().reset(Instant::now() + self.flush_interval);
                        }
                    }
                    Err(_) => {
                        self.flush(FlushTrigger::QueueClosed).await;
                        break;
                    }
                },
            }
        }

        tracing::debug!(worker_id = self.id, "Audit worker stopped");
    }

    /// Empties whatever is still queued into local batches, then flushes the remainder once.
    async fn drain(&mut self) {
        let mut drained = 0usize;
        while let Ok(event) = self.events.try_recv() {
            drained += 1;
            if let Some(batch) = self.batch.push(event) {
                self.commit(batch, FlushTrigger::Shutdown).await;
            }
        }
        if drained > 0 {
            tracing::debug!(
                worker_id = self.id,
                drained,
                "Drained queued audit events on shutdown"
            );
        }
        self.flush(FlushTrigger::Shutdown).await;
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        if let Some(batch) = self.batch.take() {
            self.commit(batch, trigger).await;
        }
    }

    async fn commit(&self, batch: Vec<AuditEvent>, trigger: FlushTrigger) {
        let oldest_age_ms = batch
            .first()
            .map(|event| event.age().as_millis() as u64)
            .unwrap_or_default();
        tracing::debug!(
            worker_id = self.id,
            batch_len = batch.len(),
            trigger = trigger.as_str(),
            oldest_age_ms,
            "Flushing audit batch"
        );
        self.committer.commit(&batch).await;
    }
}

/// Commits pre-formed batches submitted through the batch queue.
pub(crate) struct BatchWorker {
    batches: Receiver<Vec<AuditEvent>>,
    committer: Arc<BatchCommitter>,
    shutdown: CancellationToken,
}

impl BatchWorker {
    pub(crate) fn new(
        batches: Receiver<Vec<AuditEvent>>,
        committer: Arc<BatchCommitter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            batches,
            committer,
            shutdown,
        }
    }

    pub(crate) async fn run(self) {
        tracing::debug!("Audit batch worker started");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    while let Ok(batch) = self.batches.try_recv() {
                        self.committer.commit(&batch).await;
                    }
                    break;
                }
                received = self.batches.recv() => match received {
                    Ok(batch) => {
                        self.committer.commit(&batch).await;
                    }
                    Err(_) => break,
                },
            }
        }

        tracing::debug!("Audit batch worker stopped");
    }
}
