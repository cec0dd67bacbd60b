use async_channel::{Sender, TrySendError};
use serde_json::Value;
use std::sync::Arc;

use crate::models::audit_event::{AuditEvent, AuditEventKind};

use super::stats::PipelineStats;

/// Cloneable handle request handlers use to hand audit events to the pipeline.
///
/// Every method except [`enqueue_batch`](Self::enqueue_batch) returns immediately;
/// a full queue means the event is dropped and a warning is logged.
#[derive(Clone)]
pub struct AuditProducer {
    events: Sender<AuditEvent>,
    batches: Sender<Vec<AuditEvent>>,
    stats: Arc<PipelineStats>,
}

impl AuditProducer {
    pub(crate) fn new(
        events: Sender<AuditEvent>,
        batches: Sender<Vec<AuditEvent>>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            events,
            batches,
            stats,
        }
    }

    /// Records one state change. Returns `false` when the event was dropped.
    pub fn submit_event(
        &self,
        actor_id: Option<i64>,
        kind: AuditEventKind,
        resource_type: impl Into<String>,
        resource_id: i64,
        before_state: Option<Value>,
        after_state: Option<Value>,
    ) -> bool {
        let event = AuditEvent::new(kind, resource_type, resource_id)
            .with_actor(actor_id)
            .with_before_state(before_state)
            .with_after_state(after_state);
        self.try_enqueue(event)
    }

    pub fn try_enqueue(&self, event: AuditEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => {
                self.stats.record_enqueued(1);
                true
            }
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    event_type = %event.kind(),
                    table_name = event.resource_type(),
                    record_id = event.resource_id(),
                    "Audit log queue full, dropping event"
                );
                self.stats.record_dropped(1);
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    event_type = %event.kind(),
                    table_name = event.resource_type(),
                    record_id = event.resource_id(),
                    "Audit pipeline stopped, dropping event"
                );
                self.stats.record_dropped(1);
                false
            }
        }
    }

    /// Hands a pre-formed batch to the dedicated batch worker without waiting.
    pub fn submit_batch(&self, events: Vec<AuditEvent>) -> bool {
        if events.is_empty() {
            return true;
        }
        let len = events.len() as u64;
        match self.batches.try_send(events) {
            Ok(()) => {
                self.stats.record_enqueued(len);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(batch_len = len, "Audit batch queue full, dropping batch");
                self.stats.record_dropped(len);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(batch_len = len, "Audit pipeline stopped, dropping batch");
                self.stats.record_dropped(len);
                false
            }
        }
    }

    /// Waits for room in the batch queue. For offline producers only; request
    /// handlers use [`submit_batch`](Self::submit_batch).
    pub async fn enqueue_batch(&self, events: Vec<AuditEvent>) -> bool {
        if events.is_empty() {
            return true;
        }
        let len = events.len() as u64;
        match self.batches.send(events).await {
            Ok(()) => {
                self.stats.record_enqueued(len);
                true
            }
            Err(_) => {
                tracing::warn!(batch_len = len, "Audit pipeline stopped, dropping batch");
                self.stats.record_dropped(len);
                false
            }
        }
    }

    /// Number of events waiting in the ingestion queue.
    pub fn queued_events(&self) -> usize {
        self.events.len()
    }
}
