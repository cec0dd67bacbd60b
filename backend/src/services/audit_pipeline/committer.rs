//! Batch committer.
//!
//! A batch is written inside one transaction through a single prepared insert. When the
//! transaction cannot be opened, or the statement cannot be prepared, every event is
//! inserted on its own instead. Failures are logged and counted; nothing is retried and
//! nothing is returned to the producer.

use std::sync::Arc;

use crate::error::AuditError;
use crate::models::audit_event::AuditEvent;
use crate::services::audit_store::{AuditStore, AuditStoreTransaction};

use super::stats::PipelineStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Inserts ran inside one committed transaction.
    Transactional,
    /// Inserts ran one by one outside a transaction.
    Fallback,
    /// The commit failed and the transaction's inserts were discarded.
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    pub mode: CommitMode,
    pub persisted: usize,
    pub failed: usize,
}

impl CommitReport {
    fn empty() -> Self {
        Self {
            mode: CommitMode::Transactional,
            persisted: 0,
            failed: 0,
        }
    }
}

pub struct BatchCommitter {
    store: Arc<dyn AuditStore>,
    stats: Arc<PipelineStats>,
}

impl BatchCommitter {
    pub fn new(store: Arc<dyn AuditStore>, stats: Arc<PipelineStats>) -> Self {
        Self { store, stats }
    }

    pub async fn commit(&self, batch: &[AuditEvent]) -> CommitReport {
        if batch.is_empty() {
            return CommitReport::empty();
        }

        let report = self.commit_batch(batch).await;
        self.stats
            .record_commit(report.persisted as u64, report.failed as u64);
        tracing::debug!(
            batch_len = batch.len(),
            mode = ?report.mode,
            persisted = report.persisted,
            failed = report.failed,
            "Committed audit batch"
        );
        report
    }

    async fn commit_batch(&self, batch: &[AuditEvent]) -> CommitReport {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    code = err.code(),
                    batch_len = batch.len(),
                    "Failed to start audit batch transaction, falling back to individual inserts"
                );
                return self.insert_individually(batch).await;
            }
        };

        if let Err(err) = tx.prepare_insert().await {
            tracing::warn!(
                error = %err,
                code = err.code(),
                batch_len = batch.len(),
                "Failed to prepare audit batch statement, falling back to individual inserts"
            );
            if let Err(err) = tx.rollback().await {
                tracing::debug!(error = %err, "Failed to roll back unused audit transaction");
            }
            return self.insert_individually(batch).await;
        }

        let inserted = insert_within(tx.as_mut(), batch).await;
        let skipped = batch.len() - inserted;

        match tx.commit().await {
            Ok(()) => CommitReport {
                mode: CommitMode::Transactional,
                persisted: inserted,
                failed: skipped,
            },
            Err(err) => {
                tracing::error!(
                    error = %err,
                    code = err.code(),
                    batch_len = batch.len(),
                    lost = inserted,
                    "Failed to commit audit batch transaction"
                );
                CommitReport {
                    mode: CommitMode::RolledBack,
                    persisted: 0,
                    failed: batch.len(),
                }
            }
        }
    }

    async fn insert_individually(&self, batch: &[AuditEvent]) -> CommitReport {
        let mut persisted = 0;
        for event in batch {
            match self.store.insert(event).await {
                Ok(()) => persisted += 1,
                Err(err) => log_insert_failure(event, &err, "Failed to insert audit log"),
            }
        }
        CommitReport {
            mode: CommitMode::Fallback,
            persisted,
            failed: batch.len() - persisted,
        }
    }
}

async fn insert_within(tx: &mut dyn AuditStoreTransaction, batch: &[AuditEvent]) -> usize {
    let mut inserted = 0;
    for event in batch {
        match tx.insert(event).await {
            Ok(()) => inserted += 1,
            Err(err) => log_insert_failure(event, &err, "Failed to execute batch audit insert"),
        }
    }
    inserted
}

fn log_insert_failure(event: &AuditEvent, err: &AuditError, message: &str) {
    tracing::warn!(
        error = %err,
        code = err.code(),
        event_type = %event.kind(),
        table_name = event.resource_type(),
        record_id = event.resource_id(),
        "{}",
        message
    );
}
