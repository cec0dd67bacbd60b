//! Persistence seam of the audit pipeline.
//!
//! The committer only talks to [`AuditStore`] and [`AuditStoreTransaction`], so tests
//! can swap PostgreSQL for an in-memory or mocked store.

use async_trait::async_trait;
use sqlx::postgres::{PgStatement, PgTransaction};
use sqlx::{Connection, Executor, PgPool, Statement};

use crate::error::AuditError;
use crate::models::audit_event::AuditEvent;
use crate::repositories::{audit_log, transaction};

/// A durable sink for audit events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Opens an independent transaction for one batch.
    async fn begin(&self) -> Result<Box<dyn AuditStoreTransaction>, AuditError>;

    /// Persists a single event outside of any batch transaction.
    async fn insert(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// A transaction scoped to a single batch commit.
///
/// Dropping an unfinished transaction discards everything inserted through it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStoreTransaction: Send {
    /// Prepares the insert statement reused by every [`insert`](Self::insert).
    async fn prepare_insert(&mut self) -> Result<(), AuditError>;

    async fn insert(&mut self, event: &AuditEvent) -> Result<(), AuditError>;

    async fn commit(&mut self) -> Result<(), AuditError>;

    async fn rollback(&mut self) -> Result<(), AuditError>;
}

#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn begin(&self) -> Result<Box<dyn AuditStoreTransaction>, AuditError> {
        let tx = transaction::begin_transaction(&self.pool).await?;
        Ok(Box::new(PgAuditTransaction {
            tx: Some(tx),
            statement: None,
        }))
    }

    async fn insert(&self, event: &AuditEvent) -> Result<(), AuditError> {
        audit_log::insert_audit_log(&self.pool, event).await?;
        Ok(())
    }
}

struct PgAuditTransaction {
    tx: Option<PgTransaction<'static>>,
    statement: Option<PgStatement<'static>>,
}

#[async_trait]
impl AuditStoreTransaction for PgAuditTransaction {
    async fn prepare_insert(&mut self) -> Result<(), AuditError> {
        let tx = self.tx.as_mut().ok_or(AuditError::TransactionClosed)?;
        let statement = (&mut **tx).prepare(audit_log::INSERT_AUDIT_LOG_SQL).await?;
        self.statement = Some(statement);
        Ok(())
    }

    async fn insert(&mut self, event: &AuditEvent) -> Result<(), AuditError> {
        let tx = self.tx.as_mut().ok_or(AuditError::TransactionClosed)?;
        let statement = self
            .statement
            .as_ref()
            .ok_or(AuditError::StatementNotPrepared)?;

        // A failed statement aborts the whole Postgres transaction unless it is
        // confined to a savepoint.
        let mut savepoint = Connection::begin(&mut **tx).await?;
        let result = audit_log::bind_audit_event(statement.query(), event)
            .execute(&mut *savepoint)
            .await;
        match result {
            Ok(_) => {
                savepoint.commit().await?;
                Ok(())
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn commit(&mut self) -> Result<(), AuditError> {
        let tx = self.tx.take().ok_or(AuditError::TransactionClosed)?;
        self.statement = None;
        transaction::commit_transaction(tx).await
    }

    async fn rollback(&mut self) -> Result<(), AuditError> {
        let tx = self.tx.take().ok_or(AuditError::TransactionClosed)?;
        self.statement = None;
        transaction::rollback_transaction(tx).await
    }
}
