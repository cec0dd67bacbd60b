//! Transaction management utilities for repositories.

use crate::error::AuditError;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

/// Begin a new database transaction.
///
/// The returned handle owns its connection, so it can outlive the borrow of the pool
/// and be moved into a worker task.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, AuditError> {
    db.begin().await.map_err(AuditError::from)
}

/// Commit a transaction.
pub async fn commit_transaction(tx: PgTransaction<'static>) -> Result<(), AuditError> {
    tx.commit().await.map_err(AuditError::from)
}

/// Rollback a transaction.
///
/// Undoes all changes made within the transaction since it began.
pub async fn rollback_transaction(tx: PgTransaction<'static>) -> Result<(), AuditError> {
    tx.rollback().await.map_err(AuditError::from)
}
