use thiserror::Error;

/// Errors raised by the audit store and its transactions.
///
/// None of these ever reach a producer: the pipeline logs them and moves on.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("audit transaction already finished")]
    TransactionClosed,

    #[error("audit insert statement has not been prepared")]
    StatementNotPrepared,

    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

impl AuditError {
    /// Short machine-readable label used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            AuditError::Database(sqlx::Error::PoolTimedOut) => "POOL_TIMED_OUT",
            AuditError::Database(sqlx::Error::PoolClosed) => "POOL_CLOSED",
            AuditError::Database(_) => "DATABASE_ERROR",
            AuditError::TransactionClosed => "TRANSACTION_CLOSED",
            AuditError::StatementNotPrepared => "STATEMENT_NOT_PREPARED",
            AuditError::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}
