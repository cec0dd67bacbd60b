use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;

use crate::{config::Config, repositories::audit_log};

/// How long persisted audit rows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLogRetentionPolicy {
    Forever,
    Days(i64),
}

impl AuditLogRetentionPolicy {
    pub fn from_config(config: &Config) -> Self {
        if config.audit_log_retention_forever {
            AuditLogRetentionPolicy::Forever
        } else {
            AuditLogRetentionPolicy::Days(config.audit_log_retention_days)
        }
    }

    /// Rows created before the returned instant are eligible for deletion.
    ///
    /// `None` means no row can be old enough, either because logs are kept forever or
    /// because the window reaches past the earliest representable timestamp.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            AuditLogRetentionPolicy::Forever => None,
            AuditLogRetentionPolicy::Days(days) => TimeDelta::try_days(*days)
                .and_then(|window| now.checked_sub_signed(window)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        audit_log::delete_audit_logs_before(&self.pool, cutoff).await
    }

    /// Applies the retention policy, returning how many rows were removed.
    pub async fn apply_retention(
        &self,
        policy: AuditLogRetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        match policy.cutoff(now) {
            Some(cutoff) => self.delete_logs_before(cutoff).await,
            None => Ok(0),
        }
    }
}
