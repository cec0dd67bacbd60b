use chrono::{DateTime, Utc};
use sqlx::{postgres::PgArguments, query::Query, types::Json, PgPool, Postgres};

use crate::models::{audit_event::AuditEvent, audit_log::AuditLog};

pub const INSERT_AUDIT_LOG_SQL: &str = "INSERT INTO audit_logs \
     (user_id, event_type, table_name, record_id, old_values, new_values, ip_address, user_agent) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const SELECT_AUDIT_LOG_COLUMNS: &str = "SELECT id, user_id, event_type, table_name, record_id, \
     old_values, new_values, ip_address, user_agent, created_at FROM audit_logs";

/// Binds the columns of [`INSERT_AUDIT_LOG_SQL`] in order.
///
/// Works for both ad-hoc queries and queries built from a prepared statement.
pub fn bind_audit_event<'q>(
    query: Query<'q, Postgres, PgArguments>,
    event: &AuditEvent,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(event.actor_id())
        .bind(event.kind().as_str())
        .bind(event.resource_type().to_owned())
        .bind(event.resource_id())
        .bind(event.before_state().cloned().map(Json))
        .bind(event.after_state().cloned().map(Json))
        .bind(event.ip_address().map(str::to_owned))
        .bind(event.user_agent().map(str::to_owned))
}

pub async fn insert_audit_log(pool: &PgPool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    bind_audit_event(sqlx::query(INSERT_AUDIT_LOG_SQL), event)
        .execute(pool)
        .await
        .map(|_| ())
}

pub async fn fetch_audit_log(pool: &PgPool, id: i64) -> Result<Option<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(&format!("{} WHERE id = $1", SELECT_AUDIT_LOG_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_audit_logs_for_record(
    pool: &PgPool,
    table_name: &str,
    record_id: i64,
) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(&format!(
        "{} WHERE table_name = $1 AND record_id = $2 ORDER BY created_at ASC, id ASC",
        SELECT_AUDIT_LOG_COLUMNS
    ))
    .bind(table_name)
    .bind(record_id)
    .fetch_all(pool)
    .await
}

pub async fn count_audit_logs(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(pool)
        .await
}

pub async fn delete_audit_logs_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
