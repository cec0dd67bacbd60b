use adminbe_backend::{
    config::Config,
    db::connection::create_pool,
    services::audit_log::{AuditLogRetentionPolicy, AuditLogService},
};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adminbe_backend=info,audit_retention=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let policy = AuditLogRetentionPolicy::from_config(&config);
    if policy == AuditLogRetentionPolicy::Forever {
        tracing::info!("Audit log retention is set to forever, nothing to delete");
        return Ok(());
    }

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let service = AuditLogService::new(pool.clone());
    let deleted = service.apply_retention(policy, Utc::now()).await?;
    if deleted > 0 {
        tracing::info!(
            deleted,
            retention_days = config.audit_log_retention_days,
            "Deleted expired audit logs"
        );
    }

    sqlx::query("VACUUM (ANALYZE) audit_logs")
        .execute(&pool)
        .await?;

    Ok(())
}
