//! Replays newline-delimited JSON audit events into `audit_logs`.
//!
//! Usage: `audit_replay [FILE]` (reads stdin when no file is given). Each line is one
//! event, e.g. `{"actor_id":1,"kind":"UPDATE","resource_type":"roles","resource_id":4}`.

use std::sync::Arc;

use adminbe_backend::{
    config::Config,
    db::connection::create_pool,
    models::audit_event::AuditEvent,
    services::{
        audit_pipeline::{start_pipeline, stop_pipeline, AuditProducer},
        audit_store::PgAuditStore,
    },
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adminbe_backend=info,audit_replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let pipeline = start_pipeline(config.audit.clone(), Arc::new(PgAuditStore::new(pool)));
    let producer = pipeline.producer();
    let chunk_size = config.audit.batch_size;

    let replayed = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            replay(BufReader::new(file), &producer, chunk_size).await
        }
        None => replay(BufReader::new(tokio::io::stdin()), &producer, chunk_size).await,
    };

    let stats = stop_pipeline(pipeline).await;
    let (read, skipped) = replayed?;
    tracing::info!(
        read,
        skipped,
        persisted = stats.persisted,
        failed = stats.failed,
        dropped = stats.dropped,
        "Audit replay finished"
    );

    if stats.failed > 0 || stats.dropped > 0 {
        anyhow::bail!(
            "{} audit events could not be persisted",
            stats.failed + stats.dropped
        );
    }
    Ok(())
}

/// Feeds parsed events to the batch worker in chunks. Returns (lines read, lines skipped).
async fn replay<R>(
    reader: R,
    producer: &AuditProducer,
    chunk_size: usize,
) -> anyhow::Result<(usize, usize)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut read = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await? {
        read += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEvent>(&line) {
            Ok(event) => chunk.push(event),
            Err(err) => {
                skipped += 1;
                tracing::warn!(line = read, error = %err, "Skipping malformed audit event");
                continue;
            }
        }
        if chunk.len() >= chunk_size {
            let batch = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
            producer.enqueue_batch(batch).await;
        }
    }
    producer.enqueue_batch(chunk).await;

    Ok((read, skipped))
}
