use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

/// Schema statements applied at startup, in order. All idempotent, so a
/// restart against an existing database is a no-op.
const BOOTSTRAP_STATEMENTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS parley",
    "CREATE TABLE IF NOT EXISTS parley.messages (
        id UUID PRIMARY KEY,
        sender_id UUID NOT NULL,
        receiver_id UUID NOT NULL,
        content TEXT,
        attachment_url TEXT,
        attachment_kind TEXT,
        attachment_name TEXT,
        sent_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        edited BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT message_has_one_body CHECK ((content IS NULL) <> (attachment_url IS NULL))
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_pair_sent_at
        ON parley.messages (LEAST(sender_id, receiver_id), GREATEST(sender_id, receiver_id), sent_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_sender ON parley.messages (sender_id, sent_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON parley.messages (receiver_id, sent_at)",
];

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database error executing bootstrap statement {index}: {source}")]
    Sql {
        index: usize,
        #[source]
        source: sqlx::Error,
    },
}

/// Applies the embedded schema statements in order.
pub async fn run(pool: &PgPool) -> Result<(), BootstrapError> {
    info!(
        statements = BOOTSTRAP_STATEMENTS.len(),
        "running database bootstrap"
    );

    for (index, statement) in BOOTSTRAP_STATEMENTS.iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|source| BootstrapError::Sql { index, source })?;
    }

    Ok(())
}

/// Simple liveness check used during startup.
pub async fn ensure_liveness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
