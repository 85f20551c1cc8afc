use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

const CREATE_EXCHANGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chat_exchanges (
    id           UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_message TEXT NOT NULL,
    bot_response TEXT NOT NULL,
    timestamp    TIMESTAMPTZ NOT NULL DEFAULT now(),
    seq          BIGSERIAL
)
"#;

// Tables created before `seq` existed get it here; existing rows are numbered
// in physical order.
const ADD_EXCHANGES_SEQ: &str =
    "ALTER TABLE chat_exchanges ADD COLUMN IF NOT EXISTS seq BIGSERIAL";

/// Insertion order breaks ties between rows sharing a timestamp (`now()` is
/// fixed per transaction).
const CREATE_EXCHANGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS chat_exchanges_recent_idx ON chat_exchanges (timestamp DESC, seq DESC)";

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// Create the exchange table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_EXCHANGES_TABLE).execute(pool).await?;
    sqlx::query(ADD_EXCHANGES_SEQ).execute(pool).await?;
    sqlx::query(CREATE_EXCHANGES_INDEX).execute(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
