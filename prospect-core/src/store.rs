//! Exchange store: the append-only log of chat exchanges
//!
//! Provides an `ExchangeStore` trait with implementations for:
//! - **Postgres**: the `chat_exchanges` table via sqlx
//! - **Memory**: a process-local log for development and tests

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::ProspectError;
use crate::models::ChatExchange;

// ============================================================================
// ExchangeStore trait
// ============================================================================

#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Persist one exchange. The store assigns the id and timestamp.
    async fn append(
        &self,
        user_message: &str,
        bot_response: &str,
    ) -> Result<ChatExchange, ProspectError>;

    /// Newest first, at most `limit` rows.
    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatExchange>, ProspectError>;

    async fn get(&self, id: Uuid) -> Result<Option<ChatExchange>, ProspectError>;

    /// Backend status string for health reporting.
    async fn health(&self) -> Result<String, ProspectError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Create the store selected by `[database] backend`.
pub async fn create_store(
    config: &DatabaseConfig,
) -> Result<Arc<dyn ExchangeStore>, ProspectError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryExchangeStore::new())),
        "postgres" => {
            let pool = crate::db::create_pool(config).await?;
            crate::db::ensure_schema(&pool).await?;
            Ok(Arc::new(PgExchangeStore::new(pool)))
        }
        other => Err(ProspectError::Other(format!(
            "unknown database backend '{}'",
            other
        ))),
    }
}

// ============================================================================
// PgExchangeStore
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgExchangeStore {
    pool: PgPool,
}

impl PgExchangeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExchangeStore for PgExchangeStore {
    async fn append(
        &self,
        user_message: &str,
        bot_response: &str,
    ) -> Result<ChatExchange, ProspectError> {
        let row: ChatExchange = sqlx::query_as(
            r#"
            INSERT INTO chat_exchanges (user_message, bot_response)
            VALUES ($1, $2)
            RETURNING id, user_message, bot_response, timestamp
            "#,
        )
        .bind(user_message)
        .bind(bot_response)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatExchange>, ProspectError> {
        let rows: Vec<ChatExchange> = sqlx::query_as(
            "SELECT id, user_message, bot_response, timestamp FROM chat_exchanges
             ORDER BY timestamp DESC, seq DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatExchange>, ProspectError> {
        let row: Option<ChatExchange> = sqlx::query_as(
            "SELECT id, user_message, bot_response, timestamp FROM chat_exchanges WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn health(&self) -> Result<String, ProspectError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// MemoryExchangeStore
// ============================================================================

/// In-process exchange log. Contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryExchangeStore {
    inner: Arc<RwLock<Vec<ChatExchange>>>,
}

impl MemoryExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl ExchangeStore for MemoryExchangeStore {
    async fn append(
        &self,
        user_message: &str,
        bot_response: &str,
    ) -> Result<ChatExchange, ProspectError> {
        let mut guard = self.inner.write().await;
        // Timestamps never go backwards within the log, even if the clock does.
        let mut timestamp = Utc::now();
        if let Some(last) = guard.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }
        let exchange = ChatExchange {
            id: Uuid::new_v4(),
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            timestamp,
        };
        guard.push(exchange.clone());
        Ok(exchange)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatExchange>, ProspectError> {
        let guard = self.inner.read().await;
        Ok(guard.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatExchange>, ProspectError> {
        let guard = self.inner.read().await;
        Ok(guard.iter().find(|e| e.id == id).cloned())
    }

    async fn health(&self) -> Result<String, ProspectError> {
        Ok(format!("memory ({} exchanges)", self.len().await))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// TESTS
// ============================================================================
