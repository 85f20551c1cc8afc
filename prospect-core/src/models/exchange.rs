use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user message and the serialized interpretation it produced.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatExchange {
    pub id: Uuid,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}
