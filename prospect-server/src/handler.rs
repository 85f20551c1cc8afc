//! Request handler: input validation, interpretation and exchange recording
//!
//! Every accepted message produces exactly one stored exchange, whatever the
//! interpretation outcome. Store failures on that write are logged and do not
//! change what the caller gets back.

use std::sync::Arc;

use prospect_core::{
    ChatExchange, ExchangeStore, InterpretError, InterpretationResult, Interpreter, ProspectError,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Message is required")]
    Validation,

    #[error("Store error: {0}")]
    Store(#[from] ProspectError),
}

#[derive(Clone)]
pub struct ChatHandler {
    interpreter: Interpreter,
    store: Arc<dyn ExchangeStore>,
    history_limit: u32,
}

impl ChatHandler {
    pub fn new(interpreter: Interpreter, store: Arc<dyn ExchangeStore>, history_limit: u32) -> Self {
        Self {
            interpreter,
            store,
            history_limit: history_limit.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn ExchangeStore> {
        &self.store
    }

    pub fn history_limit(&self) -> u32 {
        self.history_limit
    }

    /// Newest first. `limit` defaults to, and is capped at, the history limit.
    pub async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<ChatExchange>, HandlerError> {
        let limit = limit.unwrap_or(self.history_limit).min(self.history_limit);
        Ok(self.store.list_recent(limit).await?)
    }

    pub async fn send_message(&self, message: Option<&str>) -> Result<InterpretationResult, HandlerError> {
        let message = match message {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ => return Err(HandlerError::Validation),
        };

        tracing::info!(chars = message.len(), "Processing message");

        // Interpretation and the store write run detached from the caller, so
        // the exchange is recorded even if the caller goes away.
        let this = self.clone();
        let task = tokio::spawn(async move { this.interpret_and_record(&message).await });

        match task.await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(error = %e, "Message task aborted");
                Ok(InterpretError::Internal(e.to_string()).into())
            }
        }
    }

    async fn interpret_and_record(&self, message: &str) -> InterpretationResult {
        let result = self.interpreter.interpret(message).await;

        let stored = match result.to_json_string() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize interpretation result");
                serde_json::json!({ "status": "error", "message": e.to_string() }).to_string()
            }
        };

        match self.store.append(message, &stored).await {
            Ok(exchange) => tracing::debug!(id = %exchange.id, "Exchange stored"),
            Err(e) => tracing::error!(error = %e, store = self.store.name(), "Failed to store exchange"),
        }

        result
    }

    pub async fn get_exchange(&self, id: Uuid) -> Result<Option<ChatExchange>, HandlerError> {
        Ok(self.store.get(id).await?)
    }
}
