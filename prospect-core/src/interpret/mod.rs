//! Response interpreter
//!
//! One invocation is one independent cycle: read hints out of the message,
//! build the system prompt, make a single completion call, then repair and
//! normalize the reply. Nothing is shared between invocations beyond the
//! injected backend and detector.

pub mod extract;
pub mod normalize;
pub mod prompt;

use std::sync::Arc;
use thiserror::Error;

use crate::completion::{CompletionBackend, CompletionError};
use crate::models::{FailureCause, InterpretationResult};
use extract::{FieldDetector, KeywordFieldDetector};

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("{0}")]
    Remote(#[from] CompletionError),

    #[error("{message}")]
    Parse {
        message: String,
        raw_response: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<InterpretError> for InterpretationResult {
    fn from(err: InterpretError) -> Self {
        match err {
            InterpretError::Remote(e) => InterpretationResult::failure(FailureCause::Remote, e.to_string()),
            InterpretError::Parse {
                message,
                raw_response,
            } => InterpretationResult::Failure {
                message,
                raw_response: Some(raw_response),
                cause: FailureCause::Parse,
            },
            e @ InterpretError::Internal(_) => {
                InterpretationResult::failure(FailureCause::Internal, e.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct Interpreter {
    backend: Arc<dyn CompletionBackend>,
    detector: Arc<dyn FieldDetector>,
}

impl Interpreter {
    /// Interpreter using the keyword field detector.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_detector(backend, Arc::new(KeywordFieldDetector))
    }

    pub fn with_detector(backend: Arc<dyn CompletionBackend>, detector: Arc<dyn FieldDetector>) -> Self {
        Self { backend, detector }
    }

    /// Run the pipeline; errors are returned, not folded into a result.
    pub async fn try_interpret(&self, message: &str) -> Result<serde_json::Value, InterpretError> {
        let hints = extract::extract_hints(message, self.detector.as_ref());
        tracing::debug!(
            location = ?hints.location,
            custom_column = ?hints.custom_column.as_ref().map(|c| c.name.as_str()),
            fields = ?hints.relevant_fields,
            detector = self.detector.name(),
            "Extracted message hints"
        );

        let system_prompt = prompt::build_system_prompt(&hints);

        let reply = self.backend.complete(&system_prompt, message).await?;
        tracing::debug!(model = self.backend.model(), chars = reply.len(), "Completion received");

        normalize::normalize_response(&reply, &hints)
    }

    /// Run the pipeline on its own task. Every outcome, including a panic
    /// inside the pipeline, comes back as an `InterpretationResult`.
    pub async fn interpret(&self, message: &str) -> InterpretationResult {
        let this = self.clone();
        let message = message.to_string();

        let outcome = tokio::spawn(async move { this.try_interpret(&message).await }).await;

        match outcome {
            Ok(Ok(data)) => InterpretationResult::success(data),
            Ok(Err(e)) => {
                match &e {
                    InterpretError::Parse { message, .. } => {
                        tracing::warn!(error = %message, "Model reply could not be parsed")
                    }
                    other => tracing::error!(error = %other, "Interpretation failed"),
                }
                e.into()
            }
            Err(join_error) => {
                tracing::error!(error = %join_error, "Interpretation task aborted");
                InterpretError::Internal(join_error.to_string()).into()
            }
        }
    }
}
