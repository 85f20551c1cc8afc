use serde::{Deserialize, Serialize};

use crate::error::ProspectError;

/// What went wrong when an interpretation failed. Not serialized; the server
/// uses it to pick the HTTP status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureCause {
    /// Transport or provider failure talking to the completion service.
    Remote,
    /// The reply could not be coerced into JSON.
    Parse,
    #[default]
    Internal,
}

impl FailureCause {
    /// HTTP status for a failure of this kind.
    pub fn http_status(self) -> u16 {
        match self {
            FailureCause::Parse => 200,
            FailureCause::Remote | FailureCause::Internal => 500,
        }
    }
}

/// Outcome of one interpretation, tagged by `status` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InterpretationResult {
    Success {
        data: serde_json::Value,
    },
    #[serde(rename = "error")]
    Failure {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
        #[serde(skip)]
        cause: FailureCause,
    },
}

impl InterpretationResult {
    pub fn success(data: serde_json::Value) -> Self {
        InterpretationResult::Success { data }
    }

    pub fn failure(cause: FailureCause, message: impl Into<String>) -> Self {
        InterpretationResult::Failure {
            message: message.into(),
            raw_response: None,
            cause,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InterpretationResult::Success { .. })
    }

    /// `None` for successes.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        match self {
            InterpretationResult::Success { .. } => None,
            InterpretationResult::Failure { cause, .. } => Some(*cause),
        }
    }

    /// The form stored in `chat_exchanges.bot_response`.
    pub fn to_json_string(&self) -> Result<String, ProspectError> {
        Ok(serde_json::to_string(self)?)
    }
}
