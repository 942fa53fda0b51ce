//! Execution outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one capability invocation.
///
/// `message` is always present, also for failures. `data` stays in the
/// model but is not part of the execute response (see [`ExecutionResponse`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ExecutionOutcome {
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            data: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    /// Attach a data payload to the outcome.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Wire form of an [`ExecutionOutcome`]: `{success, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    pub message: String,
}

impl From<&ExecutionOutcome> for ExecutionResponse {
    fn from(outcome: &ExecutionOutcome) -> Self {
        Self {
            success: outcome.success,
            message: outcome.message.clone(),
        }
    }
}

impl From<ExecutionOutcome> for ExecutionResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            success: outcome.success,
            message: outcome.message,
        }
    }
}

impl From<ExecutionResponse> for ExecutionOutcome {
    fn from(response: ExecutionResponse) -> Self {
        Self::new(response.success, response.message)
    }
}
