//! Action request builder.

use babylon_core::{ExecutionOutcome, ExtensionCategory, Parameters};
use serde_json::Value;

use crate::client::BabylonClient;
use crate::error::{ClientError, ClientResult};

/// One action against a driver or actor, routed through the orchestrator.
///
/// ```ignore
/// let outcome = client
///     .driver("web")
///     .action("open")
///     .parameter("url", "https://example.com")
///     .execute()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ActionRequest {
    client: BabylonClient,
    category: ExtensionCategory,
    extension_type: String,
    action: Option<String>,
    parameters: Parameters,
}

impl ActionRequest {
    pub(crate) fn new(
        client: BabylonClient,
        category: ExtensionCategory,
        extension_type: impl Into<String>,
    ) -> Self {
        Self {
            client,
            category,
            extension_type: extension_type.into(),
            action: None,
            parameters: Parameters::new(),
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn category(&self) -> ExtensionCategory {
        self.category
    }

    pub fn extension_type(&self) -> &str {
        &self.extension_type
    }

    /// Send the action. Resolves the session first if the client owns it.
    pub async fn execute(self) -> ClientResult<ExecutionOutcome> {
        let action = self.action.as_deref().ok_or(ClientError::MissingAction)?;
        self.client
            .execute(self.category, &self.extension_type, action, &self.parameters)
            .await
    }
}
