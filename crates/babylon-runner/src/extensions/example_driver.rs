use async_trait::async_trait;
use babylon_extension::{
    BabylonClient, CapabilityError, ExecutionOutcome, Executable, Parameters,
};

/// Driver that reports back what it was asked to do.
pub struct ExampleDriver {
    secret: String,
    connect_on_startup: bool,
}

impl ExampleDriver {
    pub fn new(secret: impl Into<String>, connect_on_startup: bool) -> Self {
        Self {
            secret: secret.into(),
            connect_on_startup,
        }
    }
}

#[async_trait]
impl Executable for ExampleDriver {
    fn name(&self) -> &str {
        "example"
    }

    fn extension_type(&self) -> &str {
        "example"
    }

    fn secret(&self) -> &str {
        &self.secret
    }

    fn connect_on_startup(&self) -> bool {
        self.connect_on_startup
    }

    async fn execute(
        &self,
        action: &str,
        parameters: &Parameters,
        _client: &BabylonClient,
    ) -> Result<ExecutionOutcome, CapabilityError> {
        let message = format!("Executed action '{}' with parameters: {}", action, parameters);
        tracing::info!(category = "example", extension = "driver", "{}", message);
        Ok(ExecutionOutcome::success(message))
    }

    async fn on_session_end(&self, session_id: &str) -> Result<(), CapabilityError> {
        tracing::info!(category = "example", session = %session_id, "Session ended");
        Ok(())
    }
}
