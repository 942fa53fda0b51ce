use async_trait::async_trait;
use babylon_extension::{
    BabylonClient, CapabilityError, ExecutionOutcome, Executable, Parameters,
};

/// Actor that performs one driver action per request through the
/// orchestrator, inside the caller's session.
pub struct ExampleActor {
    secret: String,
    connect_on_startup: bool,
    driver_type: String,
}

impl ExampleActor {
    pub fn new(secret: impl Into<String>, connect_on_startup: bool) -> Self {
        Self {
            secret: secret.into(),
            connect_on_startup,
            driver_type: "example".to_string(),
        }
    }
}

#[async_trait]
impl Executable for ExampleActor {
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
        client: &BabylonClient,
    ) -> Result<ExecutionOutcome, CapabilityError> {
        let driver = client
            .driver(&self.driver_type)
            .action("doSomething")
            .parameter("test", 1234)
            .execute()
            .await?;

        let message = format!(
            "Executed action '{}' with parameters: {} (driver: {})",
            action, parameters, driver.message
        );
        Ok(ExecutionOutcome::new(driver.success, message))
    }
}
