//! Capability traits implemented by extension authors.
//!
//! Drivers and actors implement [`Executable`]; reporters implement
//! [`Reporter`]. Neither knows about HTTP: dispatchers wrap them.

use async_trait::async_trait;
use babylon_client::{BabylonClient, ClientError};
use babylon_core::{ExecutionOutcome, Parameters, Session};
use thiserror::Error;

/// Failure inside a capability. The dispatcher turns it into a failed
/// [`ExecutionOutcome`] carrying the message.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0}")]
    Failed(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("nested call failed: {0}")]
    Client(#[from] ClientError),
}

impl CapabilityError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A driver or actor.
#[async_trait]
pub trait Executable: Send + Sync + 'static {
    /// Unique name within the category, used in routes (lower-cased).
    fn name(&self) -> &str;

    /// Extension type the orchestrator routes by, e.g. `"web"`.
    fn extension_type(&self) -> &str;

    /// Shared secret disclosed during the connect handshake.
    fn secret(&self) -> &str;

    /// Whether to self-register with the orchestrator on startup.
    fn connect_on_startup(&self) -> bool;

    /// Run `action`. `client` is bound to the session of the inbound
    /// request, so nested calls are logged in the same session.
    async fn execute(
        &self,
        action: &str,
        parameters: &Parameters,
        client: &BabylonClient,
    ) -> Result<ExecutionOutcome, CapabilityError>;

    /// Release per-session resources. Errors are logged, never returned to
    /// the orchestrator.
    async fn on_session_end(&self, _session_id: &str) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// A reporter. Status codes returned here are passed back verbatim.
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn secret(&self) -> &str;

    /// Live reporters get every log event as it happens; the others get one
    /// snapshot at session end. Fixed for the lifetime of the reporter.
    fn is_live(&self) -> bool;

    fn connect_on_startup(&self) -> bool {
        false
    }

    async fn live_log(&self, _session_id: &str, _category: &str, _message: &str) -> u16 {
        501
    }

    async fn session_end_log(&self, _session: &Session) -> u16 {
        501
    }
}
