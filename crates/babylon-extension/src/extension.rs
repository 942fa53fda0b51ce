//! The closed set of extension variants a server can host.

use std::sync::Arc;

use axum::Router;
use babylon_core::{ExtensionCategory, OrchestratorAddress};
use tokio_util::sync::CancellationToken;

use crate::capability::{Executable, Reporter};
use crate::dispatcher::{DispatchContext, ExecutorDispatcher, ReporterDispatcher};
use crate::registrar::{
    RegistrationError, RegistrationState, RegistrationTransport, Registrar,
};

/// One hosted extension: a capability composed with its dispatcher.
#[derive(Clone)]
pub enum Extension {
    Executor(ExecutorDispatcher),
    Reporter(ReporterDispatcher),
}

impl Extension {
    pub fn driver(capability: impl Executable) -> Self {
        Self::Executor(ExecutorDispatcher::new(
            ExtensionCategory::Driver,
            Arc::new(capability),
        ))
    }

    pub fn actor(capability: impl Executable) -> Self {
        Self::Executor(ExecutorDispatcher::new(
            ExtensionCategory::Actor,
            Arc::new(capability),
        ))
    }

    pub fn reporter(capability: impl Reporter) -> Self {
        Self::Reporter(ReporterDispatcher::new(Arc::new(capability)))
    }

    pub fn category(&self) -> ExtensionCategory {
        match self {
            Self::Executor(d) => d.category(),
            Self::Reporter(_) => ExtensionCategory::Reporter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Executor(d) => d.name(),
            Self::Reporter(d) => d.name(),
        }
    }

    pub fn registrar(&self) -> &Arc<Registrar> {
        match self {
            Self::Executor(d) => d.registrar(),
            Self::Reporter(d) => d.registrar(),
        }
    }

    /// Whether the capability asks for self-registration on startup.
    pub fn connect_on_startup(&self) -> bool {
        match self {
            Self::Executor(d) => d.capability().connect_on_startup(),
            Self::Reporter(d) => d.capability().connect_on_startup(),
        }
    }

    /// Routes this extension serves.
    pub fn setup_endpoints(&self, context: &DispatchContext) -> Router {
        match self {
            Self::Executor(d) => d.routes(context),
            Self::Reporter(d) => d.routes(context),
        }
    }

    pub fn set_remote_server(&self, orchestrator: OrchestratorAddress) {
        self.registrar().set_orchestrator(orchestrator);
    }

    /// Run self-registration against the remembered orchestrator.
    pub async fn register_remote(
        &self,
        transport: &dyn RegistrationTransport,
        cancel: &CancellationToken,
    ) -> Result<RegistrationState, RegistrationError> {
        self.registrar().self_register(transport, cancel).await
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("category", &self.category())
            .field("name", &self.name())
            .finish()
    }
}
