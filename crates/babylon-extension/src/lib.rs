//! Extension side of the Babylon protocol.
//!
//! An extension process hosts one or more capabilities (drivers, actors or
//! reporters) behind an [`ExtensionServer`]. Each capability is wrapped by a
//! dispatcher that owns its HTTP routes and a [`Registrar`] that keeps track
//! of the orchestrator it belongs to.

pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod extension;
pub mod models;
pub mod registrar;
pub mod server;
pub mod shutdown;

pub use babylon_client::BabylonClient;
pub use babylon_core::{ExecutionOutcome, LogEntry, Parameters, Session};

pub use capability::{CapabilityError, Executable, Reporter};
pub use config::{ConfigError, ServerConfig};
pub use dispatcher::{DispatchContext, ExecutorDispatcher, ReporterDispatcher};
pub use extension::Extension;
pub use registrar::{
    HttpTransport, Identity, RegistrationError, RegistrationState, RegistrationStatus,
    RegistrationTransport, Registrar, RetryPolicy, TransportError,
};
pub use server::{ExtensionServer, ServerError};
