//! Shared data model for the Babylon extension protocol.
//!
//! Everything that crosses the wire between an extension and its
//! orchestrator is defined here, together with the strict decoders used by
//! extension endpoints and the configuration constants every crate shares.

pub mod address;
pub mod category;
pub mod config;
pub mod descriptor;
pub mod outcome;
pub mod parameters;
pub mod payload;
pub mod session;

pub use address::{AddressError, OrchestratorAddress};
pub use category::ExtensionCategory;
pub use descriptor::{ExtensionDescriptor, SelfRegistration};
pub use outcome::{ExecutionOutcome, ExecutionResponse};
pub use parameters::Parameters;
pub use payload::{ConnectRequest, ExecuteRequest, LiveLogEvent, PayloadError};
pub use session::{LogEntry, Session, SessionContext, SessionError};
