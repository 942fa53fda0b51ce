//! Orchestrator RPC client.
//!
//! A [`BabylonClient`] comes in two forms. The top-level form owns a session
//! that it creates lazily on first use. The re-entrant form is bound to the
//! session of a request an extension is currently handling, so nested calls
//! land in the same session log.

pub mod action;
pub mod client;
pub mod error;

pub use action::ActionRequest;
pub use client::BabylonClient;
pub use error::{ClientError, ClientResult};
