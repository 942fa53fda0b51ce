//! Client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Orchestrator returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response from orchestrator: {0}")]
    InvalidResponse(String),

    #[error("No action set on request")]
    MissingAction,

    #[error("No active session")]
    NoActiveSession,

    #[error("Session {0} belongs to the caller and cannot be ended here")]
    SessionNotOwned(String),

    #[error("Nested call depth {depth} exceeds the limit of {max}")]
    CallDepthExceeded { depth: u32, max: u32 },
}

pub type ClientResult<T> = Result<T, ClientError>;
