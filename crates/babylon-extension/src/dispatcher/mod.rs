//! HTTP dispatchers wrapped around capabilities.
//!
//! A dispatcher validates an inbound request, hands it to its capability on
//! the shared worker pool and renders the result. Structurally invalid
//! requests get a 400; failures inside the capability never do.

pub mod executor;
pub mod reporter;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use babylon_core::config::CALL_DEPTH_HEADER;
use babylon_core::PayloadError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;
use crate::models::ErrorResponse;

pub use executor::ExecutorDispatcher;
pub use reporter::ReporterDispatcher;

/// Resources shared by every dispatcher in one server.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// HTTP client re-entrant clients are built from.
    pub http: reqwest::Client,
    /// Bounded pool of capability invocations.
    pub workers: Arc<Semaphore>,
    pub max_call_depth: u32,
}

impl DispatchContext {
    pub fn new(http: reqwest::Client, worker_pool_size: usize, max_call_depth: u32) -> Self {
        Self {
            http,
            workers: Arc::new(Semaphore::new(worker_pool_size)),
            max_call_depth,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.client_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(
            builder.build()?,
            config.worker_pool_size,
            config.max_call_depth,
        ))
    }

    /// Wait for a free worker.
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, ErrorResponse> {
        self.workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ErrorResponse::service_unavailable("worker pool closed"))
    }
}

pub(crate) fn source_of(remote: Option<ConnectInfo<SocketAddr>>) -> String {
    remote
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Log a client protocol error and turn it into a 400.
pub(crate) fn reject(extension: &str, source: &str, error: PayloadError) -> ErrorResponse {
    tracing::warn!(
        category = "dispatch",
        extension = %extension,
        source = %source,
        reason = %error.detail(),
        "Received invalid request"
    );
    ErrorResponse::from(error)
}

/// Nesting depth of the inbound request. Absent or unreadable means 0.
pub(crate) fn call_depth(headers: &HeaderMap) -> u32 {
    headers
        .get(CALL_DEPTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Status code chosen by a capability, 500 if it is not a valid one.
pub(crate) fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
