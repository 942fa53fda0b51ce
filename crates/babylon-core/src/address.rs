//! Orchestrator network address.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::defaults;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("malformed callback URL: {0}")]
    Malformed(String),

    #[error("callback URL has no host: {0}")]
    MissingHost(String),

    #[error("callback URL has no usable port: {0}")]
    MissingPort(String),
}

/// Where the orchestrator can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrchestratorAddress {
    pub host: String,
    pub port: u16,
}

impl OrchestratorAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL with a trailing slash, e.g. `http://localhost:8080/`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// Parse the authority of a connect-handshake callback URL.
    ///
    /// A callback without an explicit port uses the scheme's default port.
    pub fn from_callback(callback: &str) -> Result<Self, AddressError> {
        let url = Url::parse(callback).map_err(|_| AddressError::Malformed(callback.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AddressError::MissingHost(callback.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AddressError::MissingPort(callback.to_string()))?;

        Ok(Self::new(host, port))
    }
}

impl Default for OrchestratorAddress {
    fn default() -> Self {
        Self::new(defaults::ORCHESTRATOR_HOST, defaults::ORCHESTRATOR_PORT)
    }
}

impl fmt::Display for OrchestratorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
