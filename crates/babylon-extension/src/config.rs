//! Extension server configuration.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. a TOML file
//! 3. `BABYLON_*` environment variables
//!
//! Command-line flags are applied on top by the binary.

use std::path::Path;
use std::time::Duration;

use babylon_core::config::{defaults, env_vars};
use babylon_core::OrchestratorAddress;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::registrar::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub host: String,
    pub port: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host: defaults::ORCHESTRATOR_HOST.to_string(),
            port: defaults::ORCHESTRATOR_PORT,
        }
    }
}

impl OrchestratorConfig {
    pub fn address(&self) -> OrchestratorAddress {
        OrchestratorAddress::new(self.host.clone(), self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::REGISTRATION_MAX_RETRIES,
            retry_delay_secs: defaults::REGISTRATION_RETRY_DELAY.as_secs(),
        }
    }
}

impl RegistrationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

/// Settings for one extension server process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on. `0` picks a free port.
    pub port: u16,
    /// Hostname advertised in the callback URL.
    pub hostname: String,
    pub orchestrator: OrchestratorConfig,
    pub registration: RegistrationConfig,
    /// Concurrent capability invocations.
    pub worker_pool_size: usize,
    /// Deepest nested call chain a re-entrant client may start.
    pub max_call_depth: u32,
    /// Timeout for outgoing orchestrator requests, if any.
    pub client_timeout_secs: Option<u64>,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::EXTENSION_PORT,
            hostname: defaults::EXTENSION_HOSTNAME.to_string(),
            orchestrator: OrchestratorConfig::default(),
            registration: RegistrationConfig::default(),
            worker_pool_size: defaults::WORKER_POOL_SIZE,
            max_call_depth: defaults::MAX_CALL_DEPTH,
            client_timeout_secs: None,
            body_limit_bytes: defaults::BODY_LIMIT_BYTES,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let shown = path.display().to_string();
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: shown.clone(),
                    source,
                })?;
                info!(category = "config", path = %shown, "Loading config from file");
                Self::from_toml_str(&content, &shown)?
            }
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `BABYLON_*` overrides read through `lookup`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(env_vars::PORT) {
            self.port = parse_var(env_vars::PORT, v)?;
        }
        if let Some(v) = lookup(env_vars::HOSTNAME) {
            self.hostname = v;
        }
        if let Some(v) = lookup(env_vars::ORCHESTRATOR_HOST) {
            self.orchestrator.host = v;
        }
        if let Some(v) = lookup(env_vars::ORCHESTRATOR_PORT) {
            self.orchestrator.port = parse_var(env_vars::ORCHESTRATOR_PORT, v)?;
        }
        if let Some(v) = lookup(env_vars::WORKER_POOL_SIZE) {
            self.worker_pool_size = parse_var(env_vars::WORKER_POOL_SIZE, v)?;
        }
        if let Some(v) = lookup(env_vars::MAX_CALL_DEPTH) {
            self.max_call_depth = parse_var(env_vars::MAX_CALL_DEPTH, v)?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "worker_pool_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "hostname".to_string(),
                value: self.hostname,
            });
        }
        Ok(self)
    }

    pub fn client_timeout(&self) -> Option<Duration> {
        self.client_timeout_secs.map(Duration::from_secs)
    }
}
