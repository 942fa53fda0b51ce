//! Registration with the orchestrator.
//!
//! Two flows lead to the same place, a remembered orchestrator address:
//!
//! - **Self-registration** (push): on startup the extension posts
//!   `{<category>: name, type}` to `/{category}/` and retries with a fixed
//!   delay until it is accepted or the retry budget is spent, which is fatal.
//! - **Connect handshake** (pull): the orchestrator posts `{callback}` and
//!   the extension answers with its descriptor. Every handshake stands on
//!   its own and simply overwrites the remembered address.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use babylon_core::config::defaults;
use babylon_core::{
    ConnectRequest, ExtensionCategory, ExtensionDescriptor, OrchestratorAddress, SelfRegistration,
};
use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fixed-delay retry budget for self-registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            defaults::REGISTRATION_MAX_RETRIES,
            defaults::REGISTRATION_RETRY_DELAY,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Unregistered,
    Registering,
    Registered,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::Registering => write!(f, "registering"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// State carried from one self-registration attempt to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationState {
    /// Failed attempts so far. Only grows, capped by the policy.
    pub retry_count: u32,
    pub orchestrator: OrchestratorAddress,
}

impl RegistrationState {
    pub fn new(orchestrator: OrchestratorAddress) -> Self {
        Self {
            retry_count: 0,
            orchestrator,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Orchestrator rejected registration with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Failed to register {category} '{name}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        category: ExtensionCategory,
        name: String,
        attempts: u32,
        last_error: TransportError,
    },

    #[error("Registration of {category} '{name}' was cancelled")]
    Cancelled {
        category: ExtensionCategory,
        name: String,
    },
}

/// Sends a self-registration request.
#[async_trait]
pub trait RegistrationTransport: Send + Sync {
    async fn register(
        &self,
        orchestrator: &OrchestratorAddress,
        registration: &SelfRegistration,
    ) -> Result<(), TransportError>;
}

/// Self-registration over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RegistrationTransport for HttpTransport {
    async fn register(
        &self,
        orchestrator: &OrchestratorAddress,
        registration: &SelfRegistration,
    ) -> Result<(), TransportError> {
        let url = format!("{}{}", orchestrator.base_url(), registration.path());
        let response = self.http.post(url).json(registration).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(response.status().as_u16()))
        }
    }
}

/// Who this extension says it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub category: ExtensionCategory,
    pub name: String,
    pub extension_type: String,
    pub secret: String,
    /// Only set for reporters.
    pub live: Option<bool>,
}

#[derive(Debug, Clone)]
struct Advertised {
    hostname: String,
    port: u16,
}

/// Registration state of one extension instance.
pub struct Registrar {
    identity: Identity,
    orchestrator: RwLock<OrchestratorAddress>,
    advertised: RwLock<Advertised>,
    status: RwLock<RegistrationStatus>,
    policy: RwLock<RetryPolicy>,
}

impl Registrar {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            orchestrator: RwLock::new(OrchestratorAddress::default()),
            advertised: RwLock::new(Advertised {
                hostname: defaults::EXTENSION_HOSTNAME.to_string(),
                port: defaults::EXTENSION_PORT,
            }),
            status: RwLock::new(RegistrationStatus::Unregistered),
            policy: RwLock::new(RetryPolicy::default()),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn orchestrator(&self) -> OrchestratorAddress {
        self.orchestrator.read().clone()
    }

    pub fn status(&self) -> RegistrationStatus {
        *self.status.read()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        *self.policy.read()
    }

    pub fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.policy.write() = policy;
    }

    /// Remember where the orchestrator lives.
    pub fn set_orchestrator(&self, orchestrator: OrchestratorAddress) {
        info!(
            category = "registration",
            extension = %self.identity.name,
            host = %orchestrator.host,
            port = orchestrator.port,
            "Updating orchestrator address"
        );
        *self.orchestrator.write() = orchestrator;
    }

    /// Address this extension advertises in its callback URL.
    pub fn set_advertised(&self, hostname: impl Into<String>, port: u16) {
        *self.advertised.write() = Advertised {
            hostname: hostname.into(),
            port,
        };
    }

    pub fn callback(&self) -> String {
        let advertised = self.advertised.read();
        ExtensionDescriptor::callback_for(&advertised.hostname, advertised.port)
    }

    fn set_status(&self, status: RegistrationStatus) {
        *self.status.write() = status;
    }

    pub fn self_registration(&self) -> SelfRegistration {
        let registration = SelfRegistration::new(
            self.identity.category,
            self.identity.name.clone(),
            self.identity.extension_type.clone(),
        );
        match self.identity.live {
            Some(live) => registration.with_live(live),
            None => registration,
        }
    }

    pub fn descriptor(&self) -> ExtensionDescriptor {
        let descriptor = ExtensionDescriptor::new(
            self.identity.name.clone(),
            self.identity.extension_type.clone(),
            self.identity.secret.clone(),
            self.callback(),
        );
        match self.identity.live {
            Some(live) => descriptor.with_live(live),
            None => descriptor,
        }
    }

    /// Answer a connect handshake: adopt the caller's address and describe
    /// ourselves. The address is only touched once the request is valid.
    pub fn accept_connect(&self, request: &ConnectRequest) -> ExtensionDescriptor {
        self.set_orchestrator(request.orchestrator.clone());
        self.set_status(RegistrationStatus::Registered);
        info!(
            category = "registration",
            extension = %self.identity.name,
            kind = %self.identity.category,
            "Accepted orchestrator connect handshake"
        );
        self.descriptor()
    }

    /// Register with the orchestrator, retrying with a fixed delay.
    ///
    /// Returns once an attempt is accepted. Fails when the retry budget is
    /// spent or `cancel` fires while waiting. The address is re-read before
    /// every attempt, so a handshake that lands meanwhile is picked up.
    pub async fn self_register(
        &self,
        transport: &dyn RegistrationTransport,
        cancel: &CancellationToken,
    ) -> Result<RegistrationState, RegistrationError> {
        let policy = self.retry_policy();
        let registration = self.self_registration();
        let mut state = RegistrationState::new(self.orchestrator());
        self.set_status(RegistrationStatus::Registering);

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => None,
                result = transport.register(&state.orchestrator, &registration) => Some(result),
            };

            let error = match attempt {
                None => return Err(self.cancelled()),
                Some(Ok(())) => {
                    self.set_status(RegistrationStatus::Registered);
                    info!(
                        category = "registration",
                        extension = %self.identity.name,
                        kind = %self.identity.category,
                        remote = %state.orchestrator,
                        retries = state.retry_count,
                        "Registered with orchestrator"
                    );
                    return Ok(state);
                }
                Some(Err(e)) => e,
            };

            if state.retry_count >= policy.max_retries {
                self.set_status(RegistrationStatus::Unregistered);
                error!(
                    category = "registration",
                    extension = %self.identity.name,
                    kind = %self.identity.category,
                    remote = %state.orchestrator,
                    error = %error,
                    "Failed to register, retries used up"
                );
                return Err(RegistrationError::RetriesExhausted {
                    category: self.identity.category,
                    name: self.identity.name.clone(),
                    attempts: state.retry_count + 1,
                    last_error: error,
                });
            }

            state.retry_count += 1;
            warn!(
                category = "registration",
                extension = %self.identity.name,
                kind = %self.identity.category,
                remote = %state.orchestrator,
                retry = state.retry_count,
                max_retries = policy.max_retries,
                delay_secs = policy.delay.as_secs_f64(),
                error = %error,
                "Failed to register, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled()),
                _ = tokio::time::sleep(policy.delay) => {}
            }
            state.orchestrator = self.orchestrator();
        }
    }

    fn cancelled(&self) -> RegistrationError {
        self.set_status(RegistrationStatus::Unregistered);
        info!(
            category = "registration",
            extension = %self.identity.name,
            "Registration cancelled"
        );
        RegistrationError::Cancelled {
            category: self.identity.category,
            name: self.identity.name.clone(),
        }
    }
}

impl fmt::Debug for Registrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("identity", &self.identity.name)
            .field("orchestrator", &*self.orchestrator.read())
            .field("status", &self.status())
            .finish()
    }
}
