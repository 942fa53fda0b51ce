//! Session-aware orchestrator client.

use std::sync::Arc;

use babylon_core::config::{defaults, CALL_DEPTH_HEADER};
use babylon_core::{ExecutionOutcome, ExecutionResponse, ExtensionCategory, Parameters, Session};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::action::ActionRequest;
use crate::error::{ClientError, ClientResult};

/// How the client relates to its session.
enum SessionBinding {
    /// Created on demand with `GET /session`, ended by this client.
    Owned(Mutex<Option<Session>>),
    /// Borrowed from an inbound request. Never created or ended here.
    Bound(String),
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    binding: SessionBinding,
}

/// Orchestrator client. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct BabylonClient {
    inner: Arc<ClientInner>,
    depth: u32,
    max_depth: u32,
}

/// Body of `POST /{category}/execute` on the orchestrator.
#[derive(Debug, Serialize)]
struct ActionCall<'a> {
    session: &'a str,
    #[serde(rename = "type")]
    extension_type: &'a str,
    action: &'a str,
    parameters: &'a Parameters,
}

fn normalize_base_url(base_url: impl Into<String>) -> String {
    let mut base_url = base_url.into();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

impl BabylonClient {
    /// Create a top-level client for the orchestrator at `base_url`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http, base_url))
    }

    /// Create a top-level client reusing an existing HTTP client.
    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: normalize_base_url(base_url),
                binding: SessionBinding::Owned(Mutex::new(None)),
            }),
            depth: 0,
            max_depth: defaults::MAX_CALL_DEPTH,
        }
    }

    /// Create a client bound to an existing session. Performs no I/O.
    ///
    /// `depth` is the nesting depth of the request that owns the session;
    /// calls issued through this client go out at `depth + 1`.
    pub fn for_session(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session_id: impl Into<String>,
        depth: u32,
        max_depth: u32,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: normalize_base_url(base_url),
                binding: SessionBinding::Bound(session_id.into()),
            }),
            depth,
            max_depth,
        }
    }

    /// Bind a new client to `session_id`, sharing this client's connection
    /// pool, orchestrator and depth limit.
    pub fn bind_session(&self, session_id: impl Into<String>, depth: u32) -> Self {
        Self::for_session(
            self.inner.http.clone(),
            self.inner.base_url.clone(),
            session_id,
            depth,
            self.max_depth,
        )
    }

    /// Limit how deep nested calls may go.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Whether this client borrows its session from an inbound request.
    pub fn is_bound(&self) -> bool {
        matches!(self.inner.binding, SessionBinding::Bound(_))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// The current session, creating one if this client owns its session.
    ///
    /// A bound client returns a snapshot holding only the session id.
    pub async fn session(&self) -> ClientResult<Session> {
        match &self.inner.binding {
            SessionBinding::Bound(id) => Ok(Session::new(id.clone())),
            SessionBinding::Owned(current) => {
                let mut current = current.lock().await;
                if let Some(session) = current.as_ref() {
                    return Ok(session.clone());
                }
                let session = self.create_session().await?;
                *current = Some(session.clone());
                Ok(session)
            }
        }
    }

    /// Session id used for execute calls.
    pub async fn session_id(&self) -> ClientResult<String> {
        match &self.inner.binding {
            SessionBinding::Bound(id) => Ok(id.clone()),
            SessionBinding::Owned(_) => Ok(self.session().await?.uuid),
        }
    }

    async fn create_session(&self) -> ClientResult<Session> {
        let response = self.inner.http.get(self.url("session")).send().await?;
        let session: Session = Self::check(response).await?.json().await?;
        if session.uuid.is_empty() {
            return Err(ClientError::InvalidResponse(
                "session without uuid".to_string(),
            ));
        }
        tracing::info!(category = "client", session = %session.uuid, "Created session");
        Ok(session)
    }

    /// Re-read the session from the orchestrator.
    pub async fn refresh_session_info(&self) -> ClientResult<Session> {
        let id = self.session_id().await?;
        let response = self
            .inner
            .http
            .get(self.url(&format!("session/{}", id)))
            .send()
            .await?;
        let session: Session = Self::check(response).await?.json().await?;

        if let SessionBinding::Owned(current) = &self.inner.binding {
            *current.lock().await = Some(session.clone());
        }
        Ok(session)
    }

    /// End the session this client owns.
    pub async fn end_session(&self) -> ClientResult<()> {
        let current = match &self.inner.binding {
            SessionBinding::Bound(id) => return Err(ClientError::SessionNotOwned(id.clone())),
            SessionBinding::Owned(current) => current,
        };

        let mut current = current.lock().await;
        let id = match current.as_ref() {
            Some(session) => session.uuid.clone(),
            None => return Err(ClientError::NoActiveSession),
        };

        let response = self
            .inner
            .http
            .delete(self.url(&format!("session/{}", id)))
            .send()
            .await?;
        Self::check(response).await?;

        *current = None;
        tracing::info!(category = "client", session = %id, "Ended session");
        Ok(())
    }

    /// Start building a driver action.
    pub fn driver(&self, driver_type: impl Into<String>) -> ActionRequest {
        ActionRequest::new(self.clone(), ExtensionCategory::Driver, driver_type)
    }

    /// Start building an actor action.
    pub fn actor(&self, actor_type: impl Into<String>) -> ActionRequest {
        ActionRequest::new(self.clone(), ExtensionCategory::Actor, actor_type)
    }

    pub(crate) async fn execute(
        &self,
        category: ExtensionCategory,
        extension_type: &str,
        action: &str,
        parameters: &Parameters,
    ) -> ClientResult<ExecutionOutcome> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            tracing::warn!(
                category = "client",
                depth = depth,
                max = self.max_depth,
                action = %action,
                "Refusing nested call"
            );
            return Err(ClientError::CallDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }

        let session = self.session_id().await?;
        let body = ActionCall {
            session: &session,
            extension_type,
            action,
            parameters,
        };

        tracing::debug!(
            category = "client",
            target_category = %category,
            extension_type = %extension_type,
            session = %session,
            action = %action,
            depth = depth,
            "Executing action"
        );

        let response = self
            .inner
            .http
            .post(self.url(&format!("{}/execute", category)))
            .header(CALL_DEPTH_HEADER, depth.to_string())
            .json(&body)
            .send()
            .await?;
        let result: ExecutionResponse = Self::check(response).await?.json().await?;
        Ok(result.into())
    }

    async fn check(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

impl std::fmt::Debug for BabylonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = match &self.inner.binding {
            SessionBinding::Bound(id) => Some(id.as_str()),
            SessionBinding::Owned(_) => None,
        };
        f.debug_struct("BabylonClient")
            .field("base_url", &self.inner.base_url)
            .field("bound_session", &session)
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
