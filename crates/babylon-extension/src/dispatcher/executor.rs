//! Dispatcher for drivers and actors.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::routing::{delete, post};
use axum::{Json, Router};
use babylon_client::BabylonClient;
use babylon_core::{
    payload, ConnectRequest, ExecuteRequest, ExecutionOutcome, ExecutionResponse,
    ExtensionCategory, ExtensionDescriptor,
};
use tracing::{error, info, warn};

use super::{call_depth, panic_message, reject, source_of, DispatchContext};
use crate::capability::Executable;
use crate::models::ApiResult;
use crate::registrar::{Identity, Registrar};

/// Wraps an [`Executable`] with its routes and registrar.
#[derive(Clone)]
pub struct ExecutorDispatcher {
    category: ExtensionCategory,
    capability: Arc<dyn Executable>,
    registrar: Arc<Registrar>,
}

/// Handler state for one executable extension.
pub struct ExecutorState {
    pub dispatcher: ExecutorDispatcher,
    pub context: DispatchContext,
}

impl ExecutorDispatcher {
    pub fn new(category: ExtensionCategory, capability: Arc<dyn Executable>) -> Self {
        let registrar = Registrar::new(Identity {
            category,
            name: capability.name().to_string(),
            extension_type: capability.extension_type().to_string(),
            secret: capability.secret().to_string(),
            live: None,
        });
        Self {
            category,
            capability,
            registrar: Arc::new(registrar),
        }
    }

    pub fn category(&self) -> ExtensionCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        self.capability.name()
    }

    pub fn capability(&self) -> &Arc<dyn Executable> {
        &self.capability
    }

    pub fn registrar(&self) -> &Arc<Registrar> {
        &self.registrar
    }

    /// `/{category}/{name}` with the name lower-cased.
    pub fn base_path(&self) -> String {
        format!("/{}/{}", self.category, self.name().to_lowercase())
    }

    pub fn routes(&self, context: &DispatchContext) -> Router {
        let base = self.base_path();
        info!(
            category = "dispatch",
            kind = %self.category,
            extension = %self.name(),
            path = %base,
            "Setting up extension endpoints"
        );

        let state = Arc::new(ExecutorState {
            dispatcher: self.clone(),
            context: context.clone(),
        });
        Router::new()
            .route(&format!("{}/execute", base), post(execute_handler))
            .route(&format!("{}/session/:id", base), delete(session_end_handler))
            .route(&format!("{}/serverConnect", base), post(connect_handler))
            .with_state(state)
    }
}

impl ExecutorState {
    /// Run one action on the worker pool with a client bound to its session.
    ///
    /// Errors and panics inside the capability become failed outcomes.
    pub async fn run(&self, request: ExecuteRequest, depth: u32) -> ApiResult<ExecutionOutcome> {
        let permit = self.context.acquire().await?;
        let client = BabylonClient::for_session(
            self.context.http.clone(),
            self.dispatcher.registrar.orchestrator().base_url(),
            request.session.clone(),
            depth,
            self.context.max_call_depth,
        );

        let capability = self.dispatcher.capability.clone();
        let ExecuteRequest {
            action,
            session,
            parameters,
        } = request;
        let task_action = action.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            capability
                .execute(&task_action, &parameters, &client)
                .await
        });

        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(
                    category = "dispatch",
                    extension = %self.dispatcher.name(),
                    session = %session,
                    action = %action,
                    error = %e,
                    "Action failed"
                );
                ExecutionOutcome::failure(e.to_string())
            }
            Err(join_error) if join_error.is_panic() => {
                let reason = panic_message(join_error.into_panic());
                error!(
                    category = "dispatch",
                    extension = %self.dispatcher.name(),
                    session = %session,
                    action = %action,
                    reason = %reason,
                    "Action panicked"
                );
                ExecutionOutcome::failure(format!("action '{}' panicked: {}", action, reason))
            }
            Err(_) => ExecutionOutcome::failure(format!("action '{}' was cancelled", action)),
        };
        Ok(outcome)
    }
}

/// `POST /{category}/{name}/execute`
pub async fn execute_handler(
    State(state): State<Arc<ExecutorState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ExecutionResponse>> {
    let source = source_of(remote);
    let name = state.dispatcher.name();
    let request = payload::decode(&body)
        .and_then(|data| ExecuteRequest::from_payload(data.as_ref()))
        .map_err(|e| reject(name, &source, e))?;
    let depth = call_depth(&headers);

    info!(
        category = "dispatch",
        kind = %state.dispatcher.category,
        extension = %name,
        source = %source,
        session = %request.session,
        action = %request.action,
        depth = depth,
        "Received execution request"
    );

    let outcome = state.run(request, depth).await?;
    Ok(Json(ExecutionResponse::from(outcome)))
}

/// `DELETE /{category}/{name}/session/:id`
///
/// Always answers `"ok"`; teardown failures are only logged.
pub async fn session_end_handler(
    State(state): State<Arc<ExecutorState>>,
    Path(id): Path<String>,
) -> Json<&'static str> {
    info!(
        category = "dispatch",
        extension = %state.dispatcher.name(),
        session = %id,
        "Received session end"
    );

    let capability = state.dispatcher.capability.clone();
    let session = id.clone();
    let result = tokio::spawn(async move { capability.on_session_end(&session).await }).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(
            category = "dispatch",
            extension = %state.dispatcher.name(),
            session = %id,
            error = %e,
            "Session end hook failed"
        ),
        Err(join_error) => warn!(
            category = "dispatch",
            extension = %state.dispatcher.name(),
            session = %id,
            error = %join_error,
            "Session end hook aborted"
        ),
    }
    Json("ok")
}

/// `POST /{category}/{name}/serverConnect`
pub async fn connect_handler(
    State(state): State<Arc<ExecutorState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> ApiResult<Json<ExtensionDescriptor>> {
    let source = source_of(remote);
    let name = state.dispatcher.name();
    info!(
        category = "registration",
        extension = %name,
        source = %source,
        "Received orchestrator connect request"
    );

    let request = payload::decode(&body)
        .and_then(|data| ConnectRequest::from_payload(data.as_ref()))
        .map_err(|e| reject(name, &source, e))?;
    Ok(Json(state.dispatcher.registrar.accept_connect(&request)))
}
