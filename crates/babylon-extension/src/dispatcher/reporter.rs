//! Dispatcher for reporters.
//!
//! Live reporters only get `/live`, batch reporters only get `/report`. The
//! missing route is simply never mounted, so a misrouted call is a 404.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use babylon_core::{
    payload, ConnectRequest, ExtensionCategory, ExtensionDescriptor, LiveLogEvent, PayloadError,
    Session,
};
use tracing::{error, info};

use super::{panic_message, reject, source_of, status_from, DispatchContext};
use crate::capability::Reporter;
use crate::models::ApiResult;
use crate::registrar::{Identity, Registrar};

/// Type every reporter registers with.
pub const REPORTER_TYPE: &str = "reporter";

/// Wraps a [`Reporter`] with its routes and registrar.
#[derive(Clone)]
pub struct ReporterDispatcher {
    capability: Arc<dyn Reporter>,
    registrar: Arc<Registrar>,
    live: bool,
}

pub struct ReporterState {
    pub dispatcher: ReporterDispatcher,
    pub context: DispatchContext,
}

impl ReporterDispatcher {
    pub fn new(capability: Arc<dyn Reporter>) -> Self {
        let live = capability.is_live();
        let registrar = Registrar::new(Identity {
            category: ExtensionCategory::Reporter,
            name: capability.name().to_string(),
            extension_type: REPORTER_TYPE.to_string(),
            secret: capability.secret().to_string(),
            live: Some(live),
        });
        Self {
            capability,
            registrar: Arc::new(registrar),
            live,
        }
    }

    pub fn name(&self) -> &str {
        self.capability.name()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn capability(&self) -> &Arc<dyn Reporter> {
        &self.capability
    }

    pub fn registrar(&self) -> &Arc<Registrar> {
        &self.registrar
    }

    pub fn base_path(&self) -> String {
        format!("/{}/{}", ExtensionCategory::Reporter, self.name().to_lowercase())
    }

    pub fn routes(&self, context: &DispatchContext) -> Router {
        let base = self.base_path();
        info!(
            category = "reporter",
            extension = %self.name(),
            live = self.live,
            path = %base,
            "Setting up reporter endpoints"
        );

        let state = Arc::new(ReporterState {
            dispatcher: self.clone(),
            context: context.clone(),
        });
        let router = Router::new().route(&format!("{}/serverConnect", base), post(connect_handler));
        let router = if self.live {
            router.route(&format!("{}/live", base), post(live_handler))
        } else {
            router.route(&format!("{}/report", base), post(report_handler))
        };
        router.with_state(state)
    }
}

impl ReporterState {
    async fn invoke<F, Fut>(&self, what: &'static str, call: F) -> ApiResult<StatusCode>
    where
        F: FnOnce(Arc<dyn Reporter>) -> Fut,
        Fut: std::future::Future<Output = u16> + Send + 'static,
    {
        let permit = self.context.acquire().await?;
        let future = call(self.dispatcher.capability.clone());
        let handle = tokio::spawn(async move {
            let _permit = permit;
            future.await
        });

        match handle.await {
            Ok(code) => Ok(status_from(code)),
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "cancelled".to_string()
                };
                error!(
                    category = "reporter",
                    extension = %self.dispatcher.name(),
                    call = what,
                    reason = %reason,
                    "Reporter failed"
                );
                Ok(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// `POST /reporter/{name}/live`
pub async fn live_handler(
    State(state): State<Arc<ReporterState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    let source = source_of(remote);
    let name = state.dispatcher.name();
    let event = payload::decode(&body)
        .and_then(|data| LiveLogEvent::from_payload(data.as_ref()))
        .map_err(|e| reject(name, &source, e))?;

    info!(
        category = "reporter",
        extension = %name,
        source = %source,
        session = %event.session,
        kind = %event.category,
        "Received live log"
    );

    let status = state
        .invoke("live_log", move |reporter| async move {
            reporter
                .live_log(&event.session, &event.category, &event.message)
                .await
        })
        .await?;
    Ok((status, Json("ok")))
}

/// `POST /reporter/{name}/report`
pub async fn report_handler(
    State(state): State<Arc<ReporterState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    let source = source_of(remote);
    let name = state.dispatcher.name();
    let session = payload::decode(&body)
        .and_then(|data| data.ok_or(PayloadError::MissingPayload))
        .and_then(|data| Session::from_report_payload(&data).map_err(PayloadError::InvalidSession))
        .map_err(|e| reject(name, &source, e))?;

    info!(
        category = "reporter",
        extension = %name,
        source = %source,
        session = %session.uuid,
        entries = session.log().len(),
        "Received session report"
    );

    let status = state
        .invoke("session_end_log", move |reporter| async move {
            reporter.session_end_log(&session).await
        })
        .await?;
    Ok((status, Json("ok")))
}

/// `POST /reporter/{name}/serverConnect`
pub async fn connect_handler(
    State(state): State<Arc<ReporterState>>,
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
