//! Common test utilities for extension tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use babylon_extension::{
    BabylonClient, CapabilityError, DispatchContext, ExecutionOutcome, Executable, Parameters,
    Reporter, Session,
};
use parking_lot::Mutex;

pub const SESSION: &str = "11111111-1111-1111-1111-111111111111";

/// Fresh session id, as an orchestrator would allocate one.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Dispatch context with a small pool and no real orchestrator.
pub fn test_context() -> DispatchContext {
    DispatchContext::new(reqwest::Client::new(), 4, 8)
}

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}", addr)
}

/// Driver whose behaviour is chosen per test.
pub struct TestDriver {
    pub name: String,
    pub mode: Mode,
    pub calls: Arc<AtomicUsize>,
    pub ended: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Always `(true, "ok")`.
    Ok,
    /// `action executed with parameters: {..}`.
    Echo,
    /// Returns an error.
    Fail,
    /// Panics.
    Panic,
}

impl TestDriver {
    pub fn new(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
            ended: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Executable for TestDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn extension_type(&self) -> &str {
        "test"
    }

    fn secret(&self) -> &str {
        "test-secret"
    }

    fn connect_on_startup(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        action: &str,
        parameters: &Parameters,
        _client: &BabylonClient,
    ) -> Result<ExecutionOutcome, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Ok => Ok(ExecutionOutcome::success("ok")),
            Mode::Echo => Ok(ExecutionOutcome::success(format!(
                "action executed with parameters: {}",
                parameters
            ))),
            Mode::Fail => Err(CapabilityError::failed(format!("cannot {}", action))),
            Mode::Panic => panic!("driver exploded"),
        }
    }

    async fn on_session_end(&self, session_id: &str) -> Result<(), CapabilityError> {
        self.ended.lock().push(session_id.to_string());
        match self.mode {
            Mode::Fail => Err(CapabilityError::failed("browser already gone")),
            Mode::Panic => panic!("teardown exploded"),
            _ => Ok(()),
        }
    }
}

/// Reporter recording everything it receives.
pub struct RecordingReporter {
    pub live: bool,
    pub status: u16,
    pub panics: bool,
    pub events: Arc<Mutex<Vec<(String, String, String)>>>,
    pub sessions: Arc<Mutex<Vec<Session>>>,
}

impl RecordingReporter {
    pub fn new(live: bool, status: u16) -> Self {
        Self {
            live,
            status,
            panics: false,
            events: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reporter that records the event, then panics.
    pub fn panicking(live: bool) -> Self {
        Self {
            panics: true,
            ..Self::new(live, 200)
        }
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn secret(&self) -> &str {
        "reporter-secret"
    }

    fn is_live(&self) -> bool {
        self.live
    }

    async fn live_log(&self, session_id: &str, category: &str, message: &str) -> u16 {
        self.events.lock().push((
            session_id.to_string(),
            category.to_string(),
            message.to_string(),
        ));
        if self.panics {
            panic!("reporter exploded");
        }
        self.status
    }

    async fn session_end_log(&self, session: &Session) -> u16 {
        self.sessions.lock().push(session.clone());
        if self.panics {
            panic!("reporter exploded");
        }
        self.status
    }
}
