//! Tests for the driver/actor dispatcher.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use babylon_core::{ExtensionCategory, OrchestratorAddress};
use babylon_extension::dispatcher::executor::{
    connect_handler, execute_handler, session_end_handler, ExecutorState,
};
use babylon_extension::{ExecutorDispatcher, RegistrationStatus};
use common::{new_session_id, spawn_router, test_context, Mode, TestDriver, SESSION};
use serde_json::{json, Value};

fn state_for(driver: TestDriver) -> Arc<ExecutorState> {
    Arc::new(ExecutorState {
        dispatcher: ExecutorDispatcher::new(ExtensionCategory::Driver, Arc::new(driver)),
        context: test_context(),
    })
}

async fn execute(state: &Arc<ExecutorState>, body: Value) -> Result<Value, (StatusCode, String)> {
    let bytes = Bytes::from(serde_json::to_vec(&body).unwrap());
    execute_handler(State(state.clone()), None, HeaderMap::new(), bytes)
        .await
        .map(|json| serde_json::to_value(json.0).unwrap())
        .map_err(|e| (e.status, e.error))
}

#[tokio::test]
async fn test_execute_rejects_missing_fields_without_invoking() {
    let driver = TestDriver::new("example", Mode::Ok);
    let calls = driver.call_count();
    let state = state_for(driver);

    let empty = execute_handler(State(state.clone()), None, HeaderMap::new(), Bytes::new()).await;
    let err = empty.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error, "missing payload");

    let cases = [
        (json!(null), "missing payload"),
        (json!({"session": SESSION}), "missing action"),
        (json!({"action": "testAction"}), "missing session id"),
        (json!({"parameters": {"a": 1}}), "missing action"),
    ];
    for (body, reason) in cases {
        let (status, error) = execute(&state, body).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, reason);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_execute_returns_outcome() {
    let state = state_for(TestDriver::new("example", Mode::Ok));

    let response = execute(&state, json!({"action": "testAction", "session": SESSION}))
        .await
        .unwrap();
    assert_eq!(response, json!({"success": true, "message": "ok"}));
}

#[tokio::test]
async fn test_execute_echoes_parameters() {
    let state = state_for(TestDriver::new("example", Mode::Echo));

    let response = execute(
        &state,
        json!({"action": "testAction", "session": SESSION, "parameters": {"foo": "bar"}}),
    )
    .await
    .unwrap();
    assert_eq!(
        response,
        json!({"success": true, "message": "action executed with parameters: {foo=bar}"})
    );

    let response = execute(&state, json!({"action": "testAction", "session": SESSION}))
        .await
        .unwrap();
    assert_eq!(response["message"], "action executed with parameters: {}");
}

#[tokio::test]
async fn test_capability_errors_become_failed_outcomes() {
    let state = state_for(TestDriver::new("example", Mode::Fail));
    let response = execute(&state, json!({"action": "click", "session": SESSION}))
        .await
        .unwrap();
    assert_eq!(response, json!({"success": false, "message": "cannot click"}));

    let state = state_for(TestDriver::new("example", Mode::Panic));
    let response = execute(&state, json!({"action": "click", "session": SESSION}))
        .await
        .unwrap();
    assert_eq!(response["success"], false);
    assert!(response["message"]
        .as_str()
        .unwrap()
        .contains("driver exploded"));
}

#[tokio::test]
async fn test_session_end_always_acknowledges() {
    let driver = TestDriver::new("example", Mode::Fail);
    let ended = driver.ended.clone();
    let state = state_for(driver);

    let response = session_end_handler(State(state.clone()), Path(SESSION.to_string())).await;
    assert_eq!(response.0, "ok");
    assert_eq!(ended.lock().as_slice(), [SESSION.to_string()]);

    let driver = TestDriver::new("example", Mode::Panic);
    let ended = driver.ended.clone();
    let state = state_for(driver);
    let session = new_session_id();

    let response = session_end_handler(State(state.clone()), Path(session.clone())).await;
    assert_eq!(response.0, "ok");
    assert_eq!(ended.lock().as_slice(), [session]);
}

#[tokio::test]
async fn test_connect_handshake() {
    let state = state_for(TestDriver::new("example", Mode::Ok));
    let registrar = state.dispatcher.registrar().clone();
    registrar.set_advertised("driver-box", 8888);
    let before = registrar.orchestrator();

    let cases = [
        (Bytes::new(), "missing payload"),
        (Bytes::from_static(b"{}"), "missing callback"),
        (Bytes::from_static(br#"{"callback": "not a url"}"#), "malformed callback URL"),
    ];
    for (body, reason) in cases {
        let err = connect_handler(State(state.clone()), None, body).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, reason);
        assert_eq!(registrar.orchestrator(), before);
        assert_eq!(registrar.status(), RegistrationStatus::Unregistered);
    }

    let body = Bytes::from_static(br#"{"callback": "http://orchestrator:9000/"}"#);
    let descriptor = connect_handler(State(state.clone()), None, body).await.unwrap().0;
    assert_eq!(
        serde_json::to_value(&descriptor).unwrap(),
        json!({
            "name": "example",
            "type": "test",
            "secret": "test-secret",
            "callback": "http://driver-box:8888/"
        })
    );
    assert_eq!(registrar.orchestrator(), OrchestratorAddress::new("orchestrator", 9000));
    assert_eq!(registrar.status(), RegistrationStatus::Registered);
}

#[tokio::test]
async fn test_routes_over_http() {
    let dispatcher = ExecutorDispatcher::new(
        ExtensionCategory::Actor,
        Arc::new(TestDriver::new("Shopper", Mode::Echo)),
    );
    let base_url = spawn_router(dispatcher.routes(&test_context())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/actor/shopper/execute", base_url))
        .json(&json!({"action": "buy", "session": SESSION, "parameters": {"item": "tea"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "action executed with parameters: {item=tea}");

    let response = http
        .post(format!("{}/actor/shopper/execute", base_url))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "malformed payload"}));

    let response = http
        .delete(format!("{}/actor/shopper/session/{}", base_url, SESSION))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!("ok"));

    let response = http
        .post(format!("{}/driver/shopper/execute", base_url))
        .json(&json!({"action": "buy", "session": SESSION}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    use async_trait::async_trait;
    use babylon_extension::{
        BabylonClient, CapabilityError, DispatchContext, ExecutionOutcome, Executable, Parameters,
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Slow {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Executable for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn extension_type(&self) -> &str {
            "slow"
        }
        fn secret(&self) -> &str {
            ""
        }
        fn connect_on_startup(&self) -> bool {
            false
        }
        async fn execute(
            &self,
            _action: &str,
            _parameters: &Parameters,
            _client: &BabylonClient,
        ) -> Result<ExecutionOutcome, CapabilityError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ExecutionOutcome::success("done"))
        }
    }

    let peak = Arc::new(AtomicUsize::new(0));
    let state = Arc::new(ExecutorState {
        dispatcher: ExecutorDispatcher::new(
            ExtensionCategory::Driver,
            Arc::new(Slow {
                running: Arc::new(AtomicUsize::new(0)),
                peak: peak.clone(),
            }),
        ),
        context: DispatchContext::new(reqwest::Client::new(), 2, 8),
    });

    let mut handles = Vec::new();
    for _ in 0..6 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            execute(&state, json!({"action": "wait", "session": SESSION})).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap()["success"], true);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}
