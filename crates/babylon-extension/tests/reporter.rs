//! Tests for the reporter dispatcher.

mod common;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use babylon_extension::dispatcher::reporter::{live_handler, report_handler, ReporterState};
use babylon_extension::ReporterDispatcher;
use common::{new_session_id, spawn_router, test_context, RecordingReporter, SESSION};
use serde_json::{json, Value};

fn state_for(reporter: RecordingReporter) -> Arc<ReporterState> {
    Arc::new(ReporterState {
        dispatcher: ReporterDispatcher::new(Arc::new(reporter)),
        context: test_context(),
    })
}

fn bytes(body: Value) -> Bytes {
    Bytes::from(serde_json::to_vec(&body).unwrap())
}

#[tokio::test]
async fn test_live_log_validation() {
    let reporter = RecordingReporter::new(true, 200);
    let events = reporter.events.clone();
    let state = state_for(reporter);

    let cases = [
        (json!(null), "missing payload"),
        (json!({"message": {"type": "t", "message": "m"}}), "missing session id"),
        (json!({"session": SESSION}), "missing message data"),
        (json!({"session": SESSION, "message": {"message": "m"}}), "missing message type"),
        (json!({"session": SESSION, "message": {"type": "t"}}), "missing message content"),
    ];
    for (body, reason) in cases {
        let err = live_handler(State(state.clone()), None, bytes(body))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, reason);
    }
    assert!(events.lock().is_empty());

    let (status, body) = live_handler(
        State(state.clone()),
        None,
        bytes(json!({"session": SESSION, "message": {"type": "driver", "message": "opened page"}})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0, "ok");
    assert_eq!(
        events.lock().as_slice(),
        [(SESSION.to_string(), "driver".to_string(), "opened page".to_string())]
    );
}

#[tokio::test]
async fn test_status_code_is_passed_through() {
    let state = state_for(RecordingReporter::new(false, 202));
    let (status, _) = report_handler(
        State(state.clone()),
        None,
        bytes(json!({"uuid": SESSION, "context": {"log": []}})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    let state = state_for(RecordingReporter::new(false, 7));
    let (status, _) = report_handler(
        State(state.clone()),
        None,
        bytes(json!({"uuid": SESSION, "context": {}})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_end_report_delivers_ordered_snapshot() {
    let reporter = RecordingReporter::new(false, 200);
    let sessions = reporter.sessions.clone();
    let state = state_for(reporter);

    let body = json!({
        "uuid": SESSION,
        "context": {"log": [
            {"timestamp": "2024-05-01T10:00:00+02:00", "type": "session", "message": "created"},
            {"timestamp": "2024-05-01T10:00:02+02:00", "type": "driver", "message": "clicked"},
            {"timestamp": "2024-05-01T10:00:05+02:00", "type": "session", "message": "ended"}
        ]}
    });
    report_handler(State(state.clone()), None, bytes(body))
        .await
        .unwrap();

    let sessions = sessions.lock();
    assert_eq!(sessions.len(), 1);
    let messages: Vec<&str> = sessions[0].log().iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["created", "clicked", "ended"]);
}

#[tokio::test]
async fn test_end_report_rejects_invalid_sessions() {
    let reporter = RecordingReporter::new(false, 200);
    let sessions = reporter.sessions.clone();
    let state = state_for(reporter);

    let err = report_handler(State(state.clone()), None, Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(err.error, "missing payload");

    let invalid = [
        json!({"context": {}}),
        json!({"uuid": SESSION}),
        json!({"uuid": SESSION, "context": {"log": [{"type": "t", "message": "m"}]}}),
    ];
    for body in invalid {
        let err = report_handler(State(state.clone()), None, bytes(body))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "missing session id");
    }
    assert!(sessions.lock().is_empty());
}

#[tokio::test]
async fn test_live_reporter_has_no_report_endpoint() {
    let reporter = RecordingReporter::new(true, 200);
    let sessions = reporter.sessions.clone();
    let dispatcher = ReporterDispatcher::new(Arc::new(reporter));
    let base_url = spawn_router(dispatcher.routes(&test_context())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/reporter/recorder/report", base_url))
        .json(&json!({"uuid": SESSION, "context": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(sessions.lock().is_empty());

    let response = http
        .post(format!("{}/reporter/recorder/live", base_url))
        .json(&json!({"session": SESSION, "message": {"type": "t", "message": "m"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_batch_reporter_has_no_live_endpoint() {
    let reporter = RecordingReporter::new(false, 200);
    let events = reporter.events.clone();
    let dispatcher = ReporterDispatcher::new(Arc::new(reporter));
    let base_url = spawn_router(dispatcher.routes(&test_context())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/reporter/recorder/live", base_url))
        .json(&json!({"session": SESSION, "message": {"type": "t", "message": "m"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(events.lock().is_empty());

    let response = http
        .post(format!("{}/reporter/recorder/serverConnect", base_url))
        .json(&json!({"callback": "http://127.0.0.1:8080/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let descriptor: Value = response.json().await.unwrap();
    assert_eq!(descriptor["type"], "reporter");
    assert_eq!(descriptor["live"], false);
    assert_eq!(descriptor["name"], "Recorder");
}

#[tokio::test]
async fn test_panicking_reporter_answers_500() {
    let reporter = RecordingReporter::panicking(true);
    let events = reporter.events.clone();
    let state = state_for(reporter);
    let session = new_session_id();

    let (status, _) = live_handler(
        State(state.clone()),
        None,
        bytes(json!({"session": session, "message": {"type": "driver", "message": "boom"}})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(events.lock().len(), 1);

    let reporter = RecordingReporter::panicking(false);
    let sessions = reporter.sessions.clone();
    let state = state_for(reporter);
    let (status, _) = report_handler(
        State(state.clone()),
        None,
        bytes(json!({"uuid": session, "context": {"log": []}})),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sessions.lock()[0].uuid, session);

    // The worker permit is released after the panic.
    assert_eq!(state.context.workers.available_permits(), 4);
}
