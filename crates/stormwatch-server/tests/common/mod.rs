#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stormwatch_alert::limiter::CooldownTracker;
use stormwatch_common::types::NotificationMethod;
use stormwatch_notify::dispatcher::Dispatcher;
use stormwatch_notify::{error, Notification, NotificationChannel};
use stormwatch_server::app;
use stormwatch_server::config::ServerConfig;
use stormwatch_server::state::AppState;
use stormwatch_storage::AlertStore;
use tower::util::ServiceExt;

/// Record of one delivery captured by the mock channel.
#[derive(Debug, Clone)]
pub struct CapturedSend {
    pub recipient: String,
    pub title: String,
}

/// In-memory channel standing in for SMTP/SMS/webhook during tests.
pub struct MockChannel {
    method: NotificationMethod,
    fail: bool,
    sent: Arc<Mutex<Vec<CapturedSend>>>,
}

#[async_trait]
impl NotificationChannel for MockChannel {
    async fn send(&self, note: &Notification, recipient: &str) -> error::Result<()> {
        if self.fail {
            return Err(error::NotifyError::Smtp("mock failure".to_string()));
        }
        self.sent.lock().unwrap().push(CapturedSend {
            recipient: recipient.to_string(),
            title: note.title.clone(),
        });
        Ok(())
    }

    fn method(&self) -> NotificationMethod {
        self.method
    }
}

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    pub sent: Arc<Mutex<Vec<CapturedSend>>>,
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(false).await
}

/// `failing_email`: make the mock email channel reject every send.
pub async fn build_test_context_with(failing_email: bool) -> Result<TestContext> {
    stormwatch_common::id::configure(1, 1);

    let store = Arc::new(AlertStore::new("sqlite::memory:").await?);
    let sent = Arc::new(Mutex::new(Vec::new()));

    let channels: Vec<Box<dyn NotificationChannel>> = vec![
        Box::new(MockChannel {
            method: NotificationMethod::Email,
            fail: failing_email,
            sent: sent.clone(),
        }),
        Box::new(MockChannel {
            method: NotificationMethod::Webhook,
            fail: false,
            sent: sent.clone(),
        }),
    ];
    let dispatcher = Arc::new(Dispatcher::new(channels, Duration::from_secs(5)));

    let state = AppState {
        store,
        limiter: Arc::new(CooldownTracker::default()),
        dispatcher,
        start_time: Utc::now(),
        config: Arc::new(ServerConfig::default()),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext { state, app, sent })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}
