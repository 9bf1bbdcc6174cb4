mod common;

use axum::http::StatusCode;
use common::{
    assert_err_envelope, assert_ok_envelope, build_test_context, build_test_context_with,
    request_json, request_no_body,
};
use serde_json::json;

fn weather_rule_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "alert_type": "weather",
        "conditions": [
            {"field": "severity", "operator": "equals", "value": "Severe"}
        ],
        "states": ["TX"],
        "notification_methods": ["email"],
        "cooldown_minutes": 60,
        "max_alerts_per_day": 10
    })
}

fn severe_event(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "weather",
        "severity": "high",
        "title": "Tornado Warning",
        "state": "TX",
        "location": "Travis County, TX",
        "fields": {"severity": "Severe"},
        "occurred_at": "2024-05-01T18:30:00Z"
    })
}

/// A quiet-hours window in UTC that is guaranteed to contain "now",
/// whenever the test runs. `NaiveTime` arithmetic wraps past midnight.
fn quiet_window_around_now() -> (String, String) {
    let now = chrono::Utc::now().time();
    let start = now - chrono::Duration::hours(1);
    let end = now + chrono::Duration::hours(1);
    (
        start.format("%H:%M").to_string(),
        end.format("%H:%M").to_string(),
    )
}

async fn enable_email(app: &axum::Router) {
    let (status, body, _) = request_json(
        app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({
            "email": "ops@example.com",
            "email_enabled": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
}

#[tokio::test]
async fn health_returns_ok_envelope() {
    let ctx = build_test_context().await.expect("test context");
    let (status, body, trace) = request_no_body(&ctx.app, "GET", "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert_eq!(body["data"]["storage_status"], "ok");
    assert!(trace.is_some());
}

#[tokio::test]
async fn rule_crud_roundtrip() {
    let ctx = build_test_context().await.expect("test context");

    // Create
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    let rule_id = body["data"]["id"].as_str().expect("rule id").to_string();
    assert_eq!(body["data"]["user_id"], "default");
    assert_eq!(body["data"]["is_active"], true);

    // Get
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/api/alerts/rules/{rule_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Severe weather");

    // List with filter
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/api/alerts/rules?alert_type__eq=weather&is_active__eq=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    // Update
    let mut update = weather_rule_body("Severe weather v2");
    update["cooldown_minutes"] = json!(120);
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/api/alerts/rules/{rule_id}"),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Severe weather v2");
    assert_eq!(body["data"]["cooldown_minutes"], 120);

    // Delete, then 404
    let (status, _, _) =
        request_no_body(&ctx.app, "DELETE", &format!("/api/alerts/rules/{rule_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/api/alerts/rules/{rule_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn create_rule_validation_errors() {
    let ctx = build_test_context().await.expect("test context");

    // webhook method requires a webhook_url
    let mut body = weather_rule_body("Webhook rule");
    body["notification_methods"] = json!(["webhook"]);
    let (status, resp, _) = request_json(&ctx.app, "POST", "/api/alerts/rules", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&resp, 1002);

    // cooldown outside 1..=1440
    let mut body = weather_rule_body("Bad cooldown");
    body["cooldown_minutes"] = json!(0);
    let (status, _, _) = request_json(&ctx.app, "POST", "/api/alerts/rules", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown condition field for the alert type
    let mut body = weather_rule_body("Bad field");
    body["conditions"] = json!([
        {"field": "magnitude", "operator": "greater_than", "value": 5.0}
    ]);
    let (status, _, _) = request_json(&ctx.app, "POST", "/api/alerts/rules", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_rule_name_conflicts() {
    let ctx = build_test_context().await.expect("test context");

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1005);

    // Same name under a different user is fine
    let mut other_user = weather_rule_body("Severe weather");
    other_user["user_id"] = json!("alice");
    let (status, _, _) =
        request_json(&ctx.app, "POST", "/api/alerts/rules", Some(other_user)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn settings_roundtrip_and_validation() {
    let ctx = build_test_context().await.expect("test context");

    // Defaults before anything is saved
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email_enabled"], false);
    assert_eq!(body["data"]["quiet_hours_start"], "22:00");

    enable_email(&ctx.app).await;
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ops@example.com");
    assert_eq!(body["data"]["email_enabled"], true);
    assert_eq!(body["data"]["warnings"].as_array().unwrap().len(), 0);

    // Invalid timezone rejected
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({"timezone": "Mars/Olympus"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1002);

    // Invalid quiet-hours time rejected
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({"quiet_hours_start": "25:99"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_report_completeness_warnings() {
    let ctx = build_test_context().await.expect("test context");

    // Enabling a channel without its contact field saves fine, but the
    // response carries a warning the caller can surface.
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({"email_enabled": true, "sms_enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let warnings = body["data"]["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].as_str().unwrap().contains("email"));

    // A later GET repeats the warnings until the gap is filled
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/settings").await;
    assert_eq!(body["data"]["warnings"].as_array().unwrap().len(), 2);

    let (_, body, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({
            "email": "ops@example.com",
            "phone_number": "+15551234567",
            "email_enabled": true,
            "sms_enabled": true
        })),
    )
    .await;
    assert_eq!(body["data"]["warnings"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn ingest_fires_matching_rule_end_to_end() {
    let ctx = build_test_context().await.expect("test context");
    enable_email(&ctx.app).await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-1")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events"], 1);
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["fired"], 1);
    assert_eq!(body["data"]["suppressed"], 0);
    assert_eq!(body["data"]["deliveries"], 1);

    // The mock channel saw the delivery
    let sent = ctx.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "ops@example.com");
    assert!(sent[0].title.contains("Tornado Warning"));
    drop(sent);

    // And history recorded it as sent
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/history").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "sent");
    assert_eq!(items[0]["notification_method"], "email");
    assert!(items[0]["sent_at"].is_string());
    assert_eq!(items[0]["source_data"]["type"], "weather");

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/history/summary").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["by_status"]["sent"], 1);
}

#[tokio::test]
async fn quiet_hours_suppress_ingest_without_consuming_cooldown() {
    let ctx = build_test_context().await.expect("test context");
    let (start, end) = quiet_window_around_now();

    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({
            "email": "ops@example.com",
            "email_enabled": true,
            "quiet_hours_enabled": true,
            "quiet_hours_start": start,
            "quiet_hours_end": end,
            "timezone": "UTC"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Non-critical firing inside the window: suppressed, no delivery rows
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-1")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 1);
    assert_eq!(body["data"]["suppressed"], 1);
    assert_eq!(body["data"]["fired"], 0);
    assert_eq!(body["data"]["deliveries"], 0);
    assert!(ctx.sent.lock().unwrap().is_empty());

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/history").await;
    assert_eq!(body["data"]["total"], 0);

    // Turn quiet hours off: the same rule fires immediately, proving the
    // suppressed attempt did not start its cooldown window.
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({
            "email": "ops@example.com",
            "email_enabled": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-2")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fired"], 1);
    assert_eq!(body["data"]["suppressed"], 0);
    assert_eq!(body["data"]["deliveries"], 1);
    assert_eq!(ctx.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn critical_events_bypass_quiet_hours() {
    let ctx = build_test_context().await.expect("test context");
    let (start, end) = quiet_window_around_now();

    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({
            "email": "ops@example.com",
            "email_enabled": true,
            "quiet_hours_enabled": true,
            "quiet_hours_start": start,
            "quiet_hours_end": end,
            "timezone": "UTC"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut event = severe_event("evt-crit");
    event["severity"] = json!("critical");
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [event]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fired"], 1);
    assert_eq!(body["data"]["suppressed"], 0);
    assert_eq!(ctx.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ingest_respects_cooldown_within_batch() {
    let ctx = build_test_context().await.expect("test context");
    enable_email(&ctx.app).await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Two qualifying events in one batch: the second lands in cooldown.
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-1"), severe_event("evt-2")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 2);
    assert_eq!(body["data"]["fired"], 1);
    assert_eq!(body["data"]["suppressed"], 1);
    assert_eq!(body["data"]["deliveries"], 1);
}

#[tokio::test]
async fn ingest_ignores_non_matching_events() {
    let ctx = build_test_context().await.expect("test context");
    enable_email(&ctx.app).await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Wrong state and wrong condition value
    let mut off_state = severe_event("evt-ca");
    off_state["state"] = json!("CA");
    let mut moderate = severe_event("evt-mod");
    moderate["fields"]["severity"] = json!("Moderate");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [off_state, moderate]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched"], 0);
    assert_eq!(body["data"]["fired"], 0);
    assert_eq!(body["data"]["deliveries"], 0);
}

#[tokio::test]
async fn ingest_empty_batch_rejected() {
    let ctx = build_test_context().await.expect("test context");
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1104);
}

#[tokio::test]
async fn failed_delivery_lands_in_history() {
    let ctx = build_test_context_with(true).await.expect("test context");
    enable_email(&ctx.app).await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-1")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // A failed send still counts as a firing and a delivery row.
    assert_eq!(body["data"]["fired"], 1);
    assert_eq!(body["data"]["deliveries"], 1);

    let (_, body, _) =
        request_no_body(&ctx.app, "GET", "/api/alerts/history?status__eq=failed").await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["error_message"]
        .as_str()
        .unwrap()
        .contains("mock failure"));
}

#[tokio::test]
async fn webhook_delivery_uses_rule_url() {
    let ctx = build_test_context().await.expect("test context");

    // Webhooks are recipient-less in settings; enable the toggle only.
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/api/alerts/settings",
        Some(json!({"webhook_enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut rule = weather_rule_body("Webhook rule");
    rule["notification_methods"] = json!(["webhook"]);
    rule["webhook_url"] = json!("https://hooks.example.com/storm");
    let (status, _, _) = request_json(&ctx.app, "POST", "/api/alerts/rules", Some(rule)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/ingest",
        Some(json!({"events": [severe_event("evt-1")]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fired"], 1);

    let sent = ctx.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "https://hooks.example.com/storm");
}

#[tokio::test]
async fn test_endpoint_is_a_pure_dry_run() {
    let ctx = build_test_context().await.expect("test context");
    enable_email(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let rule_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) =
        request_json(&ctx.app, "POST", &format!("/api/alerts/test/{rule_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["would_trigger"], true);
    assert!(body["data"]["message"].as_str().unwrap().contains("email"));

    // Nothing was sent and nothing was recorded
    assert!(ctx.sent.lock().unwrap().is_empty());
    let (_, body, _) = request_no_body(&ctx.app, "GET", "/api/alerts/history").await;
    assert_eq!(body["data"]["total"], 0);

    // Unknown rule is a 404
    let (status, _, _) =
        request_json(&ctx.app, "POST", "/api/alerts/test/no-such-rule", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_endpoint_reports_blocked_channels() {
    let ctx = build_test_context().await.expect("test context");
    // Settings never saved: email stays disabled.

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/alerts/rules",
        Some(weather_rule_body("Severe weather")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let rule_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) =
        request_json(&ctx.app, "POST", &format!("/api/alerts/test/{rule_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["would_trigger"], false);
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("channel disabled"));
}
