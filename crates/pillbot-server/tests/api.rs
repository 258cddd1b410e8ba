//! End-to-end API tests covering the full reconciliation flow: account
//! registration, medicine + schedule creation, mobile and hardware status
//! reports, and the analytics read side.

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use pillbot_core::ServerConfig;
use pillbot_server::{api, state::AppState};

struct TestApp {
    server: TestServer,
    _dir: tempfile::TempDir,
}

fn spawn() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServerConfig::default();
    config.data_dir = dir.path().to_path_buf();

    let state = AppState::new(config).expect("state").into_shared();
    let server = TestServer::new(api::create_router(state)).expect("server");
    TestApp { server, _dir: dir }
}

/// Register a fresh account and return its bearer token and user id.
async fn register_user(app: &TestApp, username: &str) -> (String, String) {
    let res = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "password": "hunter22",
            "name": "Amina Rahman",
            "age": 67
        }))
        .await;
    res.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = res.json();
    assert_eq!(body["success"], true);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, user_id)
}

/// Register a medicine and return its id.
async fn add_medicine(app: &TestApp, token: &str, name: &str, slot: &str, quantity: u32) -> String {
    let res = app
        .server
        .post("/api/medicines")
        .authorization_bearer(token)
        .json(&json!({
            "name": name,
            "dosage": "100mg",
            "times": ["08:00"],
            "slot": slot,
            "quantity": quantity
        }))
        .await;
    res.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = res.json();
    body["data"]["id"].as_str().unwrap().to_string()
}

/// First dose-log id of the caller, ascending by scheduled time.
async fn first_log_id(app: &TestApp, token: &str) -> String {
    let res = app
        .server
        .get("/api/logs")
        .authorization_bearer(token)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert!(body["count"].as_u64().unwrap() > 0, "schedule was generated");
    body["data"][0]["id"].as_str().unwrap().to_string()
}

async fn remaining_stock(app: &TestApp, token: &str, medicine_id: &str) -> u64 {
    let res = app
        .server
        .get(&format!("/api/medicines/{medicine_id}"))
        .authorization_bearer(token)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    body["data"]["remaining"].as_u64().unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let app = spawn();
    let res = app.server.get("/health").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn authenticated_routes_reject_missing_token() {
    let app = spawn();
    let res = app.server.get("/api/medicines").await;
    res.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    let body: Value = res.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "missing_token");
}

#[tokio::test]
async fn login_round_trip() {
    let app = spawn();
    register_user(&app, "amina42").await;

    let res = app
        .server
        .post("/api/auth/login")
        .json(&json!({"username": "AMINA42", "password": "hunter22"}))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    let token = body["data"]["token"].as_str().unwrap();

    let profile = app
        .server
        .get("/api/auth/profile")
        .authorization_bearer(token)
        .await;
    profile.assert_status_ok();
    let profile: Value = profile.json();
    assert_eq!(profile["data"]["username"], "amina42");

    let bad = app
        .server
        .post("/api/auth/login")
        .json(&json!({"username": "amina42", "password": "wrong22"}))
        .await;
    bad.assert_status(axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn medicine_registration_generates_schedule() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;
    add_medicine(&app, &token, "Aspirin", "1", 30).await;

    let res = app
        .server
        .get("/api/logs")
        .authorization_bearer(&token)
        .await;
    let body: Value = res.json();
    // One 08:00 slot per day over a 7-day window, today's possibly past.
    let count = body["count"].as_u64().unwrap();
    assert!((6..=7).contains(&count), "unexpected schedule size {count}");
    assert_eq!(body["data"][0]["status"], "pending");
    assert_eq!(body["data"][0]["medicine_name"], "Aspirin");
}

#[tokio::test]
async fn slot_conflict_then_deactivate_then_register() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;
    let first = add_medicine(&app, &token, "Aspirin", "1", 30).await;

    let conflict = app
        .server
        .post("/api/medicines")
        .authorization_bearer(&token)
        .json(&json!({
            "name": "Metformin",
            "dosage": "500mg",
            "times": ["20:00"],
            "slot": "1",
            "quantity": 60
        }))
        .await;
    conflict.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = conflict.json();
    assert_eq!(body["error"], "slot_conflict");
    assert!(body["message"].as_str().unwrap().contains("Aspirin"));

    let delete = app
        .server
        .delete(&format!("/api/medicines/{first}"))
        .authorization_bearer(&token)
        .await;
    delete.assert_status_ok();

    add_medicine(&app, &token, "Metformin", "1", 60).await;
}

#[tokio::test]
async fn mobile_taken_report_decrements_stock_once() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;
    let medicine_id = add_medicine(&app, &token, "Aspirin", "1", 10).await;
    let log_id = first_log_id(&app, &token).await;

    let res = app
        .server
        .put(&format!("/api/logs/{log_id}/status"))
        .authorization_bearer(&token)
        .json(&json!({"status": "taken"}))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["applied"], true);
    assert_eq!(remaining_stock(&app, &token, &medicine_id).await, 9);

    // Second taken report: acknowledged, no second decrement.
    let dup = app
        .server
        .put(&format!("/api/logs/{log_id}/status"))
        .authorization_bearer(&token)
        .json(&json!({"status": "taken"}))
        .await;
    dup.assert_status_ok();
    let dup: Value = dup.json();
    assert_eq!(dup["applied"], false);
    assert_eq!(remaining_stock(&app, &token, &medicine_id).await, 9);

    // A conflicting terminal report loses with 409.
    let skip = app
        .server
        .put(&format!("/api/logs/{log_id}/status"))
        .authorization_bearer(&token)
        .json(&json!({"status": "skipped", "notes": "changed my mind"}))
        .await;
    skip.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn foreign_logs_are_invisible() {
    let app = spawn();
    let (token_a, _) = register_user(&app, "amina42").await;
    add_medicine(&app, &token_a, "Aspirin", "1", 30).await;
    let log_id = first_log_id(&app, &token_a).await;

    let (token_b, _) = register_user(&app, "badru7").await;
    let res = app
        .server
        .get(&format!("/api/logs/{log_id}"))
        .authorization_bearer(&token_b)
        .await;
    res.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hardware_flow_pull_once_then_snooze_escalates() {
    let app = spawn();
    let (token, user_id) = register_user(&app, "amina42").await;
    add_medicine(&app, &token, "Aspirin", "1", 30).await;

    // Unregistered pulls are a 404.
    let unregistered = app
        .server
        .get("/api/hardware/schedule")
        .add_query_param("bot_id", "MD-BOT-07")
        .await;
    unregistered.assert_status(axum::http::StatusCode::NOT_FOUND);

    let register = app
        .server
        .post("/api/hardware/register")
        .json(&json!({"bot_id": "MD-BOT-07", "user_id": user_id}))
        .await;
    register.assert_status_ok();

    let start = Utc::now().to_rfc3339();
    let end = (Utc::now() + Duration::days(7)).to_rfc3339();
    let pull = app
        .server
        .get("/api/hardware/schedule")
        .add_query_param("bot_id", "MD-BOT-07")
        .add_query_param("start_time", &start)
        .add_query_param("end_time", &end)
        .await;
    pull.assert_status_ok();
    let body: Value = pull.json();
    let count = body["count"].as_u64().unwrap();
    assert!(count > 0);
    let log_id = body["data"][0]["log_id"].as_str().unwrap().to_string();

    // The sync flag was persisted: the same window is empty on re-pull.
    let repull = app
        .server
        .get("/api/hardware/schedule")
        .add_query_param("bot_id", "MD-BOT-07")
        .add_query_param("start_time", &start)
        .add_query_param("end_time", &end)
        .await;
    let repull: Value = repull.json();
    assert_eq!(repull["count"], 0);

    // Three snoozes: the third lands missed with snoozed_until unset.
    for (i, expected) in [(1, "snoozed"), (2, "snoozed"), (3, "missed")] {
        let res = app
            .server
            .post("/api/hardware/update-status")
            .json(&json!({"bot_id": "MD-BOT-07", "log_id": log_id, "status": "snoozed", "seq": i}))
            .await;
        res.assert_status_ok();
        let body: Value = res.json();
        assert_eq!(body["data"]["status"], expected, "snooze #{i}");
    }

    let log = app
        .server
        .get(&format!("/api/logs/{log_id}"))
        .authorization_bearer(&token)
        .await;
    let log: Value = log.json();
    assert_eq!(log["data"]["snooze_count"], 3);
    assert!(log["data"]["snoozed_until"].is_null());
}

#[tokio::test]
async fn hardware_duplicate_dispense_is_idempotent() {
    let app = spawn();
    let (token, user_id) = register_user(&app, "amina42").await;
    let medicine_id = add_medicine(&app, &token, "Aspirin", "1", 10).await;
    let log_id = first_log_id(&app, &token).await;

    app.server
        .post("/api/hardware/register")
        .json(&json!({"bot_id": "MD-BOT-07", "user_id": user_id}))
        .await
        .assert_status_ok();

    let report = json!({"bot_id": "MD-BOT-07", "log_id": log_id, "status": "dispensed", "seq": 1});
    let first = app.server.post("/api/hardware/update-status").json(&report).await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["applied"], true);
    assert_eq!(remaining_stock(&app, &token, &medicine_id).await, 9);

    // At-least-once redelivery, same seq: acknowledged without side effects.
    let second = app.server.post("/api/hardware/update-status").json(&report).await;
    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(second["applied"], false);
    assert_eq!(remaining_stock(&app, &token, &medicine_id).await, 9);
}

#[tokio::test]
async fn hardware_bulk_update_isolates_failures() {
    let app = spawn();
    let (token, user_id) = register_user(&app, "amina42").await;
    add_medicine(&app, &token, "Aspirin", "1", 10).await;
    let log_id = first_log_id(&app, &token).await;

    app.server
        .post("/api/hardware/register")
        .json(&json!({"bot_id": "MD-BOT-07", "user_id": user_id}))
        .await
        .assert_status_ok();

    let res = app
        .server
        .post("/api/hardware/bulk-update")
        .json(&json!({
            "bot_id": "MD-BOT-07",
            "updates": [
                {"log_id": log_id, "status": "dispensed"},
                {"log_id": "00000000-0000-4000-8000-000000000000", "status": "dispensed"}
            ]
        }))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][0]["success"], true);
    assert_eq!(body["results"][1]["success"], false);
}

#[tokio::test]
async fn hardware_slots_reflect_active_medicines() {
    let app = spawn();
    let (token, user_id) = register_user(&app, "amina42").await;
    add_medicine(&app, &token, "Aspirin", "2", 30).await;
    add_medicine(&app, &token, "Metformin", "1", 60).await;

    app.server
        .post("/api/hardware/register")
        .json(&json!({"bot_id": "MD-BOT-07", "user_id": user_id}))
        .await
        .assert_status_ok();

    let res = app
        .server
        .get("/api/hardware/slots")
        .add_query_param("bot_id", "MD-BOT-07")
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["slot"], "1");
    assert_eq!(body["data"][0]["medicine_name"], "Metformin");
}

#[tokio::test]
async fn hardware_health_reports_registration() {
    let app = spawn();
    let (_, user_id) = register_user(&app, "amina42").await;

    let res = app
        .server
        .get("/api/hardware/health")
        .add_query_param("bot_id", "MD-BOT-07")
        .await;
    let body: Value = res.json();
    assert_eq!(body["registered"], false);

    app.server
        .post("/api/hardware/register")
        .json(&json!({"bot_id": "MD-BOT-07", "user_id": user_id}))
        .await
        .assert_status_ok();

    let res = app
        .server
        .get("/api/hardware/health")
        .add_query_param("bot_id", "MD-BOT-07")
        .await;
    let body: Value = res.json();
    assert_eq!(body["registered"], true);
}

#[tokio::test]
async fn low_stock_threshold_boundaries() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;

    let res = app
        .server
        .post("/api/medicines")
        .authorization_bearer(&token)
        .json(&json!({
            "name": "Aspirin",
            "dosage": "100mg",
            "times": ["08:00"],
            "slot": "1",
            "quantity": 30,
            "remaining": 5
        }))
        .await;
    res.assert_status(axum::http::StatusCode::CREATED);

    let included = app
        .server
        .get("/api/medicines/alerts/low-stock")
        .authorization_bearer(&token)
        .add_query_param("threshold", 7)
        .await;
    let included: Value = included.json();
    assert_eq!(included["count"], 1);

    let excluded = app
        .server
        .get("/api/medicines/alerts/low-stock")
        .authorization_bearer(&token)
        .add_query_param("threshold", 3)
        .await;
    let excluded: Value = excluded.json();
    assert_eq!(excluded["count"], 0);
}

#[tokio::test]
async fn adherence_rate_is_bounded() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;

    // Empty history: rate defined as 0.
    let res = app
        .server
        .get("/api/analytics/adherence")
        .authorization_bearer(&token)
        .add_query_param("period", "week")
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["data"]["overview"]["adherence_rate"], 0);
    assert_eq!(body["data"]["overview"]["total_scheduled"], 0);

    add_medicine(&app, &token, "Aspirin", "1", 30).await;
    let log_id = first_log_id(&app, &token).await;
    app.server
        .put(&format!("/api/logs/{log_id}/status"))
        .authorization_bearer(&token)
        .json(&json!({"status": "taken"}))
        .await
        .assert_status_ok();

    let res = app
        .server
        .get("/api/analytics/adherence")
        .authorization_bearer(&token)
        .add_query_param("period", "month")
        .await;
    let body: Value = res.json();
    let rate = body["data"]["overview"]["adherence_rate"].as_u64().unwrap();
    assert!(rate <= 100);
}

#[tokio::test]
async fn insights_always_include_the_adherence_band() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;

    let res = app
        .server
        .get("/api/analytics/insights")
        .authorization_bearer(&token)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert!(body["count"].as_u64().unwrap() >= 1);
    assert_eq!(body["data"][0]["type"], "warning");
}

#[tokio::test]
async fn patterns_cover_all_days_and_slots() {
    let app = spawn();
    let (token, _) = register_user(&app, "amina42").await;

    let res = app
        .server
        .get("/api/analytics/patterns")
        .authorization_bearer(&token)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["data"]["day_analysis"].as_array().unwrap().len(), 7);
    assert_eq!(body["data"]["time_analysis"].as_array().unwrap().len(), 4);
    assert!(body["data"]["best_day"].is_null());
}
