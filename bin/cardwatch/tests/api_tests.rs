use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

mod common;

use common::fixtures::{seed_card, seed_user, UserFixture};

fn ingest_body(user_id: Uuid, card_id: Uuid, amount: f64) -> serde_json::Value {
    json!({
        "user_id": user_id,
        "card_id": card_id,
        "amount": amount,
        "currency": "USD",
        "merchant_name": "ACME",
        "merchant_category": "shopping",
        "merchant_state": "CA",
        "occurred_at": chrono::Utc::now().to_rfc3339(),
        "status": "APPROVED"
    })
}

#[tokio::test]
#[serial]
async fn ingestion_accepts_and_schedules() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);
    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);

    let server = TestServer::new(common::create_test_app(state.clone())).unwrap();
    let response = server
        .post("/api/transactions")
        .json(&ingest_body(user.id, card.id, 42.50))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "scheduled");
    assert!(Uuid::parse_str(body["transaction_id"].as_str().unwrap()).is_ok());
    assert_eq!(state.eval_queue.len(), 1);
}

#[tokio::test]
#[serial]
async fn negative_amounts_are_rejected() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);
    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);

    let server = TestServer::new(common::create_test_app(state)).unwrap();
    let response = server
        .post("/api/transactions")
        .json(&ingest_body(user.id, card.id, -10.0))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn unknown_card_is_a_404() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);
    let user = seed_user(conn, UserFixture::default());

    let server = TestServer::new(common::create_test_app(state)).unwrap();
    let response = server
        .post("/api/transactions")
        .json(&ingest_body(user.id, Uuid::new_v4(), 10.0))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn rule_endpoints_require_identity() {
    let state = common::create_test_app_state();
    let server = TestServer::new(common::create_test_app(state)).unwrap();

    let response = server
        .post("/api/rules/validate")
        .json(&json!({ "nl_text": "Alert me if any single transaction exceeds $500" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn rule_lifecycle_over_http() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);
    let user = seed_user(conn, UserFixture::default());

    let server = TestServer::new(common::create_test_app(state)).unwrap();

    // create
    let created = server
        .post("/api/rules")
        .add_header("X-User-Id", user.id.to_string())
        .json(&json!({ "nl_text": "Alert me if any single transaction exceeds $500" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = created.json();
    assert_eq!(body["status"], "valid");
    let rule_id = body["rule"]["id"].as_str().unwrap().to_string();

    // list
    let listed = server
        .get("/api/rules")
        .add_header("X-User-Id", user.id.to_string())
        .await;
    listed.assert_status_ok();
    let rules: serde_json::Value = listed.json();
    assert_eq!(rules.as_array().unwrap().len(), 1);

    // deactivate
    let patched = server
        .patch(&format!("/api/rules/{}", rule_id))
        .add_header("X-User-Id", user.id.to_string())
        .json(&json!({ "is_active": false }))
        .await;
    patched.assert_status_ok();
    let patched_body: serde_json::Value = patched.json();
    assert_eq!(patched_body["rule"]["is_active"], false);

    // delete
    let deleted = server
        .delete(&format!("/api/rules/{}", rule_id))
        .add_header("X-User-Id", user.id.to_string())
        .await;
    deleted.assert_status(StatusCode::NO_CONTENT);

    let gone = server
        .get(&format!("/api/rules/{}", rule_id))
        .add_header("X-User-Id", user.id.to_string())
        .await;
    gone.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn validate_surface_never_persists() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);
    let user = seed_user(conn, UserFixture::default());

    let server = TestServer::new(common::create_test_app(state)).unwrap();
    let response = server
        .post("/api/rules/validate")
        .add_header("X-User-Id", user.id.to_string())
        .json(&json!({ "nl_text": "Alert me if any single transaction exceeds $500" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "valid");
    assert!(body["sql_text"].as_str().unwrap().starts_with("SELECT"));

    let listed = server
        .get("/api/rules")
        .add_header("X-User-Id", user.id.to_string())
        .await;
    let rules: serde_json::Value = listed.json();
    assert!(rules.as_array().unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn health_reports_queue_depths() {
    let state = common::create_test_app_state();
    let server = TestServer::new(common::create_test_app(state)).unwrap();

    let response = server.get("/api/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["eval_queue_depth"].is_number());
}
