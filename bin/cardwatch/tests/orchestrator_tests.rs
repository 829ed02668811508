use cardwatch_core::app_state::AppState;
use cardwatch_core::compiler::{CompileResult, RuleCompiler};
use cardwatch_core::orchestrator::Orchestrator;
use cardwatch_core::repositories::NotificationRepository;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{
    Coords, IngestTransactionRequest, NotificationStatus, TxnStatus,
};
use chrono::Utc;
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

mod common;

use common::fixtures::{seed_card, seed_user, UserFixture};

fn ingest_request(user_id: Uuid, card_id: Uuid, amount: f64) -> IngestTransactionRequest {
    IngestTransactionRequest {
        user_id,
        card_id,
        amount,
        currency: "USD".to_string(),
        merchant_name: "ACME".to_string(),
        merchant_category: "shopping".to_string(),
        merchant_city: None,
        merchant_state: Some("CA".to_string()),
        merchant_country: Some("US".to_string()),
        occurred_at: Utc::now(),
        coords: None,
        status: TxnStatus::Approved,
    }
}

#[tokio::test]
#[serial]
async fn full_queue_rejects_with_backpressure() {
    let mut config = common::test_config();
    config.eval.queue_max = 1;
    let state = AppState::new(common::create_test_db_pool(), config).unwrap();
    // share the migrated schema set up by the default state
    let _ = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);

    // no workers running, so the first ingest fills the queue
    Orchestrator::ingest(&state, ingest_request(user.id, card.id, 10.0))
        .await
        .unwrap();
    let rejected = Orchestrator::ingest(&state, ingest_request(user.id, card.id, 11.0)).await;

    assert!(matches!(rejected, Err(ApiError::QueueFull)));
}

#[tokio::test]
#[serial]
async fn ingest_to_delivered_notification() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    let rule = match RuleCompiler::compile_and_create(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await
    .unwrap()
    {
        CompileResult::Persisted(rule) => rule,
        other => panic!("rule should persist, got {:?}", other),
    };

    let orchestrator = Orchestrator::spawn(state.clone());

    Orchestrator::ingest(&state, ingest_request(user.id, card.id, 547.0))
        .await
        .unwrap();

    // evaluation and dispatch both run in the background; email is in mock
    // mode, so the notification should land in SENT
    let mut delivered = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let conn = &mut state.db.get().unwrap();
        let notifications =
            NotificationRepository::list_for_user(conn, user.id, None).unwrap();
        if let Some(n) = notifications
            .iter()
            .find(|n| n.status == NotificationStatus::Sent)
        {
            delivered = Some(n.clone());
            break;
        }
    }

    let delivered = delivered.expect("notification should be delivered");
    assert_eq!(delivered.rule_id, rule.id);
    assert!(delivered.title.contains("$547"));

    orchestrator
        .shutdown(&state, Duration::from_secs(5))
        .await;
}

#[tokio::test]
#[serial]
async fn shutdown_drains_pending_evaluations() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);

    for i in 0..5 {
        Orchestrator::ingest(&state, ingest_request(user.id, card.id, 10.0 + i as f64))
            .await
            .unwrap();
    }
    assert_eq!(state.eval_queue.len(), 5);

    let orchestrator = Orchestrator::spawn(state.clone());
    orchestrator
        .shutdown(&state, Duration::from_secs(10))
        .await;

    assert!(state.eval_queue.is_empty());
    // a closed queue rejects new work
    let rejected = Orchestrator::ingest(&state, ingest_request(user.id, card.id, 99.0)).await;
    assert!(matches!(rejected, Err(ApiError::Internal(_))));
}

#[tokio::test]
#[serial]
async fn consented_coords_advance_last_known_location() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(
        conn,
        UserFixture {
            location_consent: true,
            ..Default::default()
        },
    );
    let card = seed_card(conn, user.id);

    let mut request = ingest_request(user.id, card.id, 25.0);
    request.coords = Some(Coords {
        lat: 37.77,
        lon: -122.42,
    });
    Orchestrator::ingest(&state, request).await.unwrap();

    let conn = &mut state.db.get().unwrap();
    let stored = cardwatch_core::repositories::UserRepository::find_by_id(conn, user.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_known_latitude, Some(37.77));
    assert!(stored.last_known_at.is_some());
}
