use cardwatch_core::compiler::{CompileResult, RuleCompiler};
use cardwatch_core::evaluator::RuleEvaluator;
use cardwatch_core::repositories::{NotificationRepository, RuleRepository};
use cardwatch_primitives::models::{
    AlertRule, NotificationStatus, Severity, TxnStatus,
};
use chrono::{Duration, Utc};
use serial_test::serial;
use uuid::Uuid;

mod common;

use common::fixtures::{
    seed_card, seed_dining_history, seed_txn, seed_user, set_last_known, TxnFixture, UserFixture,
};

async fn create_rule(
    state: &std::sync::Arc<cardwatch_core::AppState>,
    user_id: Uuid,
    nl_text: &str,
) -> AlertRule {
    match RuleCompiler::compile_and_create(state, user_id, nl_text)
        .await
        .unwrap()
    {
        CompileResult::Persisted(rule) => rule,
        other => panic!("rule should compile to Valid, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn threshold_rule_fires_once_per_transaction() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    let rule = create_rule(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await;
    assert_eq!(rule.severity, Severity::Medium);

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 54_700,
            merchant_name: "ACME",
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert_eq!(report.triggered, vec![rule.id]);
    assert_eq!(report.notifications.len(), 1);

    let conn = &mut state.db.get().unwrap();
    let notification =
        NotificationRepository::find_by_id(conn, report.notifications[0])
            .unwrap()
            .unwrap();
    assert_eq!(notification.status, NotificationStatus::Queued);
    assert!(
        notification.title.contains("$547"),
        "title was {}",
        notification.title
    );

    let stored = RuleRepository::find_by_id(conn, rule.id).unwrap().unwrap();
    assert_eq!(stored.trigger_count, 1);
    assert!(stored.last_triggered_at.is_some());
}

#[tokio::test]
#[serial]
async fn re_evaluation_is_idempotent() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    let rule = create_rule(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await;

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 54_700,
            ..Default::default()
        },
    );

    for _ in 0..3 {
        RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    }

    let conn = &mut state.db.get().unwrap();
    assert_eq!(
        NotificationRepository::count_for_triple(conn, rule.id, txn.id).unwrap(),
        1
    );
    let stored = RuleRepository::find_by_id(conn, rule.id).unwrap().unwrap();
    assert_eq!(stored.trigger_count, 1);
}

#[tokio::test]
#[serial]
async fn pct_delta_payload_encodes_percent_over_baseline() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    seed_dining_history(conn, user.id, card.id);

    let rule = create_rule(
        &state,
        user.id,
        "Notify me if my dining expense exceeds the 30-day average by more than 40%",
    )
    .await;

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 9_800,
            merchant_name: "Luigi's",
            merchant_category: "dining",
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert_eq!(report.triggered, vec![rule.id]);

    let conn = &mut state.db.get().unwrap();
    let notification =
        NotificationRepository::find_by_id(conn, report.notifications[0])
            .unwrap()
            .unwrap();
    // 98 vs a 67 average is 46% over
    assert!(
        notification.body.contains("46%"),
        "body was {}",
        notification.body
    );
    assert!(notification.body.contains("$67.00"));
}

#[tokio::test]
#[serial]
async fn location_rule_works_without_consent_or_coords() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    // no consent, no app-reported coordinates on file
    let user = seed_user(
        conn,
        UserFixture {
            location_consent: false,
            ..Default::default()
        },
    );
    let card = seed_card(conn, user.id);
    let rule = create_rule(
        &state,
        user.id,
        "Alert if a transaction happens outside my home state",
    )
    .await;
    assert_eq!(rule.severity, Severity::High);

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            merchant_state: Some("NY"),
            coords: None,
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert_eq!(report.triggered, vec![rule.id]);
}

#[tokio::test]
#[serial]
async fn impossible_travel_triggers_location_rule() {
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
    let t0 = Utc::now() - Duration::hours(1);
    set_last_known(conn, user.id, 37.77, -122.42, t0);

    let rule = create_rule(
        &state,
        user.id,
        "Alert if a transaction happens outside my home state",
    )
    .await;

    // SF -> Boston in 30 minutes
    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            merchant_state: Some("MA"),
            coords: Some((42.36, -71.06)),
            occurred_at: t0 + Duration::minutes(30),
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert_eq!(report.triggered, vec![rule.id]);
}

#[tokio::test]
#[serial]
async fn refunds_do_not_fire_spend_rules() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    create_rule(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await;

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 60_000,
            status: TxnStatus::Refunded,
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert!(report.triggered.is_empty());
    assert!(report.notifications.is_empty());
}

#[tokio::test]
#[serial]
async fn below_threshold_transaction_is_quiet() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    create_rule(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await;

    let txn = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 12_000,
            ..Default::default()
        },
    );

    let report = RuleEvaluator::evaluate(&state, txn.id).await.unwrap();
    assert!(report.triggered.is_empty());
    assert_eq!(report.evaluated, 1);
}
