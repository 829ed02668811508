use cardwatch_core::analyzer;
use cardwatch_primitives::models::{BaselineKind, TxnStatus};
use chrono::{Duration, Utc};
use serial_test::serial;

mod common;

use common::fixtures::{seed_card, seed_txn, seed_user, TxnFixture, UserFixture};

#[tokio::test]
#[serial]
async fn avg_and_median_baselines_agree_on_flat_history() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    for day in 1..=10i64 {
        seed_txn(
            conn,
            user.id,
            card.id,
            TxnFixture {
                amount_cents: 6_700,
                merchant_category: "dining",
                occurred_at: Utc::now() - Duration::days(day),
                status: TxnStatus::Settled,
                ..Default::default()
            },
        );
    }

    let avg = analyzer::baseline(
        conn,
        user.id,
        BaselineKind::Avg,
        Some("dining"),
        None,
        30,
        Utc::now(),
    )
    .unwrap();
    let median = analyzer::baseline(
        conn,
        user.id,
        BaselineKind::Median,
        Some("dining"),
        None,
        30,
        Utc::now(),
    )
    .unwrap();

    assert_eq!(avg, Some(6_700.0));
    assert_eq!(median, Some(6_700.0));
}

#[tokio::test]
#[serial]
async fn refunded_and_declined_transactions_stay_out_of_baselines() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 5_000,
            merchant_category: "dining",
            occurred_at: Utc::now() - Duration::days(2),
            status: TxnStatus::Settled,
            ..Default::default()
        },
    );
    seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 99_999,
            merchant_category: "dining",
            occurred_at: Utc::now() - Duration::days(3),
            status: TxnStatus::Refunded,
            ..Default::default()
        },
    );

    let avg = analyzer::baseline(
        conn,
        user.id,
        BaselineKind::Avg,
        Some("dining"),
        None,
        30,
        Utc::now(),
    )
    .unwrap();
    assert_eq!(avg, Some(5_000.0));
}

#[tokio::test]
#[serial]
async fn anomaly_score_is_ratio_to_category_median() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    for day in 1..=5i64 {
        seed_txn(
            conn,
            user.id,
            card.id,
            TxnFixture {
                amount_cents: 2_000,
                merchant_category: "coffee",
                occurred_at: Utc::now() - Duration::days(day),
                status: TxnStatus::Settled,
                ..Default::default()
            },
        );
    }
    let spike = seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            amount_cents: 8_000,
            merchant_category: "coffee",
            ..Default::default()
        },
    );

    let score = analyzer::anomaly_score(conn, &spike).unwrap();
    assert!((score - 4.0).abs() < 1e-9, "score was {}", score);
}

#[tokio::test]
#[serial]
async fn recurring_series_finds_monthly_cadence() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    for months_back in 1..=4i64 {
        seed_txn(
            conn,
            user.id,
            card.id,
            TxnFixture {
                amount_cents: 1_099,
                merchant_name: "Streamly",
                merchant_category: "entertainment",
                occurred_at: Utc::now() - Duration::days(30 * months_back),
                status: TxnStatus::Settled,
                ..Default::default()
            },
        );
    }

    let series = analyzer::recurring_series(conn, user.id, "Streamly")
        .unwrap()
        .expect("four observations make a series");
    assert!((series.period_days - 30.0).abs() < 1.0);
    assert_eq!(series.expected_amount_cents, 1_099.0);
    assert!((series.drift_pct(1_399) - 27.3).abs() < 0.1);

    // a charge one period after the last observation fits the schedule
    assert!(series.on_schedule(Utc::now()));
}

#[tokio::test]
#[serial]
async fn too_few_observations_is_no_series() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    seed_txn(
        conn,
        user.id,
        card.id,
        TxnFixture {
            merchant_name: "Streamly",
            ..Default::default()
        },
    );

    let series = analyzer::recurring_series(conn, user.id, "Streamly").unwrap();
    assert!(series.is_none());
}
