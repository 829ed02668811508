use cardwatch_core::compiler::{grammar, CompileOutcome, CompileResult, RuleCompiler};
use cardwatch_core::evaluator::params::declared_params;
use cardwatch_primitives::models::RuleKind;
use serial_test::serial;

mod common;

use common::fixtures::{seed_card, seed_dining_history, seed_user, UserFixture};

#[tokio::test]
#[serial]
async fn threshold_rule_compiles_and_persists() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());

    let result = RuleCompiler::compile_and_create(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await
    .unwrap();

    let CompileResult::Persisted(rule) = result else {
        panic!("expected the rule to persist, got {:?}", result);
    };
    assert_eq!(rule.kind, RuleKind::Threshold);
    assert!(rule.validated_sql);
    assert!(rule.is_active);
    assert_eq!(rule.sql_params["slots"]["threshold_cents"], 50_000);

    // whatever was stored must still pass the grammar
    let declared = declared_params(&rule.sql_params);
    assert_eq!(grammar::validate(&rule.sql_text, &declared), Ok(()));
}

#[tokio::test]
#[serial]
async fn paraphrased_rule_is_reported_as_duplicate() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());

    let first = RuleCompiler::compile_and_create(
        &state,
        user.id,
        "let me know if I spend over five hundred dollars in one charge",
    )
    .await
    .unwrap();
    let CompileResult::Persisted(original) = first else {
        panic!("first rule should persist");
    };

    let second = RuleCompiler::compile(
        &state,
        user.id,
        "alert me when a single transaction is more than $500",
    )
    .await
    .unwrap();

    match second {
        CompileOutcome::DuplicateOf { rule_id, similarity } => {
            assert_eq!(rule_id, original.id);
            assert!(
                similarity >= state.config.dup_similarity_threshold,
                "similarity {} below threshold",
                similarity
            );
        }
        other => panic!("expected DuplicateOf, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn off_domain_text_is_invalid_with_hints() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());

    let outcome = RuleCompiler::compile(&state, user.id, "Alert me when the weather turns bad")
        .await
        .unwrap();

    match outcome {
        CompileOutcome::Invalid { reason, hints } => {
            assert_eq!(reason, "unparseable");
            assert!(!hints.is_empty());
        }
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn vague_text_asks_clarifying_questions() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());

    let outcome = RuleCompiler::compile(&state, user.id, "keep an eye on things for me")
        .await
        .unwrap();

    match outcome {
        CompileOutcome::Ambiguous { questions } => assert!(!questions.is_empty()),
        other => panic!("expected Ambiguous, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn pct_delta_rule_validates_against_history() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());
    let card = seed_card(conn, user.id);
    seed_dining_history(conn, user.id, card.id);

    let result = RuleCompiler::compile_and_create(
        &state,
        user.id,
        "Notify me if my dining expense exceeds the 30-day average by more than 40%",
    )
    .await
    .unwrap();

    let CompileResult::Persisted(rule) = result else {
        panic!("expected the rule to persist, got {:?}", result);
    };
    assert_eq!(rule.kind, RuleKind::PctDeltaVsBaseline);
    assert!(rule.sql_text.contains("AVG"));
    assert_eq!(rule.sql_params["slots"]["category"], "dining");
}

#[tokio::test]
#[serial]
async fn editing_a_rule_archives_the_prior_version() {
    let state = common::create_test_app_state();
    let conn = &mut state.db.get().unwrap();
    common::cleanup_test_db(conn);

    let user = seed_user(conn, UserFixture::default());

    let created = RuleCompiler::compile_and_create(
        &state,
        user.id,
        "Alert me if any single transaction exceeds $500",
    )
    .await
    .unwrap();
    let CompileResult::Persisted(rule) = created else {
        panic!("rule should persist");
    };

    let replaced = RuleCompiler::compile_and_replace(
        &state,
        user.id,
        rule.id,
        "Alert me if any single transaction exceeds $750",
    )
    .await
    .unwrap();
    let CompileResult::Persisted(updated) = replaced else {
        panic!("edit should persist");
    };
    assert_eq!(updated.id, rule.id);
    assert_eq!(updated.sql_params["slots"]["threshold_cents"], 75_000);

    let conn = &mut state.db.get().unwrap();
    let history =
        cardwatch_core::repositories::RuleRepository::history(conn, rule.id).unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].nl_text.contains("$500"));
}
