//! Per-transaction rule evaluation.
//!
//! Rules for one transaction run serially in (created_at, id) order; the
//! unique index on (rule_id, transaction_id, channel) makes replays
//! harmless. Across transactions the orchestrator runs evaluations in
//! parallel.

pub mod cheap;
pub mod message;
pub mod params;

use crate::analyzer;
use crate::app_state::AppState;
use crate::repositories::rule_sql::{run_rule_sql, ParamValue};
use crate::repositories::{
    NotificationRepository, RuleRepository, TransactionRepository, UserRepository,
};
use cardwatch_primitives::models::{
    AlertRule, CurrencyCode, NewAlertNotification, NotificationChannel, NotificationStatus,
    RuleKind, Transaction, TxnStatus,
};
use cardwatch_primitives::ApiError;
use cheap::CheapVerdict;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub transaction_id: Uuid,
    pub evaluated: usize,
    pub triggered: Vec<Uuid>,
    /// Freshly created notification ids, ready for dispatch.
    pub notifications: Vec<Uuid>,
    /// (rule_id, reason) pairs for rules skipped this round.
    pub skipped: Vec<(Uuid, String)>,
}

pub struct RuleEvaluator;

impl RuleEvaluator {
    pub async fn evaluate(
        state: &AppState,
        transaction_id: Uuid,
    ) -> Result<EvaluationReport, ApiError> {
        let mut conn = state.db.get()?;

        let txn = TransactionRepository::find_by_id(&mut conn, transaction_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Transaction {}", transaction_id)))?;
        let user = UserRepository::find_by_id(&mut conn, txn.user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User {}", txn.user_id)))?;

        let rules = RuleRepository::active_for_user(&mut conn, txn.user_id)?;
        let mut report = EvaluationReport {
            transaction_id,
            ..Default::default()
        };

        for rule in rules {
            report.evaluated += 1;

            // Refunds never fire spend rules; recurring-drift still sees
            // them.
            if txn.status == TxnStatus::Refunded
                && matches!(
                    rule.kind,
                    RuleKind::Threshold | RuleKind::PctDeltaVsBaseline
                )
            {
                continue;
            }

            let verdict = cheap::evaluate_cheap(
                &rule,
                &txn,
                &user,
                &state.fx,
                state.config.impossible_travel_max_kmh,
            );

            let outcome = match verdict {
                CheapVerdict::Triggered {
                    observed,
                    baseline,
                    detail: _,
                } => Some((observed, baseline)),
                CheapVerdict::NotTriggered => None,
                CheapVerdict::FxMissing => {
                    warn!(rule_id = %rule.id, txn_id = %txn.id, "Rule skipped: fx_missing");
                    report.skipped.push((rule.id, "fx_missing".to_string()));
                    continue;
                }
                CheapVerdict::NotCheap => {
                    match Self::evaluate_sql_rule(state, &mut conn, &rule, &txn) {
                        Ok(result) => result,
                        Err(SqlRuleError::FxMissing) => {
                            warn!(rule_id = %rule.id, txn_id = %txn.id, "Rule skipped: fx_missing");
                            report.skipped.push((rule.id, "fx_missing".to_string()));
                            continue;
                        }
                        Err(SqlRuleError::Sql(e)) => {
                            warn!(rule_id = %rule.id, txn_id = %txn.id, error = %e,
                                  "Rule SQL failed, skipping for this transaction");
                            report.skipped.push((rule.id, "sql_error".to_string()));
                            let deactivated = RuleRepository::record_failure(
                                &mut conn,
                                rule.id,
                                state.config.eval.rule_failure_limit,
                            )?;
                            if deactivated {
                                Self::notify_deactivation(&mut conn, &rule, &mut report)?;
                            }
                            continue;
                        }
                        Err(SqlRuleError::Fatal(e)) => return Err(e),
                    }
                }
            };

            if rule.consecutive_failures > 0 {
                RuleRepository::reset_failures(&mut conn, rule.id)?;
            }

            let Some((observed, baseline)) = outcome else {
                debug!(rule_id = %rule.id, txn_id = %txn.id, "Rule evaluated, not triggered");
                continue;
            };

            let rendered = message::render(&rule, &txn, observed, baseline);
            let mut fresh = Vec::new();
            for channel in rule.channel_list() {
                let inserted = NotificationRepository::insert_unique(
                    &mut conn,
                    NewAlertNotification {
                        id: Uuid::new_v4(),
                        rule_id: rule.id,
                        user_id: user.id,
                        transaction_id: Some(txn.id),
                        channel,
                        title: &rendered.title,
                        body: &rendered.body,
                        status: NotificationStatus::Queued,
                    },
                )?;
                if let Some(notification) = inserted {
                    fresh.push(notification.id);
                }
            }

            if !fresh.is_empty() {
                RuleRepository::record_trigger(&mut conn, rule.id)?;
                info!(rule_id = %rule.id, txn_id = %txn.id, count = fresh.len(),
                      "Rule triggered, notifications queued");
                report.triggered.push(rule.id);
                report.notifications.extend(fresh);
            }
        }

        Ok(report)
    }

    fn evaluate_sql_rule(
        state: &AppState,
        conn: &mut diesel::PgConnection,
        rule: &AlertRule,
        txn: &Transaction,
    ) -> Result<Option<(f64, Option<f64>)>, SqlRuleError> {
        // Foreign-currency transactions only proceed when the daily table
        // can place them; compared history is same-user, same-ledger.
        if txn.currency != CurrencyCode::USD
            && state
                .fx
                .convert_cents(txn.amount_cents, txn.currency, CurrencyCode::USD)
                .is_none()
        {
            return Err(SqlRuleError::FxMissing);
        }

        let mut extra = HashMap::new();
        if rule.kind == RuleKind::RecurringDrift {
            let merchant = rule
                .param_value("slots")
                .and_then(|s| s.get("merchant"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| txn.merchant_name.clone());
            let expected = analyzer::recurring_series(conn, txn.user_id, &merchant)
                .map_err(SqlRuleError::Fatal)?
                .map(|series| series.expected_amount_cents.round() as i64)
                .unwrap_or(0);
            extra.insert("expected_cents".to_string(), ParamValue::Int(expected));
        }

        let params = params::build_params(&rule.sql_params, txn.user_id, txn, &extra)
            .map_err(SqlRuleError::Sql)?;

        let row = run_rule_sql(
            conn,
            &rule.sql_text,
            &params,
            state.config.eval.timeout_ms,
        )
        .map_err(|e| match e {
            ApiError::DatabaseConnection(_) => SqlRuleError::Fatal(e),
            other => SqlRuleError::Sql(other),
        })?;

        if row.triggered {
            Ok(Some((row.observed, row.baseline)))
        } else {
            Ok(None)
        }
    }

    fn notify_deactivation(
        conn: &mut diesel::PgConnection,
        rule: &AlertRule,
        report: &mut EvaluationReport,
    ) -> Result<(), ApiError> {
        warn!(rule_id = %rule.id, "Rule auto-deactivated after repeated SQL failures");
        let rendered = message::render_deactivation(rule);
        let inserted = NotificationRepository::insert_unique(
            conn,
            NewAlertNotification {
                id: Uuid::new_v4(),
                rule_id: rule.id,
                user_id: rule.user_id,
                // system alert, not tied to a transaction
                transaction_id: None,
                channel: NotificationChannel::Email,
                title: &rendered.title,
                body: &rendered.body,
                status: NotificationStatus::Queued,
            },
        )?;
        if let Some(notification) = inserted {
            report.notifications.push(notification.id);
        }
        Ok(())
    }
}

#[derive(Debug)]
enum SqlRuleError {
    FxMissing,
    Sql(ApiError),
    Fatal(ApiError),
}
