//! Deterministic SQL templates, one per rule kind.
//!
//! Every template produces a single row of
//! `(triggered bool, observed float8, baseline float8?, detail jsonb?)`,
//! scopes itself to `:user_id`, anchors on `:txn_id`, and references
//! `occurred_at`. The only text interpolated outside the placeholder
//! mechanism is the comparison operator, which comes from a closed enum.

use crate::compiler::ground::GroundedRule;
use crate::compiler::intent::Operator;
use cardwatch_primitives::models::{BaselineKind, RuleKind};
use cardwatch_primitives::ApiError;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct SynthesizedSql {
    pub sql: String,
    /// Placeholder names the statement is allowed to use; persisted with the
    /// rule and re-checked by the grammar on every compile.
    pub declared_params: Vec<String>,
    /// Static slot values the evaluator binds at run time, stored as the
    /// rule's sql_params jsonb alongside the declared names.
    pub slots: Value,
}

impl SynthesizedSql {
    pub fn params_json(&self) -> Value {
        json!({
            "declared": self.declared_params,
            "slots": self.slots,
        })
    }
}

fn declared(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn synthesize(rule: &GroundedRule) -> Result<SynthesizedSql, ApiError> {
    let intent = &rule.intent;
    match intent.kind {
        RuleKind::Threshold => {
            let op = intent.operator.unwrap_or(Operator::Gt);
            let threshold_cents = intent
                .amount_cents()
                .ok_or_else(|| ApiError::Internal("Threshold rule without amount".into()))?;
            let sql = format!(
                "SELECT (t.amount_cents {op} :threshold_cents) AS triggered, \
                 t.amount_cents::float8 / 100.0 AS observed, \
                 NULL::float8 AS baseline, \
                 jsonb_build_object('merchant', t.merchant_name) AS detail \
                 FROM transactions t \
                 WHERE t.user_id = :user_id AND t.id = :txn_id \
                 AND t.occurred_at <= :window_end",
                op = op.sql()
            );
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&["user_id", "txn_id", "threshold_cents", "window_end"]),
                slots: json!({
                    "threshold_cents": threshold_cents,
                    "operator": op,
                }),
            })
        }

        RuleKind::PctDeltaVsBaseline => {
            let baseline = intent.baseline.unwrap_or(BaselineKind::Avg);
            let pct = intent
                .threshold_pct
                .ok_or_else(|| ApiError::Internal("Pct-delta rule without percent".into()))?;
            let factor = 1.0 + pct / 100.0;
            let window_days = intent.window_days.unwrap_or(30);

            let aggregate = match baseline {
                BaselineKind::Median => {
                    "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY t.amount_cents)"
                }
                _ => "AVG(t.amount_cents)",
            };
            let scope = if intent.category.is_some() {
                "LOWER(t.merchant_category) = :category"
            } else {
                "LOWER(t.merchant_name) LIKE :merchant_pattern"
            };

            let sql = format!(
                "WITH current_txn AS ( \
                 SELECT id, amount_cents, merchant_category, merchant_name, occurred_at \
                 FROM transactions \
                 WHERE user_id = :user_id AND id = :txn_id \
                 ), historical AS ( \
                 SELECT COALESCE({aggregate}, 0.0) AS baseline_cents \
                 FROM transactions t, current_txn ct \
                 WHERE t.user_id = :user_id \
                 AND {scope} \
                 AND t.occurred_at >= :window_start \
                 AND t.occurred_at < ct.occurred_at \
                 ) \
                 SELECT (h.baseline_cents > 0.0 AND \
                 ct.amount_cents > h.baseline_cents * :factor) AS triggered, \
                 ct.amount_cents::float8 / 100.0 AS observed, \
                 h.baseline_cents::float8 / 100.0 AS baseline, \
                 jsonb_build_object('threshold_pct', :threshold_pct) AS detail \
                 FROM current_txn ct, historical h",
                aggregate = aggregate,
                scope = scope
            );

            let mut params = vec!["user_id", "txn_id", "window_start", "factor", "threshold_pct"];
            let scope_slot = if let Some(category) = &intent.category {
                params.push("category");
                json!({ "category": category.to_lowercase() })
            } else {
                params.push("merchant_pattern");
                let merchant = intent.merchant.as_deref().ok_or_else(|| {
                    ApiError::Internal("Pct-delta rule without category or merchant".into())
                })?;
                json!({ "merchant_pattern": format!("%{}%", merchant.to_lowercase()) })
            };

            let mut slots = json!({
                "factor": factor,
                "threshold_pct": pct,
                "window_days": window_days,
                "baseline": baseline,
            });
            if let Value::Object(extra) = scope_slot {
                if let Value::Object(base) = &mut slots {
                    base.extend(extra);
                }
            }

            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&params),
                slots,
            })
        }

        RuleKind::Location => {
            // Named-place rules match the merchant city in SQL; the cheap
            // path also checks coordinate proximity. Home-state rules
            // compare merchant state.
            if let Some((place_name, lat, lon)) = &rule.place {
                let sql = "SELECT (t.merchant_city IS NOT NULL AND \
                     LOWER(t.merchant_city) = LOWER(:place_name)) AS triggered, \
                     0.0::float8 AS observed, \
                     NULL::float8 AS baseline, \
                     jsonb_build_object('merchant_city', t.merchant_city) AS detail \
                     FROM transactions t \
                     WHERE t.user_id = :user_id AND t.id = :txn_id \
                     AND t.occurred_at <= :window_end"
                    .to_string();
                return Ok(SynthesizedSql {
                    sql,
                    declared_params: declared(&["user_id", "txn_id", "place_name", "window_end"]),
                    slots: json!({
                        "place_name": place_name,
                        "place_lat": lat,
                        "place_lon": lon,
                        "geo_scope": intent.geo_scope,
                    }),
                });
            }

            let sql = "SELECT (t.merchant_state IS NOT NULL AND \
                 NOT (LOWER(t.merchant_state) = LOWER(:home_state))) AS triggered, \
                 0.0::float8 AS observed, \
                 NULL::float8 AS baseline, \
                 jsonb_build_object('merchant_state', t.merchant_state) AS detail \
                 FROM transactions t \
                 WHERE t.user_id = :user_id AND t.id = :txn_id \
                 AND t.occurred_at <= :window_end"
                .to_string();
            let home_state = rule
                .home_state
                .clone()
                .ok_or_else(|| ApiError::Internal("Location rule without home state".into()))?;
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&["user_id", "txn_id", "home_state", "window_end"]),
                slots: json!({
                    "home_state": home_state,
                    "geo_scope": intent.geo_scope,
                }),
            })
        }

        RuleKind::MerchantPattern => {
            let merchant = intent
                .merchant
                .as_deref()
                .ok_or_else(|| ApiError::Internal("Merchant rule without merchant".into()))?;
            let sql = "SELECT (LOWER(t.merchant_name) LIKE :merchant_pattern) AS triggered, \
                 t.amount_cents::float8 / 100.0 AS observed, \
                 NULL::float8 AS baseline, \
                 jsonb_build_object('merchant', t.merchant_name) AS detail \
                 FROM transactions t \
                 WHERE t.user_id = :user_id AND t.id = :txn_id \
                 AND t.occurred_at <= :window_end"
                .to_string();
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&["user_id", "txn_id", "merchant_pattern", "window_end"]),
                slots: json!({
                    "merchant_pattern": format!("%{}%", merchant.to_lowercase()),
                }),
            })
        }

        RuleKind::Frequency => {
            let count = intent
                .frequency_count
                .ok_or_else(|| ApiError::Internal("Frequency rule without count".into()))?;
            let window_days = intent.window_days.unwrap_or(1);
            let scope = match (&intent.category, &intent.merchant) {
                (Some(_), _) => "AND LOWER(t.merchant_category) = :category ",
                (None, Some(_)) => "AND LOWER(t.merchant_name) LIKE :merchant_pattern ",
                (None, None) => "",
            };
            let sql = format!(
                "WITH current_txn AS ( \
                 SELECT id, occurred_at \
                 FROM transactions \
                 WHERE user_id = :user_id AND id = :txn_id \
                 ), recent AS ( \
                 SELECT COUNT(t.id) AS txn_count \
                 FROM transactions t, current_txn ct \
                 WHERE t.user_id = :user_id \
                 AND t.occurred_at >= :window_start \
                 AND t.occurred_at <= ct.occurred_at \
                 {scope}) \
                 SELECT (r.txn_count >= :frequency_count) AS triggered, \
                 r.txn_count::float8 AS observed, \
                 NULL::float8 AS baseline, \
                 jsonb_build_object('window_days', :window_days) AS detail \
                 FROM recent r",
                scope = scope
            );

            let mut params = vec![
                "user_id",
                "txn_id",
                "window_start",
                "frequency_count",
                "window_days",
            ];
            let mut slots = json!({
                "frequency_count": count,
                "window_days": window_days,
            });
            if let Some(category) = &intent.category {
                params.push("category");
                slots["category"] = json!(category.to_lowercase());
            } else if let Some(merchant) = &intent.merchant {
                params.push("merchant_pattern");
                slots["merchant_pattern"] = json!(format!("%{}%", merchant.to_lowercase()));
            }
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&params),
                slots,
            })
        }

        RuleKind::RecurringDrift => {
            let drift_pct = intent.threshold_pct.unwrap_or(20.0);
            let sql = "SELECT (:expected_cents > 0 AND \
                 ABS(t.amount_cents - :expected_cents) > :expected_cents * :drift_factor) \
                 AS triggered, \
                 t.amount_cents::float8 / 100.0 AS observed, \
                 :expected_cents::float8 / 100.0 AS baseline, \
                 jsonb_build_object('merchant', t.merchant_name) AS detail \
                 FROM transactions t \
                 WHERE t.user_id = :user_id AND t.id = :txn_id \
                 AND t.occurred_at <= :window_end"
                .to_string();
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&[
                    "user_id",
                    "txn_id",
                    "expected_cents",
                    "drift_factor",
                    "window_end",
                ]),
                slots: json!({
                    "drift_factor": drift_pct / 100.0,
                    "drift_pct": drift_pct,
                    "merchant": intent.merchant,
                    "category": intent.category,
                    "recurring_interval_days": intent.recurring_interval_days.unwrap_or(30),
                }),
            })
        }

        RuleKind::CategoryRatio => {
            let category = intent
                .category
                .as_deref()
                .ok_or_else(|| ApiError::Internal("Ratio rule without category".into()))?;
            let pct = intent
                .threshold_pct
                .ok_or_else(|| ApiError::Internal("Ratio rule without percent".into()))?;
            let window_days = intent.window_days.unwrap_or(30);
            // ratio rewritten as multiplication so no division by a column
            let sql = "WITH current_txn AS ( \
                 SELECT id, occurred_at \
                 FROM transactions \
                 WHERE user_id = :user_id AND id = :txn_id \
                 ), totals AS ( \
                 SELECT COALESCE(SUM(t.amount_cents), 0.0) AS total_cents \
                 FROM transactions t, current_txn ct \
                 WHERE t.user_id = :user_id \
                 AND t.occurred_at >= :window_start \
                 AND t.occurred_at <= ct.occurred_at \
                 ), category_spend AS ( \
                 SELECT COALESCE(SUM(t.amount_cents), 0.0) AS category_cents \
                 FROM transactions t, current_txn ct \
                 WHERE t.user_id = :user_id \
                 AND LOWER(t.merchant_category) = :category \
                 AND t.occurred_at >= :window_start \
                 AND t.occurred_at <= ct.occurred_at \
                 ) \
                 SELECT (tt.total_cents > 0.0 AND \
                 cs.category_cents > tt.total_cents * :ratio) AS triggered, \
                 cs.category_cents::float8 / 100.0 AS observed, \
                 tt.total_cents::float8 / 100.0 AS baseline, \
                 NULL::jsonb AS detail \
                 FROM totals tt, category_spend cs"
                .to_string();
            Ok(SynthesizedSql {
                sql,
                declared_params: declared(&["user_id", "txn_id", "category", "window_start", "ratio"]),
                slots: json!({
                    "category": category.to_lowercase(),
                    "ratio": pct / 100.0,
                    "window_days": window_days,
                }),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::grammar;
    use crate::compiler::intent::RuleIntent;
    use cardwatch_primitives::models::NotificationChannel;

    fn grounded(intent: RuleIntent) -> GroundedRule {
        GroundedRule {
            intent,
            severity: cardwatch_primitives::models::Severity::Medium,
            channels: vec![NotificationChannel::Email],
            home_state: Some("CA".to_string()),
            place: None,
            name: None,
        }
    }

    fn intent(kind: RuleKind) -> RuleIntent {
        RuleIntent {
            kind,
            operator: Some(Operator::Gt),
            amount: Some(500.0),
            threshold_pct: Some(40.0),
            baseline: Some(BaselineKind::Avg),
            window_days: Some(30),
            category: Some("dining".to_string()),
            merchant: Some("Netflix".to_string()),
            geo_scope: Some("home_state".to_string()),
            frequency_count: Some(5),
            recurring_interval_days: Some(30),
            channels: vec![NotificationChannel::Email],
            severity: None,
            name: None,
            confidence: 0.9,
        }
    }

    #[test]
    fn every_kind_synthesizes_grammar_clean_sql() {
        for kind in [
            RuleKind::Threshold,
            RuleKind::PctDeltaVsBaseline,
            RuleKind::Location,
            RuleKind::MerchantPattern,
            RuleKind::Frequency,
            RuleKind::RecurringDrift,
            RuleKind::CategoryRatio,
        ] {
            let out = synthesize(&grounded(intent(kind))).unwrap();
            let result = grammar::validate(&out.sql, &out.declared_params);
            assert_eq!(result, Ok(()), "kind {:?} produced invalid SQL", kind);
        }
    }

    #[test]
    fn threshold_slots_hold_cents() {
        let out = synthesize(&grounded(intent(RuleKind::Threshold))).unwrap();
        assert_eq!(out.slots["threshold_cents"], 50_000);
        assert!(out.sql.contains("t.amount_cents > :threshold_cents"));
    }

    #[test]
    fn pct_delta_uses_percentile_for_median() {
        let mut i = intent(RuleKind::PctDeltaVsBaseline);
        i.baseline = Some(BaselineKind::Median);
        let out = synthesize(&grounded(i)).unwrap();
        assert!(out.sql.contains("PERCENTILE_CONT"));
        assert_eq!(out.slots["factor"], 1.4);
    }

    #[test]
    fn place_scoped_location_matches_the_city() {
        let mut g = grounded(intent(RuleKind::Location));
        g.place = Some(("las vegas, nv".to_string(), 36.1699, -115.1398));
        let out = synthesize(&g).unwrap();
        assert!(out.sql.contains(":place_name"));
        assert_eq!(out.slots["place_name"], "las vegas, nv");
        assert_eq!(grammar::validate(&out.sql, &out.declared_params), Ok(()));
    }

    #[test]
    fn ratio_avoids_division() {
        let out = synthesize(&grounded(intent(RuleKind::CategoryRatio))).unwrap();
        assert!(!out.sql.contains('/') || out.sql.contains("/ 100.0"));
        assert!(out.sql.contains("tt.total_cents * :ratio"));
    }
}
