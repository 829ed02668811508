//! In-process predicates for rules that never need SQL.
//!
//! Threshold, merchant-pattern and location rules are decidable from the
//! transaction and user rows alone; running them here keeps the hot path off
//! the database.

use crate::analyzer::{location_risk, LocationRisk};
use crate::compiler::intent::Operator;
use crate::fx::FxTable;
use cardwatch_primitives::models::{AlertRule, CurrencyCode, RuleKind, Transaction, User};
use serde_json::json;

/// Radius within which a transaction counts as happening "at" a watched
/// place.
const NEAR_PLACE_KM: f64 = 100.0;

#[derive(Debug)]
pub enum CheapVerdict {
    Triggered {
        observed: f64,
        baseline: Option<f64>,
        detail: serde_json::Value,
    },
    NotTriggered,
    /// The rule needs the SQL path after all.
    NotCheap,
    /// Needed an FX rate that the table does not have.
    FxMissing,
}

fn slots(rule: &AlertRule) -> serde_json::Value {
    rule.sql_params
        .get("slots")
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}

pub fn evaluate_cheap(
    rule: &AlertRule,
    txn: &Transaction,
    user: &User,
    fx: &FxTable,
    max_kmh: f64,
) -> CheapVerdict {
    let slots = slots(rule);
    match rule.kind {
        RuleKind::Threshold => {
            let Some(threshold_cents) = slots.get("threshold_cents").and_then(|v| v.as_i64())
            else {
                return CheapVerdict::NotCheap;
            };
            // Thresholds are authored in USD; foreign amounts convert
            // through the daily table first.
            let Some(amount_usd_cents) =
                fx.convert_cents(txn.amount_cents, txn.currency, CurrencyCode::USD)
            else {
                return CheapVerdict::FxMissing;
            };

            let operator: Operator = slots
                .get("operator")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or(Operator::Gt);
            let hit = match operator {
                Operator::Gt => amount_usd_cents > threshold_cents,
                Operator::Lt => amount_usd_cents < threshold_cents,
                Operator::Gte => amount_usd_cents >= threshold_cents,
                Operator::Lte => amount_usd_cents <= threshold_cents,
                Operator::Eq => amount_usd_cents == threshold_cents,
            };
            if hit {
                CheapVerdict::Triggered {
                    observed: amount_usd_cents as f64 / 100.0,
                    baseline: Some(threshold_cents as f64 / 100.0),
                    detail: json!({ "merchant": txn.merchant_name }),
                }
            } else {
                CheapVerdict::NotTriggered
            }
        }

        RuleKind::MerchantPattern => {
            let Some(pattern) = slots.get("merchant_pattern").and_then(|v| v.as_str()) else {
                return CheapVerdict::NotCheap;
            };
            let needle = pattern.trim_matches('%').to_lowercase();
            if txn.merchant_name.to_lowercase().contains(&needle) {
                CheapVerdict::Triggered {
                    observed: txn.amount_dollars(),
                    baseline: None,
                    detail: json!({ "merchant": txn.merchant_name }),
                }
            } else {
                CheapVerdict::NotTriggered
            }
        }

        RuleKind::Location => {
            // Named-place rules: trigger when the transaction happens at or
            // near the watched place.
            if let Some(place_name) = slots.get("place_name").and_then(|v| v.as_str()) {
                let near_place = match (
                    txn.coords(),
                    slots.get("place_lat").and_then(|v| v.as_f64()),
                    slots.get("place_lon").and_then(|v| v.as_f64()),
                ) {
                    (Some((lat, lon)), Some(place_lat), Some(place_lon)) => {
                        crate::analyzer::haversine_km(lat, lon, place_lat, place_lon)
                            <= NEAR_PLACE_KM
                    }
                    _ => false,
                };
                let place_city = place_name
                    .split(',')
                    .next()
                    .unwrap_or(place_name)
                    .trim()
                    .to_lowercase();
                let city_match = txn
                    .merchant_city
                    .as_deref()
                    .map(|city| {
                        let city = city.to_lowercase();
                        city.contains(&place_city) || place_city.contains(&city)
                    })
                    .unwrap_or(false);

                return if near_place || city_match {
                    CheapVerdict::Triggered {
                        observed: txn.amount_dollars(),
                        baseline: None,
                        detail: json!({
                            "place": place_name,
                            "merchant_city": txn.merchant_city,
                        }),
                    }
                } else {
                    CheapVerdict::NotTriggered
                };
            }

            let risk = location_risk(user, txn, max_kmh);
            let home_state = slots
                .get("home_state")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| user.home_state.clone());

            let out_of_home = match (txn.merchant_state.as_deref(), home_state.as_deref()) {
                (Some(merchant_state), Some(home)) => {
                    !merchant_state.eq_ignore_ascii_case(home)
                }
                // missing coordinates or states evaluate quietly to false
                _ => false,
            };

            if risk != LocationRisk::None || out_of_home {
                CheapVerdict::Triggered {
                    observed: txn.amount_dollars(),
                    baseline: None,
                    detail: json!({
                        "risk": risk,
                        "merchant_state": txn.merchant_state,
                        "home_state": home_state,
                    }),
                }
            } else {
                CheapVerdict::NotTriggered
            }
        }

        _ => CheapVerdict::NotCheap,
    }
}
