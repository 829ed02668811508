//! Binds a rule's declared placeholders for one transaction.
//!
//! Static values come from the rule's stored slots; per-evaluation values
//! (the anchor transaction, window bounds, analyzer baselines) are computed
//! here. Every declared name must resolve or the rule is skipped.

use crate::repositories::rule_sql::ParamValue;
use cardwatch_primitives::models::Transaction;
use cardwatch_primitives::ApiError;
use chrono::Duration;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub fn declared_params(sql_params: &Value) -> Vec<String> {
    sql_params
        .get("declared")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn slots(sql_params: &Value) -> Value {
    sql_params.get("slots").cloned().unwrap_or(Value::Null)
}

pub fn build_params(
    sql_params: &Value,
    user_id: Uuid,
    txn: &Transaction,
    extra: &HashMap<String, ParamValue>,
) -> Result<HashMap<String, ParamValue>, ApiError> {
    let declared = declared_params(sql_params);
    let slots = slots(sql_params);
    let window_days = slots
        .get("window_days")
        .and_then(|v| v.as_i64())
        .unwrap_or(30);

    let mut params = HashMap::new();
    for name in declared {
        if let Some(value) = extra.get(&name) {
            params.insert(name, value.clone());
            continue;
        }
        let value = match name.as_str() {
            "user_id" => ParamValue::Uuid(user_id),
            "txn_id" => ParamValue::Uuid(txn.id),
            "window_end" => ParamValue::Timestamp(txn.occurred_at),
            "window_start" => {
                ParamValue::Timestamp(txn.occurred_at - Duration::days(window_days))
            }
            other => match slots.get(other) {
                Some(Value::Number(n)) if n.is_i64() => {
                    ParamValue::Int(n.as_i64().unwrap_or_default())
                }
                Some(Value::Number(n)) => ParamValue::Float(n.as_f64().unwrap_or_default()),
                Some(Value::String(s)) => ParamValue::Text(s.clone()),
                _ => {
                    return Err(ApiError::RuleSql(format!(
                        "No value available for declared parameter :{}",
                        other
                    )))
                }
            },
        };
        params.insert(name, value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwatch_primitives::models::{CurrencyCode, TxnStatus};
    use chrono::Utc;
    use serde_json::json;

    fn txn() -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            amount_cents: 54_700,
            currency: CurrencyCode::USD,
            merchant_name: "ACME".into(),
            merchant_category: "shopping".into(),
            merchant_city: None,
            merchant_state: None,
            merchant_country: None,
            merchant_latitude: None,
            merchant_longitude: None,
            occurred_at: Utc::now(),
            status: TxnStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn builds_anchor_window_and_slot_values() {
        let sql_params = json!({
            "declared": ["user_id", "txn_id", "window_start", "factor", "category"],
            "slots": {"factor": 1.4, "category": "dining", "window_days": 30},
        });
        let txn = txn();
        let user_id = txn.user_id;
        let params = build_params(&sql_params, user_id, &txn, &HashMap::new()).unwrap();

        assert!(matches!(params["user_id"], ParamValue::Uuid(u) if u == user_id));
        assert!(matches!(params["txn_id"], ParamValue::Uuid(t) if t == txn.id));
        assert!(matches!(params["factor"], ParamValue::Float(f) if (f - 1.4).abs() < 1e-9));
        assert!(matches!(&params["category"], ParamValue::Text(c) if c == "dining"));
        match params["window_start"] {
            ParamValue::Timestamp(start) => {
                assert_eq!((txn.occurred_at - start).num_days(), 30);
            }
            _ => panic!("window_start should be a timestamp"),
        }
    }

    #[test]
    fn extra_values_override_slots() {
        let sql_params = json!({
            "declared": ["user_id", "txn_id", "expected_cents", "window_end"],
            "slots": {},
        });
        let txn = txn();
        let mut extra = HashMap::new();
        extra.insert("expected_cents".to_string(), ParamValue::Int(1_099));
        let params = build_params(&sql_params, txn.user_id, &txn, &extra).unwrap();
        assert!(matches!(params["expected_cents"], ParamValue::Int(1_099)));
    }

    #[test]
    fn unresolvable_parameter_is_an_error() {
        let sql_params = json!({
            "declared": ["user_id", "mystery"],
            "slots": {},
        });
        let txn = txn();
        let err = build_params(&sql_params, txn.user_id, &txn, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains(":mystery"));
    }
}
