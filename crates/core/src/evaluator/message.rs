//! Notification copy, templated from the rule kind and the observed and
//! baseline values.

use cardwatch_primitives::models::{AlertRule, RuleKind, Transaction};

pub fn fmt_usd(dollars: f64) -> String {
    format!("${:.2}", dollars)
}

pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

pub fn render(
    rule: &AlertRule,
    txn: &Transaction,
    observed: f64,
    baseline: Option<f64>,
) -> AlertMessage {
    let merchant = &txn.merchant_name;
    match rule.kind {
        RuleKind::Threshold => {
            let title = format!("Card alert: {} at {}", fmt_usd(observed), merchant);
            let body = match baseline {
                Some(limit) => format!(
                    "A transaction of {} at {} crossed your {} limit.",
                    fmt_usd(observed),
                    merchant,
                    fmt_usd(limit)
                ),
                None => format!(
                    "A transaction of {} at {} crossed your limit.",
                    fmt_usd(observed),
                    merchant
                ),
            };
            AlertMessage { title, body }
        }

        RuleKind::PctDeltaVsBaseline => {
            let over_pct = baseline
                .filter(|b| *b > 0.0)
                .map(|b| ((observed - b) / b * 100.0).round())
                .unwrap_or(0.0);
            let title = format!(
                "{} spend {}% over your usual",
                txn.merchant_category, over_pct
            );
            let body = match baseline {
                Some(b) => format!(
                    "You spent {} at {}, {}% over your {} average for {}.",
                    fmt_usd(observed),
                    merchant,
                    over_pct,
                    fmt_usd(b),
                    txn.merchant_category
                ),
                None => format!("You spent {} at {}.", fmt_usd(observed), merchant),
            };
            AlertMessage { title, body }
        }

        RuleKind::Location => {
            let place = txn
                .merchant_state
                .as_deref()
                .or(txn.merchant_city.as_deref())
                .unwrap_or("an unusual location");
            AlertMessage {
                title: format!("Card used in {}", place),
                body: format!(
                    "A {} transaction at {} happened in {}, outside your usual area.",
                    fmt_usd(txn.amount_dollars()),
                    merchant,
                    place
                ),
            }
        }

        RuleKind::MerchantPattern => AlertMessage {
            title: format!("Card used at {}", merchant),
            body: format!(
                "A transaction of {} at {} matched your merchant alert.",
                fmt_usd(observed),
                merchant
            ),
        },

        RuleKind::Frequency => AlertMessage {
            title: format!("{} transactions in your alert window", observed as i64),
            body: format!(
                "There have been {} transactions recently, at or above your configured count.",
                observed as i64
            ),
        },

        RuleKind::RecurringDrift => {
            let body = match baseline {
                Some(expected) => format!(
                    "The recurring charge at {} came in at {}, but it is usually {}.",
                    merchant,
                    fmt_usd(observed),
                    fmt_usd(expected)
                ),
                None => format!(
                    "The recurring charge at {} came in at {}.",
                    merchant,
                    fmt_usd(observed)
                ),
            };
            AlertMessage {
                title: format!("Recurring charge at {} changed", merchant),
                body,
            }
        }

        RuleKind::CategoryRatio => AlertMessage {
            title: format!("{} is dominating your spend", txn.merchant_category),
            body: match baseline {
                Some(total) if total > 0.0 => format!(
                    "{} of your recent {} total went to {}.",
                    format!("{:.0}%", observed / total * 100.0),
                    fmt_usd(total),
                    txn.merchant_category
                ),
                _ => format!(
                    "{} spend reached {} recently.",
                    txn.merchant_category,
                    fmt_usd(observed)
                ),
            },
        },
    }
}

/// Copy for the system alert sent when a rule is auto-deactivated after
/// repeated SQL failures.
pub fn render_deactivation(rule: &AlertRule) -> AlertMessage {
    AlertMessage {
        title: "One of your alert rules was paused".to_string(),
        body: format!(
            "The rule \"{}\" kept failing to evaluate and has been paused. \
             Edit it to re-enable monitoring.",
            rule.name.as_deref().unwrap_or(&rule.nl_text)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwatch_primitives::models::{CurrencyCode, Severity, TxnStatus};
    use chrono::Utc;
    use pgvector::Vector;
    use serde_json::json;
    use uuid::Uuid;

    fn rule(kind: RuleKind) -> AlertRule {
        AlertRule {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: Some("big spend".into()),
            nl_text: "alert me".into(),
            kind,
            sql_text: String::new(),
            sql_params: json!({}),
            severity: Severity::Medium,
            channels: json!(["email"]),
            is_active: true,
            validated_sql: true,
            nl_embedding: Vector::from(vec![0.0f32; 4]),
            consecutive_failures: 0,
            trigger_count: 0,
            last_triggered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn txn() -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            amount_cents: 54_700,
            currency: CurrencyCode::USD,
            merchant_name: "ACME".into(),
            merchant_category: "dining".into(),
            merchant_city: None,
            merchant_state: Some("NY".into()),
            merchant_country: None,
            merchant_latitude: None,
            merchant_longitude: None,
            occurred_at: Utc::now(),
            status: TxnStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn threshold_title_carries_the_amount() {
        let message = render(&rule(RuleKind::Threshold), &txn(), 547.0, Some(500.0));
        assert!(message.title.contains("$547"), "title: {}", message.title);
        assert!(message.body.contains("$500.00"));
    }

    #[test]
    fn pct_delta_body_encodes_percent_over() {
        // 98 vs 67 baseline = 46% over
        let message = render(&rule(RuleKind::PctDeltaVsBaseline), &txn(), 98.0, Some(67.0));
        assert!(message.body.contains("46%"), "body: {}", message.body);
        assert!(message.body.contains("$67.00"));
    }

    #[test]
    fn location_title_names_the_state() {
        let message = render(&rule(RuleKind::Location), &txn(), 547.0, None);
        assert!(message.title.contains("NY"));
    }

    #[test]
    fn deactivation_notice_names_the_rule() {
        let message = render_deactivation(&rule(RuleKind::Threshold));
        assert!(message.body.contains("big spend"));
    }
}
