//! Prompt construction for the Parse step.
//!
//! The model is asked for a `RuleIntent` JSON object and nothing else. SQL
//! generation is deliberately out of the model's hands.

/// Builds the intent-extraction prompt. `known_categories` comes from the
/// synonym table so the model leans toward canonical names.
pub fn parse_intent_prompt(nl_text: &str, known_categories: &[String]) -> String {
    let categories = if known_categories.is_empty() {
        "dining, groceries, travel, electronics, gas, entertainment".to_string()
    } else {
        known_categories.join(", ")
    };

    format!(
        r#"You classify a credit-card alert request into a structured intent.

Respond with a single JSON object and no other text. Schema:
{{
  "kind": one of "THRESHOLD", "PCT_DELTA_VS_BASELINE", "LOCATION",
          "MERCHANT_PATTERN", "FREQUENCY", "RECURRING_DRIFT", "CATEGORY_RATIO",
  "operator": one of ">", "<", ">=", "<=", "==" (optional),
  "amount": number in major currency units (optional),
  "threshold_pct": number, percent over/under a baseline (optional),
  "baseline": one of "AVG", "MEDIAN", "LAST_N", "SAME_MERCHANT_LAST_N" (optional),
  "window_days": integer lookback window (optional),
  "category": spending category, prefer one of: {categories} (optional),
  "merchant": merchant name exactly as the user wrote it (optional),
  "geo_scope": "home_state" or a place name for location alerts (optional),
  "frequency_count": integer, for counting alerts (optional),
  "recurring_interval_days": integer, for recurring-charge alerts (optional),
  "channels": array of "email", "webhook", "sms" (default ["email"]),
  "severity": "LOW", "MEDIUM" or "HIGH" (optional),
  "name": short rule title (optional),
  "confidence": number in [0,1], your certainty about this parse
}}

Rules:
- Amounts compare a single transaction unless the text clearly sums spend.
- "average"/"usual"/"typical" means PCT_DELTA_VS_BASELINE with baseline AVG.
- Alerts about places, states or distance are LOCATION.
- If the request is not about card spending, answer exactly NOT_APPLICABLE.
- If required details are missing, keep confidence below 0.5.

Alert: "{nl_text}"
"#,
        categories = categories,
        nl_text = nl_text
    )
}

/// Fallback examples surfaced to the user when a parse comes back
/// unusable.
pub fn example_hints() -> Vec<String> {
    vec![
        "Alert me if any single transaction exceeds $500".to_string(),
        "Notify me if my dining spend exceeds the 30-day average by more than 40%".to_string(),
        "Alert if a transaction happens outside my home state".to_string(),
        "Warn me when a recurring charge at Netflix changes by more than 20%".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_alert_text_verbatim() {
        let prompt = parse_intent_prompt("spend over $20 at ACME", &[]);
        assert!(prompt.contains("Alert: \"spend over $20 at ACME\""));
        assert!(prompt.contains("NOT_APPLICABLE"));
    }

    #[test]
    fn prompt_lists_known_categories() {
        let prompt =
            parse_intent_prompt("anything", &["dining".to_string(), "fuel".to_string()]);
        assert!(prompt.contains("dining, fuel"));
    }
}
