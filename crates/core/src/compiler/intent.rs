use cardwatch_primitives::models::{BaselineKind, NotificationChannel, RuleKind, Severity};
use serde::{Deserialize, Serialize};

/// Comparison operator a rule applies to its observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
}

impl Operator {
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Eq => "=",
        }
    }
}

/// Structured result of the Parse step. The LLM fills exactly this shape and
/// nothing else; SQL is synthesized from it deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleIntent {
    pub kind: RuleKind,
    #[serde(default)]
    pub operator: Option<Operator>,
    /// Major units (dollars for USD).
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub threshold_pct: Option<f64>,
    #[serde(default)]
    pub baseline: Option<BaselineKind>,
    #[serde(default)]
    pub window_days: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub geo_scope: Option<String>,
    #[serde(default)]
    pub frequency_count: Option<i64>,
    #[serde(default)]
    pub recurring_interval_days: Option<i64>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub name: Option<String>,
    /// Parser self-assessment in [0, 1]; below 0.5 the compile turns into a
    /// clarifying question instead of a rule.
    #[serde(default)]
    pub confidence: f64,
}

impl RuleIntent {
    pub fn amount_cents(&self) -> Option<i64> {
        self.amount.map(|a| (a * 100.0).round() as i64)
    }

    /// Fields a kind cannot do without. Checked after grounding so that
    /// category/merchant resolution gets a chance to fill gaps first.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.kind {
            RuleKind::Threshold => {
                if self.amount.is_none() {
                    missing.push("amount");
                }
            }
            RuleKind::PctDeltaVsBaseline => {
                if self.threshold_pct.is_none() {
                    missing.push("threshold_pct");
                }
                if self.category.is_none() && self.merchant.is_none() {
                    missing.push("category or merchant");
                }
            }
            RuleKind::Location => {
                if self.geo_scope.is_none() {
                    missing.push("geo_scope");
                }
            }
            RuleKind::MerchantPattern => {
                if self.merchant.is_none() {
                    missing.push("merchant");
                }
            }
            RuleKind::Frequency => {
                if self.frequency_count.is_none() {
                    missing.push("frequency_count");
                }
                if self.window_days.is_none() {
                    missing.push("window_days");
                }
            }
            RuleKind::RecurringDrift => {
                if self.merchant.is_none() && self.category.is_none() {
                    missing.push("merchant or category");
                }
            }
            RuleKind::CategoryRatio => {
                if self.category.is_none() {
                    missing.push("category");
                }
                if self.threshold_pct.is_none() {
                    missing.push("threshold_pct");
                }
            }
        }
        missing
    }
}
