use crate::models::entities::alert_rule::AlertRule;
use crate::models::entities::enum_types::{NotificationChannel, RuleKind, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RuleValidateRequest {
    #[validate(length(min = 3, max = 2000))]
    pub nl_text: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RuleCreateRequest {
    #[validate(length(min = 3, max = 2000))]
    pub nl_text: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RuleUpdateRequest {
    #[validate(length(min = 3, max = 2000))]
    pub nl_text: Option<String>,
    pub is_active: Option<bool>,
    pub channels: Option<Vec<NotificationChannel>>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RuleOut {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub nl_text: String,
    pub kind: RuleKind,
    pub sql_text: String,
    pub severity: Severity,
    pub channels: Vec<NotificationChannel>,
    pub is_active: bool,
    pub validated_sql: bool,
    pub trigger_count: i64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AlertRule> for RuleOut {
    fn from(rule: &AlertRule) -> Self {
        Self {
            id: rule.id,
            user_id: rule.user_id,
            name: rule.name.clone(),
            nl_text: rule.nl_text.clone(),
            kind: rule.kind,
            sql_text: rule.sql_text.clone(),
            severity: rule.severity,
            channels: rule.channel_list(),
            is_active: rule.is_active,
            validated_sql: rule.validated_sql,
            trigger_count: rule.trigger_count,
            last_triggered_at: rule.last_triggered_at,
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

/// Flat compile response shared by /rules/validate and /rules.
/// `status` is one of "valid", "duplicate", "invalid", "ambiguous".
#[derive(Debug, Serialize, ToSchema)]
pub struct RuleValidationResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
}
