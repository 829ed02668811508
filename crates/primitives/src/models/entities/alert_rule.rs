use crate::models::entities::enum_types::{NotificationChannel, RuleKind, Severity};
use chrono::{DateTime, Utc};
use diesel::{Associations, Identifiable, Insertable, Queryable};
use pgvector::Vector;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = crate::schema::alert_rules)]
#[diesel(belongs_to(crate::models::entities::user::User))]
pub struct AlertRule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub nl_text: String,
    pub kind: RuleKind,
    pub sql_text: String,
    pub sql_params: Value,
    pub severity: Severity,
    pub channels: Value,
    pub is_active: bool,
    pub validated_sql: bool,
    pub nl_embedding: Vector,
    pub consecutive_failures: i32,
    pub trigger_count: i64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// Channels are stored as a jsonb array; anything unreadable is dropped
    /// rather than failing the whole rule.
    pub fn channel_list(&self) -> Vec<NotificationChannel> {
        self.channels
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn param_value(&self, key: &str) -> Option<&Value> {
        self.sql_params.get(key)
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::alert_rules)]
pub struct NewAlertRule<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<&'a str>,
    pub nl_text: &'a str,
    pub kind: RuleKind,
    pub sql_text: &'a str,
    pub sql_params: Value,
    pub severity: Severity,
    pub channels: Value,
    pub is_active: bool,
    pub validated_sql: bool,
    pub nl_embedding: Vector,
}
