use chrono::{DateTime, Utc};
use diesel::{Identifiable, Insertable, Queryable};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = crate::schema::rule_history)]
pub struct RuleHistoryEntry {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub nl_text: String,
    pub sql_text: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::rule_history)]
pub struct NewRuleHistoryEntry<'a> {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub nl_text: &'a str,
    pub sql_text: &'a str,
}
