use crate::models::entities::enum_types::{NotificationChannel, NotificationStatus};
use chrono::{DateTime, Utc};
use diesel::{Associations, Identifiable, Insertable, Queryable};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = crate::schema::alert_notifications)]
#[diesel(belongs_to(crate::models::entities::alert_rule::AlertRule, foreign_key = rule_id))]
pub struct AlertNotification {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub channel: NotificationChannel,
    pub title: String,
    pub body: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::alert_notifications)]
pub struct NewAlertNotification<'a> {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub channel: NotificationChannel,
    pub title: &'a str,
    pub body: &'a str,
    pub status: NotificationStatus,
}
