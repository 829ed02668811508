use crate::models::entities::enum_types::{NotificationChannel, NotificationStatus, Severity};
use crate::models::entities::notification::AlertNotification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationOut {
    pub id: Uuid,
    pub rule_id: Uuid,
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

impl From<&AlertNotification> for NotificationOut {
    fn from(n: &AlertNotification) -> Self {
        Self {
            id: n.id,
            rule_id: n.rule_id,
            transaction_id: n.transaction_id,
            channel: n.channel,
            title: n.title.clone(),
            body: n.body.clone(),
            status: n.status,
            error: n.error.clone(),
            created_at: n.created_at,
            delivered_at: n.delivered_at,
            read_at: n.read_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NotificationListQuery {
    pub status: Option<NotificationStatus>,
}

/// Body POSTed to a user's webhook endpoint. The raw serialized bytes are
/// signed with HMAC-SHA256 and the hex digest travels in `X-Signature`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAlertPayload {
    pub notification_id: Uuid,
    pub rule_id: Uuid,
    pub user_id: Uuid,
    pub transaction: Value,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub issued_at: DateTime<Utc>,
}
