//! Notification delivery over the per-channel adapters.
//!
//! At-most-once per (rule, transaction, channel) is inherited from the
//! unique index; the dispatcher only ever mutates the one row it was handed.
//! Transient transport failures retry with exponential backoff and jitter,
//! bounded by `dispatch.retries`; permanent rejections go straight to
//! FAILED.

use crate::app_state::AppState;
use crate::clients::retry::{with_backoff, Attempt, RetryPolicy};
use crate::clients::SendError;
use crate::repositories::{
    NotificationRepository, RuleRepository, TransactionRepository, UserRepository,
};
use cardwatch_primitives::models::{
    AlertNotification, NotificationChannel, NotificationStatus, Severity, User,
    WebhookAlertPayload,
};
use cardwatch_primitives::ApiError;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Dispatcher;

impl Dispatcher {
    pub async fn dispatch(state: &AppState, notification_id: Uuid) -> Result<(), ApiError> {
        let (notification, user, severity) = {
            let mut conn = state.db.get()?;
            let notification = NotificationRepository::find_by_id(&mut conn, notification_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Notification {}", notification_id))
                })?;

            if notification.status != NotificationStatus::Queued {
                info!(
                    notification_id = %notification_id,
                    status = %notification.status,
                    "Notification already handled, nothing to dispatch"
                );
                return Ok(());
            }

            let user = UserRepository::find_by_id(&mut conn, notification.user_id)?
                .ok_or_else(|| ApiError::NotFound(format!("User {}", notification.user_id)))?;
            let severity = RuleRepository::find_by_id(&mut conn, notification.rule_id)?
                .map(|rule| rule.severity)
                .unwrap_or(Severity::Medium);
            (notification, user, severity)
        };

        let policy = RetryPolicy::new(
            state.config.dispatch.retries,
            state.config.dispatch.backoff_base_ms,
        );

        let delivery = match notification.channel {
            NotificationChannel::Email => {
                Self::deliver_email(state, &policy, &notification, &user).await
            }
            NotificationChannel::Webhook => {
                Self::deliver_webhook(state, &policy, &notification, &user, severity).await
            }
            NotificationChannel::Sms => {
                Err(SendError::Permanent("sms channel not yet supported".into()))
            }
        };

        let mut conn = state.db.get()?;
        match delivery {
            Ok(()) => {
                NotificationRepository::advance_status(
                    &mut conn,
                    notification.id,
                    NotificationStatus::Sent,
                    None,
                )?;
                info!(notification_id = %notification.id, channel = %notification.channel,
                      "Notification delivered");
            }
            Err(e) => {
                NotificationRepository::advance_status(
                    &mut conn,
                    notification.id,
                    NotificationStatus::Failed,
                    Some(&e.to_string()),
                )?;
                warn!(notification_id = %notification.id, channel = %notification.channel,
                      error = %e, "Notification delivery failed");
            }
        }
        Ok(())
    }

    async fn deliver_email(
        state: &AppState,
        policy: &RetryPolicy,
        notification: &AlertNotification,
        user: &User,
    ) -> Result<(), SendError> {
        with_backoff(policy, |_| async move {
            match state
                .email
                .send_email(&user.email, &notification.title, &notification.body)
                .await
            {
                Ok(()) => Ok(()),
                Err(e @ SendError::Permanent(_)) => Err(Attempt::Permanent(e)),
                Err(e @ SendError::Transient(_)) => Err(Attempt::Transient(e)),
            }
        })
        .await
    }

    async fn deliver_webhook(
        state: &AppState,
        policy: &RetryPolicy,
        notification: &AlertNotification,
        user: &User,
        severity: Severity,
    ) -> Result<(), SendError> {
        let Some(url) = user.webhook_url.clone() else {
            return Err(SendError::Permanent(
                "user has no webhook endpoint configured".into(),
            ));
        };
        let Some(secret) = user.webhook_secret.clone() else {
            return Err(SendError::Permanent(
                "user has no webhook secret configured".into(),
            ));
        };

        let transaction = {
            let mut conn = state
                .db
                .get()
                .map_err(|e| SendError::Transient(format!("db pool: {}", e)))?;
            match notification.transaction_id {
                Some(txn_id) => TransactionRepository::find_by_id(&mut conn, txn_id)
                    .map_err(|e| SendError::Transient(e.to_string()))?
                    .map(|txn| serde_json::to_value(&txn).unwrap_or_default())
                    .unwrap_or(serde_json::Value::Null),
                None => serde_json::Value::Null,
            }
        };

        let payload = WebhookAlertPayload {
            notification_id: notification.id,
            rule_id: notification.rule_id,
            user_id: notification.user_id,
            transaction,
            severity,
            title: notification.title.clone(),
            body: notification.body.clone(),
            issued_at: Utc::now(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| SendError::Permanent(format!("payload encode: {}", e)))?;

        with_backoff(policy, |_| {
            let body = body.clone();
            let url = url.clone();
            let secret = secret.clone();
            async move {
                match state.webhook.post_signed(&url, &secret, body).await {
                    Ok(()) => Ok(()),
                    Err(e @ SendError::Permanent(_)) => Err(Attempt::Permanent(e)),
                    Err(e @ SendError::Transient(_)) => Err(Attempt::Transient(e)),
                }
            }
        })
        .await
    }
}
