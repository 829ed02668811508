use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{
    AlertNotification, NewAlertNotification, NotificationStatus,
};
use cardwatch_primitives::schema::alert_notifications;
use chrono::Utc;
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

pub struct NotificationRepository;

impl NotificationRepository {
    /// The unique index on (rule_id, transaction_id, channel) is the
    /// system's idempotency anchor: a replayed evaluation gets None back and
    /// knows the notification already exists.
    pub fn insert_unique(
        conn: &mut PgConnection,
        new_notification: NewAlertNotification,
    ) -> Result<Option<AlertNotification>, ApiError> {
        let inserted_id = diesel::insert_into(alert_notifications::table)
            .values(&new_notification)
            .on_conflict((
                alert_notifications::rule_id,
                alert_notifications::transaction_id,
                alert_notifications::channel,
            ))
            .do_nothing()
            .returning(alert_notifications::id)
            .get_result::<Uuid>(conn)
            .optional()?;

        match inserted_id {
            Some(id) => alert_notifications::table
                .find(id)
                .first::<AlertNotification>(conn)
                .map(Some)
                .map_err(ApiError::from),
            None => {
                debug!(
                    rule_id = %new_notification.rule_id,
                    channel = %new_notification.channel,
                    "Notification already exists for this (rule, txn, channel)"
                );
                Ok(None)
            }
        }
    }

    pub fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<AlertNotification>, ApiError> {
        alert_notifications::table
            .find(id)
            .first::<AlertNotification>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn list_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<AlertNotification>, ApiError> {
        let mut query = alert_notifications::table
            .filter(alert_notifications::user_id.eq(user_id))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(alert_notifications::status.eq(status));
        }
        query
            .order(alert_notifications::created_at.desc())
            .load::<AlertNotification>(conn)
            .map_err(ApiError::from)
    }

    /// Advances status within the monotone transition graph. Out-of-order
    /// requests are rejected so a late retry can never un-send a
    /// notification.
    pub fn advance_status(
        conn: &mut PgConnection,
        id: Uuid,
        to: NotificationStatus,
        error: Option<&str>,
    ) -> Result<AlertNotification, ApiError> {
        conn.transaction::<_, ApiError, _>(|conn| {
            let current = alert_notifications::table
                .find(id)
                .first::<AlertNotification>(conn)
                .map_err(ApiError::from)?;

            if !current.status.can_advance_to(to) {
                return Err(ApiError::Notification(format!(
                    "Illegal status transition {} -> {} for notification {}",
                    current.status, to, id
                )));
            }

            let delivered_at = match to {
                NotificationStatus::Sent => Some(Utc::now()),
                _ => current.delivered_at,
            };
            let read_at = match to {
                NotificationStatus::Read => Some(Utc::now()),
                _ => current.read_at,
            };

            diesel::update(alert_notifications::table.find(id))
                .set((
                    alert_notifications::status.eq(to),
                    alert_notifications::error.eq(error),
                    alert_notifications::delivered_at.eq(delivered_at),
                    alert_notifications::read_at.eq(read_at),
                ))
                .get_result::<AlertNotification>(conn)
                .map_err(ApiError::from)
        })
    }

    pub fn count_for_triple(
        conn: &mut PgConnection,
        rule_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<i64, ApiError> {
        alert_notifications::table
            .filter(alert_notifications::rule_id.eq(rule_id))
            .filter(alert_notifications::transaction_id.eq(transaction_id))
            .count()
            .get_result::<i64>(conn)
            .map_err(ApiError::from)
    }
}
