use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use cardwatch_core::repositories::NotificationRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{NotificationOut, NotificationStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::acting_user;

/// READ is a UI-side terminal; only this endpoint ever sets it, and only
/// from SENT.
#[utoipa::path(
    post,
    path = "/api/notifications/{notification_id}/read",
    params(("notification_id" = Uuid, Path, description = "Notification identifier")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationOut),
        (status = 404, description = "No such notification for this user"),
        (status = 500, description = "Notification is not in a readable state"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Notifications"
)]
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationOut>, ApiError> {
    let user_id = acting_user(&headers)?;

    let mut conn = state.db.get()?;
    let notification = NotificationRepository::find_by_id(&mut conn, notification_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Notification {}", notification_id)))?;
    if notification.user_id != user_id {
        return Err(ApiError::NotFound(format!(
            "Notification {}",
            notification_id
        )));
    }

    let updated = NotificationRepository::advance_status(
        &mut conn,
        notification_id,
        NotificationStatus::Read,
        None,
    )?;

    Ok(Json(NotificationOut::from(&updated)))
}
