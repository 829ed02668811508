use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use cardwatch_core::repositories::NotificationRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{NotificationListQuery, NotificationOut};
use std::sync::Arc;

use crate::auth::acting_user;

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(("status" = Option<String>, Query, description = "Filter by delivery status")),
    responses(
        (status = 200, description = "Notifications for the acting user, newest first", body = [NotificationOut]),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Vec<NotificationOut>>, ApiError> {
    let user_id = acting_user(&headers)?;

    let mut conn = state.db.get()?;
    let notifications =
        NotificationRepository::list_for_user(&mut conn, user_id, query.status)?;

    Ok(Json(notifications.iter().map(NotificationOut::from).collect()))
}
