use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use cardwatch_core::repositories::RuleRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::RuleOut;
use std::sync::Arc;

use crate::auth::acting_user;

#[utoipa::path(
    get,
    path = "/api/rules",
    responses(
        (status = 200, description = "All rules owned by the acting user", body = [RuleOut]),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RuleOut>>, ApiError> {
    let user_id = acting_user(&headers)?;

    let mut conn = state.db.get()?;
    let rules = RuleRepository::list_for_user(&mut conn, user_id)?;

    Ok(Json(rules.iter().map(RuleOut::from).collect()))
}
