use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use cardwatch_core::repositories::RuleRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::RuleHistoryEntry;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::acting_user;

#[utoipa::path(
    get,
    path = "/api/rules/{rule_id}/history",
    params(("rule_id" = Uuid, Path, description = "Rule identifier")),
    responses(
        (status = 200, description = "Prior versions of the rule, newest first"),
        (status = 404, description = "No such rule for this user"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn rule_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<Vec<RuleHistoryEntry>>, ApiError> {
    let user_id = acting_user(&headers)?;

    let mut conn = state.db.get()?;
    RuleRepository::find_for_user(&mut conn, rule_id, user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Rule {}", rule_id)))?;

    Ok(Json(RuleRepository::history(&mut conn, rule_id)?))
}
