use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use cardwatch_core::repositories::RuleRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::acting_user;

#[utoipa::path(
    delete,
    path = "/api/rules/{rule_id}",
    params(("rule_id" = Uuid, Path, description = "Rule identifier")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "No such rule for this user"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user_id = acting_user(&headers)?;

    let mut conn = state.db.get()?;
    if !RuleRepository::delete(&mut conn, rule_id, user_id)? {
        return Err(ApiError::NotFound(format!("Rule {}", rule_id)));
    }
    info!(%rule_id, %user_id, "Rule deleted");

    Ok(StatusCode::NO_CONTENT)
}
