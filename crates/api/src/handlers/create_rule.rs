use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use cardwatch_core::compiler::{CompileResult, RuleCompiler};
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{RuleCreateRequest, RuleOut, RuleValidationResponse};
use std::sync::Arc;
use tracing::error;
use validator::Validate;

use crate::auth::acting_user;
use crate::handlers::validate_rule::outcome_response;

#[utoipa::path(
    post,
    path = "/api/rules",
    request_body = RuleCreateRequest,
    responses(
        (status = 201, description = "Rule compiled and persisted", body = RuleValidationResponse),
        (status = 200, description = "Compile did not reach Valid; nothing persisted", body = RuleValidationResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RuleCreateRequest>,
) -> Result<(StatusCode, Json<RuleValidationResponse>), ApiError> {
    req.validate().map_err(|e| {
        error!("Validation error: {}", e);
        ApiError::Validation(e)
    })?;
    let user_id = acting_user(&headers)?;

    match RuleCompiler::compile_and_create(&state, user_id, &req.nl_text).await? {
        CompileResult::Persisted(rule) => {
            let response = RuleValidationResponse {
                status: "valid".to_string(),
                message: "Rule created".to_string(),
                rule: Some(RuleOut::from(&rule)),
                sql_text: Some(rule.sql_text.clone()),
                duplicate_of: None,
                similarity: None,
                hints: vec![],
                questions: vec![],
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        CompileResult::NotPersisted(outcome) => {
            Ok((StatusCode::OK, Json(outcome_response(outcome))))
        }
    }
}
