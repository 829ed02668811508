use axum::extract::{Json, State};
use axum::http::HeaderMap;
use cardwatch_core::compiler::{CompileOutcome, RuleCompiler};
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{RuleValidateRequest, RuleValidationResponse};
use std::sync::Arc;
use tracing::error;
use validator::Validate;

use crate::auth::acting_user;

/// Shared mapping from a compile outcome onto the flat response DTO.
pub fn outcome_response(outcome: CompileOutcome) -> RuleValidationResponse {
    match outcome {
        CompileOutcome::Valid(compiled) => RuleValidationResponse {
            status: "valid".to_string(),
            message: "Rule compiled and validated".to_string(),
            rule: None,
            sql_text: Some(compiled.sql_text),
            duplicate_of: None,
            similarity: None,
            hints: vec![],
            questions: vec![],
        },
        CompileOutcome::DuplicateOf { rule_id, similarity } => RuleValidationResponse {
            status: "duplicate".to_string(),
            message: "A very similar rule already exists".to_string(),
            rule: None,
            sql_text: None,
            duplicate_of: Some(rule_id),
            similarity: Some(similarity),
            hints: vec![],
            questions: vec![],
        },
        CompileOutcome::Invalid { reason, hints } => RuleValidationResponse {
            status: "invalid".to_string(),
            message: reason,
            rule: None,
            sql_text: None,
            duplicate_of: None,
            similarity: None,
            hints,
            questions: vec![],
        },
        CompileOutcome::Ambiguous { questions } => RuleValidationResponse {
            status: "ambiguous".to_string(),
            message: "The rule needs clarification".to_string(),
            rule: None,
            sql_text: None,
            duplicate_of: None,
            similarity: None,
            hints: vec![],
            questions,
        },
    }
}

#[utoipa::path(
    post,
    path = "/api/rules/validate",
    request_body = RuleValidateRequest,
    responses(
        (status = 200, description = "Compile outcome without persisting", body = RuleValidationResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn validate_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RuleValidateRequest>,
) -> Result<Json<RuleValidationResponse>, ApiError> {
    req.validate().map_err(|e| {
        error!("Validation error: {}", e);
        ApiError::Validation(e)
    })?;
    let user_id = acting_user(&headers)?;

    let outcome = RuleCompiler::compile(&state, user_id, &req.nl_text).await?;

    Ok(Json(outcome_response(outcome)))
}
