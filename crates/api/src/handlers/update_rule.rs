use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use cardwatch_core::compiler::{CompileResult, RuleCompiler};
use cardwatch_core::repositories::RuleRepository;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{RuleOut, RuleUpdateRequest, RuleValidationResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::auth::acting_user;
use crate::handlers::validate_rule::outcome_response;

#[utoipa::path(
    patch,
    path = "/api/rules/{rule_id}",
    params(("rule_id" = Uuid, Path, description = "Rule identifier")),
    request_body = RuleUpdateRequest,
    responses(
        (status = 200, description = "Updated rule or compile feedback", body = RuleValidationResponse),
        (status = 404, description = "No such rule for this user"),
        (status = 401, description = "Missing identity header")
    ),
    tag = "Rules"
)]
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(rule_id): Path<Uuid>,
    Json(req): Json<RuleUpdateRequest>,
) -> Result<Json<RuleValidationResponse>, ApiError> {
    req.validate().map_err(|e| {
        error!("Validation error: {}", e);
        ApiError::Validation(e)
    })?;
    let user_id = acting_user(&headers)?;

    {
        let mut conn = state.db.get()?;
        RuleRepository::find_for_user(&mut conn, rule_id, user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Rule {}", rule_id)))?;
    }

    // Text edits re-run the whole compile pipeline; the stored rule is only
    // replaced when the new text reaches Valid.
    if let Some(nl_text) = &req.nl_text {
        match RuleCompiler::compile_and_replace(&state, user_id, rule_id, nl_text).await? {
            CompileResult::Persisted(mut rule) => {
                let mut conn = state.db.get()?;
                if req.channels.is_some() || req.severity.is_some() {
                    rule = RuleRepository::update_channels_severity(
                        &mut conn,
                        rule_id,
                        req.channels.as_ref().map(|c| json!(c)),
                        req.severity,
                    )?;
                }
                if let Some(is_active) = req.is_active {
                    RuleRepository::set_active(&mut conn, rule_id, is_active)?;
                }
                return Ok(Json(RuleValidationResponse {
                    status: "valid".to_string(),
                    message: "Rule updated".to_string(),
                    rule: Some(RuleOut::from(&rule)),
                    sql_text: Some(rule.sql_text.clone()),
                    duplicate_of: None,
                    similarity: None,
                    hints: vec![],
                    questions: vec![],
                }));
            }
            CompileResult::NotPersisted(outcome) => {
                return Ok(Json(outcome_response(outcome)));
            }
        }
    }

    let mut conn = state.db.get()?;
    if req.channels.is_some() || req.severity.is_some() {
        RuleRepository::update_channels_severity(
            &mut conn,
            rule_id,
            req.channels.as_ref().map(|c| json!(c)),
            req.severity,
        )?;
    }
    if let Some(is_active) = req.is_active {
        RuleRepository::set_active(&mut conn, rule_id, is_active)?;
    }

    let rule = RuleRepository::find_by_id(&mut conn, rule_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Rule {}", rule_id)))?;

    Ok(Json(RuleValidationResponse {
        status: "valid".to_string(),
        message: "Rule updated".to_string(),
        rule: Some(RuleOut::from(&rule)),
        sql_text: None,
        duplicate_of: None,
        similarity: None,
        hints: vec![],
        questions: vec![],
    }))
}
