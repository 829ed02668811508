use axum::extract::{Json, State};
use axum::http::StatusCode;
use cardwatch_core::orchestrator::Orchestrator;
use cardwatch_core::AppState;
use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{IngestTransactionRequest, IngestTransactionResponse};
use std::sync::Arc;
use tracing::error;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/api/transactions",
    request_body = IngestTransactionRequest,
    responses(
        (status = 202, description = "Transaction accepted, evaluation scheduled", body = IngestTransactionResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Unknown user or card"),
        (status = 429, description = "Evaluation queue full"),
        (status = 503, description = "Data store unavailable")
    ),
    tag = "Ingestion"
)]
pub async fn ingest_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestTransactionRequest>,
) -> Result<(StatusCode, Json<IngestTransactionResponse>), ApiError> {
    req.validate().map_err(|e| {
        error!("Validation error: {}", e);
        ApiError::Validation(e)
    })?;

    let response = Orchestrator::ingest(&state, req).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}
