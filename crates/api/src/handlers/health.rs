use axum::extract::State;
use axum::Json;
use cardwatch_core::AppState;
use serde_json::{json, Value};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up"),
        (status = 503, description = "Data store unreachable")
    ),
    tag = "Ops"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db_ok = state.db.get().is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "db": db_ok,
        "eval_queue_depth": state.eval_queue.len(),
        "dispatch_queue_depth": state.dispatch_queue.len(),
    }))
}
