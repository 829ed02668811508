use axum::Router;
use axum_prometheus::{metrics_exporter_prometheus::PrometheusHandle, PrometheusMetricLayer};
use cardwatch_core::app_state::AppState;
use eyre::Report;
use http::HeaderValue;
use std::env;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

/// CORS is only for the alert-authoring UI; the transaction ingestion
/// endpoint is called service-to-service and never needs it. Origins come
/// from `CORS_ORIGINS` as a comma-separated list.
pub fn build_cors() -> Result<CorsLayer, Report> {
    let origins = env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".into());

    let allowed_origins = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| eyre::eyre!("CORS_ORIGINS entry '{origin}' is not a valid origin: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(?allowed_origins, "CORS configured for the authoring UI");

    Ok(CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(allowed_origins))
}

pub fn load_env() {
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "Environment loaded from .env"),
        Err(_) => debug!("No .env file, relying on process environment"),
    }
}

pub fn build_router(
    state: Arc<AppState>,
    metric_layer: PrometheusMetricLayer<'static>,
    metric_handle: PrometheusHandle,
) -> Result<Router, Report> {
    let cors = build_cors()?;

    Ok(cardwatch_api::app::create_router(state, metric_layer, metric_handle).layer(cors))
}
