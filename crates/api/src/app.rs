use crate::config::swagger_config::ApiDoc;
use crate::handlers::{
    create_rule::create_rule, delete_rule::delete_rule, get_rule::get_rule,
    health::health_check, ingest_transaction::ingest_transaction,
    list_notifications::list_notifications, list_rules::list_rules,
    mark_notification_read::mark_notification_read, rule_history::rule_history,
    update_rule::update_rule, validate_rule::validate_rule,
};
use axum::routing::{get, post};
use axum::Router;
use axum_prometheus::{metrics_exporter_prometheus::PrometheusHandle, PrometheusMetricLayer};
use cardwatch_core::AppState;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn create_router(
    state: Arc<AppState>,
    metric_layer: PrometheusMetricLayer<'static>,
    metric_handle: PrometheusHandle,
) -> Router {
    // rate limiting configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .finish()
            .unwrap(),
    );

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/transactions", post(ingest_transaction))
        .route("/api/rules/validate", post(validate_rule))
        .route("/api/rules", post(create_rule).get(list_rules))
        .route(
            "/api/rules/{rule_id}",
            get(get_rule).patch(update_rule).delete(delete_rule),
        )
        .route("/api/rules/{rule_id}/history", get(rule_history))
        .route("/api/notifications", get(list_notifications))
        .route(
            "/api/notifications/{notification_id}/read",
            post(mark_notification_read),
        )
        .route("/api/health", get(health_check))
        .route(
            "/metrics",
            get(move || std::future::ready(metric_handle.render())),
        )
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1MB limit
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(metric_layer);

    // disable rate limiting in test environment to avoid "Unable To Extract Key!" errors
    if std::env::var("APP_ENV").unwrap_or_default() != "test" {
        router = router.layer(GovernorLayer::new(governor_conf));
    }

    router.with_state(state)
}
