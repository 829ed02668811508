// Library entry point for Cardwatch
// This exposes modules for testing while keeping main.rs as the binary entry point

mod observability;

pub mod utility;

pub use cardwatch_primitives::error::ApiError;

use crate::observability::metrics::setup_metrics;
use crate::utility::db_pool::create_db_pool;
use crate::utility::logging::setup_logging;
use crate::utility::server::serve;
use crate::utility::tasks::{build_router, load_env};
use cardwatch_core::app_state::AppState;
use cardwatch_core::orchestrator::Orchestrator;
use cardwatch_primitives::models::app_config::AppConfig;
use eyre::Report;
use std::time::Duration;
use tracing::info;

pub async fn run() -> Result<(), Report> {
    // 1. Initialize logging first (so we can log everything else)
    setup_logging();

    info!("Starting Cardwatch application...");

    // 2. Load environment variables
    load_env();

    // 3. Load configuration
    let config = AppConfig::from_env()?;
    let drain = Duration::from_secs(config.shutdown_drain_secs);

    // 4. Create database connection pool
    let pool = create_db_pool()?;

    // 5. Build application state
    let state = AppState::new(pool, config)?;

    // 6. Start evaluation and dispatch worker pools
    let orchestrator = Orchestrator::spawn(state.clone());

    // 7. Build Axum router with the metrics pair
    let (metric_layer, metric_handle) = setup_metrics();
    let app = build_router(state.clone(), metric_layer, metric_handle)?;

    // 8. Start HTTP server
    serve(app).await?;

    // 9. Drain background work before exit
    orchestrator.shutdown(&state, drain).await;

    info!("Cardwatch application shut down gracefully");
    Ok(())
}
