use crate::utility::shutdown::shutdown_signal;
use axum::Router;
use eyre::Report;
use std::net::SocketAddr;

/// Binds the API listener and serves until a shutdown signal arrives.
/// Ingestion stops accepting here first; the orchestrator drains its queues
/// afterwards, so the bind address going away never loses queued work.
pub async fn serve(router: Router) -> Result<(), Report> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8600".into());

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre::eyre!("Cannot bind Cardwatch to {host}:{port}: {e}"))?;

    tracing::info!(%addr, "Cardwatch API accepting transactions and rule authoring");
    tracing::info!("OpenAPI explorer at http://{}/swagger-ui/", addr);

    axum::serve(
        tokio::net::TcpListener::bind(&addr).await?,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("API listener closed, handing off to queue drain");
    Ok(())
}
