//! REST server startup and configuration

use anyhow::{Context, Result};
use axum::serve;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;
use crate::server::routing::create_router;
use crate::server::state::AppState;

/// Build the backends and serve until Ctrl-C
pub async fn start_server(settings: &Settings) -> Result<()> {
  let addr = settings.server.addr;
  tracing::info!(%addr, "starting tutor server");

  let state = AppState::from_settings(settings)?;
  let app = create_router(state)
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

  let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
  tracing::info!(%addr, "server listening");

  serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("Server error")?;

  tracing::info!("server shut down gracefully");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown signal received");
}
