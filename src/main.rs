//! fleet-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use tracing_subscriber::EnvFilter;

use fleet_gateway::api;
use fleet_gateway::app_state::AppState;
use fleet_gateway::config::FleetConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = FleetConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        channel = %config.event_channel_name,
        min_role = %config.min_viewing_role,
        "starting fleet-gateway"
    );

    // Build application state
    let app_state = AppState::from_config(&config);
    let fleet = std::sync::Arc::clone(&app_state.fleet);

    // Build router
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop instance channels
    fleet.shutdown().await;
    tracing::info!("fleet-gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
