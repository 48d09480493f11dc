//! Quiz Gateway
//!
//! Edge entry point for the quiz platform. Verifies identity-provider
//! tokens and forwards identity to internal services.

use quiz_gateway::config::Config;
use quiz_gateway::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quiz_gateway=debug,quiz_auth=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Quiz Gateway");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.auth.issuer(),
        "Configuration loaded successfully"
    );

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let addr: SocketAddr = config.socket_addr().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState::new(config));

    // Warm the key cache; a failure here only delays readiness
    match state.validator.key_cache().force_refresh().await {
        Ok(count) => info!(key_count = count, "Signing keys loaded"),
        Err(e) => warn!(error = %e, "Initial JWKS fetch failed, will retry on demand"),
    }

    let app = routes::build_routes(state, metrics_handle);

    info!("Quiz Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_seconds))
    .await?;

    info!("Quiz Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
