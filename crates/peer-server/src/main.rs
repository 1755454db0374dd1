//! Peer Server
//!
//! Stateful WebSocket signaling relay for browser WebRTC peers.
//!
//! # Endpoints
//!
//! One listener (default 0.0.0.0:9000) serves:
//! - `GET /ws` - WebSocket signaling endpoint
//! - `GET /health`, `GET /ready` - Kubernetes probes
//! - `GET /metrics` - Prometheus text format
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Decode the room secret and build the password hasher
//! 4. Spawn the signaling actor
//! 5. Bind the listener and serve until Ctrl+C or SIGTERM

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use common::secret::ExposeSecret;
use peer_server::actors::{SignalingActorHandle, SignalingSettings};
use peer_server::config::Config;
use peer_server::core::password::PasswordHasher;
use peer_server::observability::{health_router, init_metrics_recorder, HealthState};
use peer_server::transport::ws_router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Minimum decoded secret length for HMAC-SHA256 (32 bytes).
const MIN_SECRET_LENGTH: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peer_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Peer Server");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!(
        bind_address = %config.bind_address,
        room_id_bytes = config.room_id_bytes,
        room_max_clients = config.room_max_clients,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        anyhow::anyhow!(e)
    })?;

    let health_state = Arc::new(HealthState::new());

    // Decode the room secret from base64 config
    let room_secret = {
        use base64::Engine;
        let decoder = base64::engine::general_purpose::STANDARD;
        let secret_bytes = decoder
            .decode(config.room_secret.expose_secret())
            .context("PS_ROOM_SECRET is not valid base64")?;

        if secret_bytes.len() < MIN_SECRET_LENGTH {
            error!(
                length = secret_bytes.len(),
                min_length = MIN_SECRET_LENGTH,
                "PS_ROOM_SECRET is too short"
            );
            anyhow::bail!(
                "PS_ROOM_SECRET must decode to at least {MIN_SECRET_LENGTH} bytes, got {}",
                secret_bytes.len()
            );
        }
        secret_bytes
    };

    let handle = SignalingActorHandle::new(
        SignalingSettings {
            room_id_bytes: config.room_id_bytes,
            max_clients: config.room_max_clients,
        },
        PasswordHasher::new(room_secret),
    );
    info!("Signaling actor started");

    let shutdown_token = handle.child_token();

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let prometheus_handle = prometheus_handle.clone();
            async move { prometheus_handle.render() }
        }),
    );

    let app = ws_router(handle.clone())
        .merge(health_router(Arc::clone(&health_state)))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;

    // Bind before reporting ready to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener to {addr}"))?;
    info!(addr = %addr, "Listener bound successfully");

    health_state.set_ready();

    let server_shutdown_token = shutdown_token.child_token();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_shutdown_token.cancelled().await;
        info!("Server shutting down");
    });

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "Server failed");
        }
    });

    info!("Peer Server running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop traffic first, then stop the actor
    health_state.set_not_ready();
    handle.cancel();

    // Give in-flight sessions time to observe the cancellation
    tokio::time::sleep(Duration::from_secs(2)).await;
    server_task.abort();

    info!("Peer Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
