// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formpass Gateway - HTTP front door for form passages.
//!
//! Resolves the `session_id` cookie to a user id, forwards the passage to
//! formpass-core over QUIC and returns the core's verdict as a bare status.
//!
//! | Route | Result |
//! |-------|--------|
//! | `POST /api/v1/forms/{id}/pass` | 204, 400, 401, 404 or 500, empty body |
//! | `GET /healthz` | 200 |
#![deny(missing_docs)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use formpass_protocol::PassageClientConfig;
use formpass_protocol::frame::MAX_FRAME_SIZE;

pub mod backend;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use backend::QuicPassageBackend;
use config::Config;
use routes::{healthz_handler, pass_handler};
use session::RedisSessionResolver;
use state::AppState;

/// Largest request body accepted, in bytes. Kept under the core's frame
/// limit so every accepted passage can be forwarded.
pub const MAX_PASSAGE_BODY: usize = MAX_FRAME_SIZE / 2;

/// Build the router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/forms/{id}/pass", post(pass_handler))
        .route("/healthz", get(healthz_handler))
        .layer(DefaultBodyLimit::max(MAX_PASSAGE_BODY))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load config, connect dependencies and serve until shutdown.
pub async fn start_server() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("formpass_gateway=info".parse()?),
        )
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    info!(
        http_addr = %config.http_addr,
        core_addr = %config.core_addr,
        "Configuration loaded"
    );

    info!("Connecting to session store...");
    let sessions = RedisSessionResolver::connect(&config.redis_url).await?;

    let backend = QuicPassageBackend::with_config(PassageClientConfig {
        server_addr: config.core_addr,
        server_name: config.core_server_name.clone(),
        dangerous_skip_cert_verification: config.dangerous_skip_cert_verification,
        ..Default::default()
    })?;

    let app = app(AppState::new(Arc::new(sessions), Arc::new(backend)));

    let listener = TcpListener::bind(config.http_addr).await?;
    info!("Gateway listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
