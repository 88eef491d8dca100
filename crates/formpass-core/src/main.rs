// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formpass Core - passage validation and submission service.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info};

use formpass_core::config::{Config, DatabaseKind};
use formpass_core::migrations;
use formpass_core::passage_handlers::PassageHandlerState;
use formpass_core::passage_service::PassageService;
use formpass_core::persistence::{Persistence, PostgresPersistence, SqlitePersistence};
use formpass_core::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("formpass_core=info".parse()?),
        )
        .init();

    info!("Starting Formpass Core");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        passage_addr = %config.quic_addr,
        database = ?config.database_kind,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let persistence: Arc<dyn Persistence> = match config.database_kind {
        DatabaseKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&config.database_url)
                .await?;
            info!("Running database migrations...");
            migrations::run_postgres(&pool).await?;
            Arc::new(PostgresPersistence::new(pool))
        }
        DatabaseKind::Sqlite => {
            let options: SqliteConnectOptions = config.database_url.parse()?;
            let pool = SqlitePoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect_with(options.create_if_missing(true))
                .await?;
            info!("Running database migrations...");
            migrations::run_sqlite(&pool).await?;
            Arc::new(SqlitePersistence::new(pool))
        }
    };
    info!("Migrations completed");

    if !persistence.health_check_db().await? {
        anyhow::bail!("database health check failed");
    }
    info!("Database health check passed");

    let state = Arc::new(PassageHandlerState::new(
        PassageService::new(persistence),
        config.request_timeout,
    ));

    let passage_addr = config.quic_addr;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_passage_server(passage_addr, state).await {
            error!("Passage QUIC server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    server_handle.abort();
    info!("Shutdown complete");

    Ok(())
}
