// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Database backend selected by the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// `postgres://` or `postgresql://`
    Postgres,
    /// `sqlite:`
    Sqlite,
}

impl DatabaseKind {
    /// Detect the backend from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

/// formpass-core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Backend derived from `database_url`
    pub database_kind: DatabaseKind,
    /// QUIC server address for passage submissions
    pub quic_addr: SocketAddr,
    /// Deadline for one submit call
    pub request_timeout: Duration,
    /// Connection pool size
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `FORMPASS_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `FORMPASS_QUIC_PORT`: QUIC server port (default: 8101)
    /// - `FORMPASS_REQUEST_TIMEOUT_MS`: submit deadline (default: 5000)
    /// - `FORMPASS_DB_MAX_CONNECTIONS`: pool size (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("FORMPASS_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("FORMPASS_DATABASE_URL"))?;

        let database_kind = DatabaseKind::from_url(&database_url).ok_or(ConfigError::Invalid(
            "FORMPASS_DATABASE_URL",
            "must start with postgres://, postgresql:// or sqlite:",
        ))?;

        let quic_port: u16 = std::env::var("FORMPASS_QUIC_PORT")
            .unwrap_or_else(|_| "8101".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("FORMPASS_QUIC_PORT", "must be a valid port number")
            })?;

        let request_timeout_ms: u64 = std::env::var("FORMPASS_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(ConfigError::Invalid(
                "FORMPASS_REQUEST_TIMEOUT_MS",
                "must be a positive number of milliseconds",
            ))?;

        let db_max_connections: u32 = std::env::var("FORMPASS_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "FORMPASS_DB_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        Ok(Self {
            database_url,
            database_kind,
            quic_addr: SocketAddr::from(([0, 0, 0, 0], quic_port)),
            request_timeout: Duration::from_millis(request_timeout_ms),
            db_max_connections,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
