// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

/// formpass-gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// QUIC address of formpass-core
    pub core_addr: SocketAddr,
    /// TLS server name presented by formpass-core
    pub core_server_name: String,
    /// Session store URL
    pub redis_url: String,
    /// Accept any core certificate (development only)
    pub dangerous_skip_cert_verification: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `FORMPASS_GATEWAY_PORT`: HTTP port (default: 8080)
    /// - `FORMPASS_CORE_ADDR`: core QUIC address (default: 127.0.0.1:8101)
    /// - `FORMPASS_CORE_SERVER_NAME`: core TLS name (default: localhost)
    /// - `FORMPASS_REDIS_URL`: session store (default: redis://127.0.0.1:6379)
    /// - `FORMPASS_DANGEROUS_SKIP_CERT_VERIFICATION`: `true`/`1` to skip (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("FORMPASS_GATEWAY_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("FORMPASS_GATEWAY_PORT", "must be a valid port number")
            })?;

        let core_addr: SocketAddr = std::env::var("FORMPASS_CORE_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8101".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("FORMPASS_CORE_ADDR", "must be host:port"))?;

        let core_server_name = std::env::var("FORMPASS_CORE_SERVER_NAME")
            .unwrap_or_else(|_| "localhost".to_string());
        if core_server_name.is_empty() {
            return Err(ConfigError::Invalid(
                "FORMPASS_CORE_SERVER_NAME",
                "must not be empty",
            ));
        }

        let redis_url = std::env::var("FORMPASS_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let dangerous_skip_cert_verification =
            match std::env::var("FORMPASS_DANGEROUS_SKIP_CERT_VERIFICATION") {
                Err(_) => false,
                Ok(v) => match v.to_ascii_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" | "" => false,
                    _ => {
                        return Err(ConfigError::Invalid(
                            "FORMPASS_DANGEROUS_SKIP_CERT_VERIFICATION",
                            "must be true or false",
                        ));
                    }
                },
            };

        Ok(Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            core_addr,
            core_server_name,
            redis_url,
            dangerous_skip_cert_verification,
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
