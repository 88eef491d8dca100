// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session cookie resolution.
//!
//! Sessions live in Redis under `session:{session_id}` with the numeric user
//! id as the value. An absent or unusable entry means the caller has no
//! identity.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::COOKIE};
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Session store failure.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Could not reach or query the store.
    #[error("session store error: {0}")]
    Store(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        SessionError::Store(e.to_string())
    }
}

/// Maps a session id to a user id.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` when the session is unknown.
    async fn resolve(&self, session_id: &str) -> Result<Option<i64>, SessionError>;
}

/// Redis-backed resolver.
#[derive(Clone)]
pub struct RedisSessionResolver {
    connection: ConnectionManager,
}

impl RedisSessionResolver {
    /// Wrap an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Open a managed connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, SessionError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self::new(connection))
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }
}

#[async_trait]
impl SessionResolver for RedisSessionResolver {
    #[instrument(skip(self, session_id))]
    async fn resolve(&self, session_id: &str) -> Result<Option<i64>, SessionError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(Self::key(session_id)).await?;

        let Some(value) = value else {
            debug!("Session not found");
            return Ok(None);
        };

        match value.trim().parse::<i64>() {
            Ok(user_id) if user_id > 0 => Ok(Some(user_id)),
            _ => {
                warn!("Session entry does not hold a valid user id");
                Ok(None)
            }
        }
    }
}

/// Extract the `session_id` cookie value, if present and non-empty.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
