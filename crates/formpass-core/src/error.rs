// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for formpass-core.
//!
//! Provides a unified error type for storage access that maps to RPC error responses.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised by the persistence layer.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Stored data does not describe a valid schema.
    InvalidSchema {
        /// The form ID.
        form_id: i64,
        /// What is wrong with it.
        reason: String,
    },

    /// Passage save failed.
    PassageSaveFailed {
        /// The form ID.
        form_id: i64,
        /// The reason for failure.
        reason: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Convert this error to an RpcError for protocol responses.
    #[cfg(feature = "server")]
    pub fn to_rpc_error(&self) -> formpass_protocol::passage_proto::RpcError {
        formpass_protocol::passage_proto::RpcError {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSchema { .. } => "INVALID_SCHEMA",
            Self::PassageSaveFailed { .. } => "PASSAGE_SAVE_FAILED",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    pub(crate) fn database(operation: &str, err: impl fmt::Display) -> Self {
        Self::DatabaseError {
            operation: operation.to_string(),
            details: err.to_string(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSchema { form_id, reason } => {
                write!(f, "Form {} has an invalid schema: {}", form_id, reason)
            }
            Self::PassageSaveFailed { form_id, reason } => {
                write!(f, "Failed to save passage for form {}: {}", form_id, reason)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::database("query", err)
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::database("migrate", err)
    }
}
