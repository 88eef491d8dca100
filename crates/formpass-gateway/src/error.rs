// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway errors and their HTTP rendering.
//!
//! Bodies are always empty; only the status reaches the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use formpass_protocol::ClientError;
use thiserror::Error;
use tracing::{error, info};

use crate::backend::BackendError;
use crate::session::SessionError;

/// Request failure, rendered as a bare status code.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Body could not be read as a passage.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Body names a different form than the path.
    #[error("form id mismatch: path {path}, body {body}")]
    FormIdMismatch {
        /// Id from the URL.
        path: i64,
        /// Id from the body.
        body: i64,
    },

    /// Session lookup failed.
    #[error("session lookup failed: {0}")]
    Session(#[from] SessionError),

    /// Core call failed or returned an unrecognised code.
    #[error("passage backend failed: {0}")]
    Backend(#[from] BackendError),
}

impl GatewayError {
    /// Status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MalformedPayload(_) | GatewayError::FormIdMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Backend(BackendError::Client(ClientError::RequestTooLarge(_))) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Session(_) | GatewayError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            info!(error = %self, "Request rejected");
        }

        status.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::MalformedPayload("eof".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::FormIdMismatch { path: 1, body: 2 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Backend(BackendError::Client(ClientError::RequestTooLarge(2 << 20)))
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Backend(BackendError::UnexpectedCode(418)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Session(SessionError::Store("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
