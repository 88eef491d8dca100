// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Forwarding passages to formpass-core.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{instrument, warn};

use formpass_protocol::passage_proto::{
    RpcRequest, RpcResponse, SubmitPassageRequest, rpc_request, rpc_response,
};
use formpass_protocol::{ClientError, PassageClient, PassageClientConfig};

/// Failure talking to the core.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport or framing failure.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The core replied with something other than a submit result.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The core returned a code with no HTTP counterpart.
    #[error("unexpected result code: {0}")]
    UnexpectedCode(i64),
}

/// Submits passages and returns the core's result code.
#[async_trait]
pub trait PassageBackend: Send + Sync {
    /// Forward one passage.
    async fn submit_passage(&self, request: SubmitPassageRequest) -> Result<i64, BackendError>;
}

/// Backend that talks to formpass-core over QUIC.
pub struct QuicPassageBackend {
    client: PassageClient,
}

impl QuicPassageBackend {
    /// Wrap an existing client.
    pub fn new(client: PassageClient) -> Self {
        Self { client }
    }

    /// Build a client from config.
    pub fn with_config(config: PassageClientConfig) -> Result<Self, BackendError> {
        Ok(Self::new(PassageClient::new(config)?))
    }

    /// Underlying client.
    pub fn client(&self) -> &PassageClient {
        &self.client
    }
}

#[async_trait]
impl PassageBackend for QuicPassageBackend {
    #[instrument(skip(self, request), fields(form_id = request.form_id))]
    async fn submit_passage(&self, request: SubmitPassageRequest) -> Result<i64, BackendError> {
        let rpc_request = RpcRequest {
            request: Some(rpc_request::Request::SubmitPassage(request)),
        };

        let response: RpcResponse = self.client.request(&rpc_request).await?;

        match response.response {
            Some(rpc_response::Response::SubmitPassage(result)) => Ok(result.code),
            Some(rpc_response::Response::Error(e)) => {
                warn!(code = %e.code, message = %e.message, "Core returned an error");
                Err(BackendError::UnexpectedResponse(e.code))
            }
            other => Err(BackendError::UnexpectedResponse(format!("{:?}", other))),
        }
    }
}
