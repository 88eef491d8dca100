// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Passage QUIC server for formpass-core.
//!
//! One stream carries one `RpcRequest` and gets back one `RpcResponse`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, instrument, warn};

use formpass_protocol::frame::Frame;
use formpass_protocol::passage_proto::{
    RpcError, RpcRequest, RpcResponse, rpc_request::Request, rpc_response::Response,
};
use formpass_protocol::server::{ConnectionHandler, PassageServer, StreamHandler};

use crate::passage_handlers::{PassageHandlerState, handle_health_check, handle_submit_passage};

/// Shared state for the passage server
pub type PassageServerState = PassageHandlerState;

/// Bind a self-signed server on `bind_addr` and serve until it closes
#[instrument(skip(state))]
pub async fn run_passage_server(
    bind_addr: SocketAddr,
    state: Arc<PassageServerState>,
) -> Result<()> {
    let server = PassageServer::localhost(bind_addr)?;
    serve_passage_server(server, state).await
}

/// Serve passage requests on an already bound server
pub async fn serve_passage_server(
    server: PassageServer,
    state: Arc<PassageServerState>,
) -> Result<()> {
    info!(addr = %server.local_addr()?, "Passage QUIC server starting");

    server
        .run(move |conn: ConnectionHandler| {
            let state = state.clone();
            async move {
                handle_connection(conn, state).await;
            }
        })
        .await?;

    Ok(())
}

#[instrument(skip(conn, state), fields(remote = %conn.remote_address()))]
async fn handle_connection(conn: ConnectionHandler, state: Arc<PassageServerState>) {
    debug!("New passage connection accepted");

    conn.run(move |stream: StreamHandler| {
        let state = state.clone();
        async move {
            if let Err(e) = handle_stream(stream, state).await {
                error!("Stream error: {}", e);
            }
        }
    })
    .await;

    debug!("Passage connection closed");
}

async fn handle_stream(mut stream: StreamHandler, state: Arc<PassageServerState>) -> Result<()> {
    let request_frame = stream.read_frame().await?;
    let rpc_request: RpcRequest = request_frame.decode()?;

    let response = match rpc_request.request {
        Some(Request::SubmitPassage(req)) => {
            Response::SubmitPassage(handle_submit_passage(&state, req).await)
        }
        Some(Request::HealthCheck(req)) => match handle_health_check(&state, req).await {
            Ok(resp) => Response::HealthCheck(resp),
            Err(e) => Response::Error(e.to_rpc_error()),
        },
        None => {
            warn!("Received empty RpcRequest");
            Response::Error(RpcError {
                code: "EMPTY_REQUEST".to_string(),
                message: "RpcRequest contained no request".to_string(),
            })
        }
    };

    let rpc_response = RpcResponse {
        response: Some(response),
    };
    stream.write_frame(&Frame::response(&rpc_response)?).await?;
    stream.finish()?;

    Ok(())
}
