// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formpass Protocol - QUIC + Protobuf communication layer
//!
//! This crate provides the wire protocol between the HTTP gateway and
//! formpass-core's passage endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    formpass-protocol                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RPC Layer: one Request/Response pair per stream            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: Protobuf (prost)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport: QUIC (quinn)                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Passage Protocol (`passage_proto`)
//!
//! - `SubmitPassage`: a filled-in form plus the gateway-resolved user id,
//!   answered with a [`passage_proto::ResultCode`] carrying an HTTP status class
//! - `HealthCheck`: database health, version and uptime of the core
//!
//! # Usage
//!
//! ```ignore
//! use formpass_protocol::{PassageClient, passage_proto};
//!
//! let client = PassageClient::localhost()?;
//!
//! let request = passage_proto::RpcRequest {
//!     request: Some(passage_proto::rpc_request::Request::SubmitPassage(
//!         passage_proto::SubmitPassageRequest {
//!             form_id: 7,
//!             user_id: 3,
//!             answers: vec![passage_proto::PassageAnswer {
//!                 question_id: 10,
//!                 text: "Yes".to_string(),
//!             }],
//!         },
//!     )),
//! };
//!
//! let response: passage_proto::RpcResponse = client.request(&request).await?;
//! ```

pub mod client;
pub mod frame;
pub mod passage_proto;
pub mod server;
mod transport;

pub use client::{ClientError, PassageClient, PassageClientConfig};
pub use frame::{Frame, FrameError, MessageType};
pub use server::{
    ConnectionHandler, PassageServer, PassageServerConfig, ServerError, StreamHandler,
};

/// `user_id` sent when the caller has no identity.
pub const ANONYMOUS_USER_ID: i64 = 0;
