// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protobuf messages of the passage protocol (package `formpass.passage`).
//!
//! Kept in sync by hand with `proto/passage.proto`, so the crate builds
//! without `protoc`.

/// One submitted answer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PassageAnswer {
    #[prost(int64, tag = "1")]
    pub question_id: i64,
    #[prost(string, tag = "2")]
    pub text: ::prost::alloc::string::String,
}

/// A filled-in form with the gateway-resolved caller.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitPassageRequest {
    #[prost(int64, tag = "1")]
    pub form_id: i64,
    /// 0 when the caller is not signed in.
    #[prost(int64, tag = "2")]
    pub user_id: i64,
    #[prost(message, repeated, tag = "3")]
    pub answers: ::prost::alloc::vec::Vec<PassageAnswer>,
}

/// HTTP-style status class of a submission.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResultCode {
    #[prost(int64, tag = "1")]
    pub code: i64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(bool, tag = "1")]
    pub healthy: bool,
    #[prost(string, tag = "2")]
    pub version: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub uptime_ms: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcError {
    #[prost(string, tag = "1")]
    pub code: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcRequest {
    #[prost(oneof = "rpc_request::Request", tags = "1, 2")]
    pub request: ::core::option::Option<rpc_request::Request>,
}

pub mod rpc_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        SubmitPassage(super::SubmitPassageRequest),
        #[prost(message, tag = "2")]
        HealthCheck(super::HealthCheckRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcResponse {
    #[prost(oneof = "rpc_response::Response", tags = "1, 2, 3")]
    pub response: ::core::option::Option<rpc_response::Response>,
}

pub mod rpc_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        SubmitPassage(super::ResultCode),
        #[prost(message, tag = "2")]
        HealthCheck(super::HealthCheckResponse),
        #[prost(message, tag = "3")]
        Error(super::RpcError),
    }
}
