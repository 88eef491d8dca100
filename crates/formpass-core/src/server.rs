// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! QUIC server for formpass-core.
//!
//! Accepts connections from the gateway and routes passage protocol messages.

pub mod passage_server;

pub use passage_server::{PassageServerState, run_passage_server, serve_passage_server};
