// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formpass Core - Form Passage Validation and Submission
//!
//! This crate accepts filled-in forms ("passages"), checks them against the
//! form's declared question schema and the per-user passage limit, and
//! persists the accepted ones atomically.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐
//! │   formpass-gateway    │  POST /api/v1/forms/{id}/pass
//! │  (session → user id)  │
//! └───────────────────────┘
//!           │
//!           │ Passage Protocol (QUIC, port 8101)
//!           ▼
//! ┌───────────────────────┐
//! │    formpass-core      │
//! │    (This Crate)       │
//! │  service → validator  │
//! └───────────────────────┘
//!           │
//!           ▼
//! ┌───────────────────────┐
//! │  PostgreSQL / SQLite  │
//! └───────────────────────┘
//! ```
//!
//! # Passage Protocol
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `SubmitPassage` | Validate and persist a passage; returns an HTTP-style status code |
//! | `HealthCheck` | Database health, version, uptime |
//!
//! ## Submission Outcomes
//!
//! | Outcome | Code | When |
//! |---------|------|------|
//! | `Accepted` | 204 | Validated and persisted |
//! | `BadInput` | 400 | Malformed envelope or schema violation |
//! | `QuotaExceeded` | 400 | User reached the form's passage limit |
//! | `Unauthorised` | 401 | Non-anonymous form, no caller identity |
//! | `NotFound` | 404 | Form does not exist |
//! | `Transient` | 500 | Storage failure or deadline elapsed |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `FORMPASS_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `FORMPASS_QUIC_PORT` | No | `8101` | Passage QUIC server port |
//! | `FORMPASS_REQUEST_TIMEOUT_MS` | No | `5000` | Deadline for one submission |
//! | `FORMPASS_DB_MAX_CONNECTIONS` | No | `10` | Connection pool size |

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types for Core operations with RPC error code mapping.
pub mod error;

/// Embedded database migrations.
pub mod migrations;

/// Passage protocol handlers (submission, health).
#[cfg(feature = "server")]
pub mod passage_handlers;

/// Submission orchestration producing a single outcome.
pub mod passage_service;

/// Persistence trait with PostgreSQL and SQLite backends.
pub mod persistence;

/// Form schema and submitted passage types.
pub mod schema;

/// QUIC server for the passage protocol.
#[cfg(feature = "server")]
pub mod server;

/// Pure validation of passages against their schema.
pub mod validator;
