// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formpass Gateway binary.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    formpass_gateway::start_server().await
}
