// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared application state.

use std::sync::Arc;

use crate::backend::PassageBackend;
use crate::session::SessionResolver;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Session cookie lookup.
    pub sessions: Arc<dyn SessionResolver>,
    /// Passage forwarding.
    pub backend: Arc<dyn PassageBackend>,
}

impl AppState {
    /// Bundle a resolver and a backend.
    pub fn new(sessions: Arc<dyn SessionResolver>, backend: Arc<dyn PassageBackend>) -> Self {
        Self { sessions, backend }
    }
}
