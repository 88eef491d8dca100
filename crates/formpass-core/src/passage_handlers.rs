// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Passage protocol handlers for formpass-core.
//!
//! Translate wire messages to domain types and back. The `user_id` field is
//! trusted as-is: the gateway authenticates callers before forwarding.

use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use formpass_protocol::passage_proto::{
    HealthCheckRequest, HealthCheckResponse, ResultCode, SubmitPassageRequest,
};

use crate::error::CoreError;
use crate::passage_service::{Outcome, PassageService};
use crate::schema::{FormPassage, PassageAnswer, Submitter};

/// Shared state for passage handlers.
pub struct PassageHandlerState {
    /// Passage service.
    pub service: PassageService,
    /// Deadline applied to each submission.
    pub request_timeout: Duration,
    /// When the server started (for uptime calculation).
    pub start_time: Instant,
    /// Server version string.
    pub version: String,
}

impl PassageHandlerState {
    /// Create handler state with the given service and submission deadline.
    pub fn new(service: PassageService, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Get the server uptime in milliseconds.
    pub fn uptime_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

impl From<SubmitPassageRequest> for FormPassage {
    fn from(request: SubmitPassageRequest) -> Self {
        Self {
            form_id: request.form_id,
            answers: request
                .answers
                .into_iter()
                .map(|a| PassageAnswer::new(a.question_id, a.text))
                .collect(),
        }
    }
}

/// Handle a passage submission.
///
/// A submission that does not finish within the deadline is reported as
/// transient. Dropping the in-flight call rolls back an uncommitted write.
#[instrument(skip(state, request), fields(form_id = request.form_id))]
pub async fn handle_submit_passage(
    state: &PassageHandlerState,
    request: SubmitPassageRequest,
) -> ResultCode {
    let caller = Submitter::from_wire(request.user_id);
    let passage = FormPassage::from(request);

    let outcome = match tokio::time::timeout(
        state.request_timeout,
        state.service.submit(&passage, caller),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Passage submission timed out"
            );
            Outcome::Transient
        }
    };

    ResultCode {
        code: outcome.status_code(),
    }
}

/// Handle health check request.
#[instrument(skip(state, _request))]
pub async fn handle_health_check(
    state: &PassageHandlerState,
    _request: HealthCheckRequest,
) -> Result<HealthCheckResponse, CoreError> {
    debug!("Health check requested");

    let healthy = state.service.persistence().health_check_db().await?;

    Ok(HealthCheckResponse {
        healthy,
        version: state.version.clone(),
        uptime_ms: state.uptime_ms(),
    })
}
