// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::{debug, instrument};

use formpass_protocol::ANONYMOUS_USER_ID;
use formpass_protocol::passage_proto::{PassageAnswer, SubmitPassageRequest};

use crate::backend::BackendError;
use crate::error::GatewayError;
use crate::session::session_id_from_headers;
use crate::state::AppState;

/// Body of `POST /api/v1/forms/{id}/pass`.
#[derive(Debug, Deserialize)]
pub struct PassageBody {
    /// Optional; must match the path id when present.
    #[serde(default)]
    pub form_id: Option<i64>,
    /// Answers in submission order.
    pub passage_answers: Vec<AnswerBody>,
}

/// One submitted answer.
#[derive(Debug, Deserialize)]
pub struct AnswerBody {
    /// Question being answered.
    pub question_id: i64,
    /// Option label or free text.
    pub text: String,
}

/// HTTP status for a core result code.
pub fn status_for_code(code: i64) -> Result<StatusCode, BackendError> {
    match code {
        204 => Ok(StatusCode::NO_CONTENT),
        400 => Ok(StatusCode::BAD_REQUEST),
        401 => Ok(StatusCode::UNAUTHORIZED),
        404 => Ok(StatusCode::NOT_FOUND),
        500 => Ok(StatusCode::INTERNAL_SERVER_ERROR),
        other => Err(BackendError::UnexpectedCode(other)),
    }
}

/// Submit one passage on behalf of the session's user.
#[instrument(skip_all)]
pub async fn pass_handler(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    payload: Result<Json<PassageBody>, JsonRejection>,
) -> Result<StatusCode, GatewayError> {
    let Path(form_id) = path.map_err(|e| GatewayError::MalformedPayload(e.body_text()))?;
    let Json(body) = payload.map_err(|e| GatewayError::MalformedPayload(e.body_text()))?;

    if let Some(body_form_id) = body.form_id.filter(|id| *id != form_id) {
        return Err(GatewayError::FormIdMismatch {
            path: form_id,
            body: body_form_id,
        });
    }

    let user_id = match session_id_from_headers(&headers) {
        Some(session_id) => state
            .sessions
            .resolve(&session_id)
            .await?
            .unwrap_or(ANONYMOUS_USER_ID),
        None => ANONYMOUS_USER_ID,
    };
    debug!(form_id, user_id, answers = body.passage_answers.len(), "Forwarding passage");

    let request = SubmitPassageRequest {
        form_id,
        user_id,
        answers: body
            .passage_answers
            .into_iter()
            .map(|a| PassageAnswer {
                question_id: a.question_id,
                text: a.text,
            })
            .collect(),
    };

    let code = state.backend.submit_passage(request).await?;
    status_for_code(code).map_err(GatewayError::from)
}

/// Liveness probe.
pub async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}
