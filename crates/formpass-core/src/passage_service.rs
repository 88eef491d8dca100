// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Passage submission orchestration.
//!
//! [`PassageService::submit`] runs, in order: envelope check, schema fetch,
//! identity resolution, quota check, validation, persistence. Each rejection
//! is logged with its diagnostic and collapsed into an [`Outcome`]; the
//! diagnostic itself never leaves the service.
//!
//! The quota is advisory. The count is read outside the write transaction,
//! so concurrent submissions by one user may exceed the cap by at most the
//! number of concurrent submitters minus one.

use std::sync::Arc;

use tracing::{Instrument, error, info, info_span};

use crate::error::CoreError;
use crate::persistence::Persistence;
use crate::schema::{FormPassage, Submitter};
use crate::validator;

/// Result of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Validated and persisted.
    Accepted {
        /// Generated passage id.
        passage_id: i64,
    },
    /// Malformed envelope or schema violation.
    BadInput,
    /// The referenced form does not exist.
    NotFound,
    /// The form needs an identity and none was given.
    Unauthorised,
    /// The caller already reached the form's passage cap.
    QuotaExceeded,
    /// Storage failed or the deadline elapsed; retryable.
    Transient,
}

impl Outcome {
    /// HTTP-style status class returned over the wire.
    pub fn status_code(self) -> i64 {
        match self {
            Self::Accepted { .. } => 204,
            Self::BadInput | Self::QuotaExceeded => 400,
            Self::Unauthorised => 401,
            Self::NotFound => 404,
            Self::Transient => 500,
        }
    }

    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::BadInput => "bad_input",
            Self::NotFound => "not_found",
            Self::Unauthorised => "unauthorised",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Transient => "transient",
        }
    }
}

/// Why an envelope is malformed.
fn envelope_problem(passage: &FormPassage) -> Option<String> {
    if passage.form_id <= 0 {
        return Some(format!("form_id must be positive, got {}", passage.form_id));
    }
    passage
        .answers
        .iter()
        .find(|a| a.question_id <= 0)
        .map(|a| format!("question_id must be positive, got {}", a.question_id))
}

/// Orchestrates validation and persistence of passages.
#[derive(Clone)]
pub struct PassageService {
    persistence: Arc<dyn Persistence>,
}

impl PassageService {
    /// Create a service over the given persistence backend.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Persistence backend.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// Validate and persist one passage.
    ///
    /// `caller` is the authenticated user id, if any. Cancelling the returned
    /// future before the write commits leaves nothing behind.
    pub async fn submit(&self, passage: &FormPassage, caller: Option<i64>) -> Outcome {
        let span = info_span!(
            "submit_passage",
            form_id = passage.form_id,
            user_id = caller,
            answers = passage.answers.len()
        );
        let outcome = self.submit_inner(passage, caller).instrument(span.clone()).await;
        span.in_scope(|| info!(outcome = outcome.as_str(), "Passage submission finished"));
        outcome
    }

    async fn submit_inner(&self, passage: &FormPassage, caller: Option<i64>) -> Outcome {
        if let Some(problem) = envelope_problem(passage) {
            info!(reason = %problem, "Rejecting malformed passage envelope");
            return Outcome::BadInput;
        }

        let form = match self.persistence.find_form(passage.form_id).await {
            Ok(Some(form)) => form,
            Ok(None) => {
                info!("Form not found");
                return Outcome::NotFound;
            }
            Err(e) => return transient("find_form", &e),
        };

        let submitter = if form.anonymous {
            Submitter::Anonymous
        } else {
            match caller {
                Some(user_id) => Submitter::User(user_id),
                None => {
                    info!("Form requires an identity");
                    return Outcome::Unauthorised;
                }
            }
        };

        if let Submitter::User(user_id) = submitter {
            let existing = match self
                .persistence
                .count_user_passages(form.id, user_id)
                .await
            {
                Ok(count) => count,
                Err(e) => return transient("count_user_passages", &e),
            };
            if form.passage_limit.is_reached(existing) {
                info!(
                    existing,
                    limit = form.passage_limit.to_raw(),
                    "Passage limit reached"
                );
                return Outcome::QuotaExceeded;
            }
        }

        if let Err(e) = validator::validate(passage, &form) {
            info!(tag = e.tag(), error = %e, "Passage failed validation");
            return Outcome::BadInput;
        }

        match self.persistence.save_passage(passage, submitter).await {
            Ok(passage_id) => {
                info!(passage_id, "Passage persisted");
                Outcome::Accepted { passage_id }
            }
            Err(e) => transient("save_passage", &e),
        }
    }
}

fn transient(operation: &str, e: &CoreError) -> Outcome {
    error!(operation, error = %e, code = e.error_code(), "Storage failure during submission");
    Outcome::Transient
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PassageAnswer;

    #[test]
    fn test_status_codes() {
        assert_eq!(Outcome::Accepted { passage_id: 1 }.status_code(), 204);
        assert_eq!(Outcome::BadInput.status_code(), 400);
        assert_eq!(Outcome::QuotaExceeded.status_code(), 400);
        assert_eq!(Outcome::Unauthorised.status_code(), 401);
        assert_eq!(Outcome::NotFound.status_code(), 404);
        assert_eq!(Outcome::Transient.status_code(), 500);
    }

    #[test]
    fn test_envelope_problem() {
        let ok = FormPassage {
            form_id: 7,
            answers: vec![PassageAnswer::new(10, "Yes")],
        };
        assert!(envelope_problem(&ok).is_none());

        let no_form = FormPassage {
            form_id: 0,
            answers: vec![],
        };
        assert!(envelope_problem(&no_form).is_some());

        let bad_question = FormPassage {
            form_id: 7,
            answers: vec![PassageAnswer::new(10, "Yes"), PassageAnswer::new(-1, "x")],
        };
        assert!(
            envelope_problem(&bad_question)
                .unwrap()
                .contains("question_id")
        );
    }
}
