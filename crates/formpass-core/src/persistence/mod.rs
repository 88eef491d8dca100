// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for formpass-core.
//!
//! The passage core needs three things from storage: the declared schema of
//! a form, the number of passages a user already submitted, and an atomic
//! write of one passage with its answers.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::schema::{AnswerOption, Form, FormPassage, PassageLimit, Question, QuestionKind, Submitter};

/// `form` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FormRow {
    /// Form identifier.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Anonymity flag.
    pub anonymous: bool,
    /// Raw per-user cap; negative means unlimited.
    pub passage_max: i64,
}

/// `question` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionRow {
    /// Question identifier.
    pub id: i64,
    /// Stored type tag.
    pub kind: i16,
    /// Required flag.
    pub required: bool,
    /// Shuffle flag.
    pub shuffle: bool,
}

/// `answer` row, a declared option.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OptionRow {
    /// Option identifier.
    pub id: i64,
    /// Owning question.
    pub question_id: i64,
    /// Option label.
    pub text: String,
}

/// `form_passage` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PassageHeaderRow {
    /// Passage identifier.
    pub id: i64,
    /// Form identifier.
    pub form_id: i64,
    /// Submitter, `None` when anonymous.
    pub user_id: Option<i64>,
    /// When the passage was persisted.
    pub created_at: DateTime<Utc>,
}

/// `passage_answer` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PassageAnswerRecord {
    /// Answer row identifier.
    pub id: i64,
    /// Question answered.
    pub question_id: i64,
    /// Submitted text.
    pub text: String,
}

/// A persisted passage with its answers.
#[derive(Debug, Clone)]
pub struct PassageRecord {
    /// Passage identifier.
    pub id: i64,
    /// Form identifier.
    pub form_id: i64,
    /// Who the passage is attributed to.
    pub submitter: Submitter,
    /// When the passage was persisted (UTC).
    pub created_at: DateTime<Utc>,
    /// Answer rows in insertion order.
    pub answers: Vec<PassageAnswerRecord>,
}

impl PassageRecord {
    /// Combine a header row with its answer rows.
    pub fn from_rows(header: PassageHeaderRow, answers: Vec<PassageAnswerRecord>) -> Self {
        Self {
            id: header.id,
            form_id: header.form_id,
            submitter: header
                .user_id
                .map_or(Submitter::Anonymous, Submitter::User),
            created_at: header.created_at,
            answers,
        }
    }
}

/// Build a [`Form`] from its rows.
///
/// Questions come out in the order given; options are attached to their
/// question in the order given. A question whose stored tag is unknown
/// makes the whole schema invalid.
pub fn assemble_form(
    form: FormRow,
    questions: Vec<QuestionRow>,
    options: Vec<OptionRow>,
) -> Result<Form, CoreError> {
    let mut options_by_question: BTreeMap<i64, Vec<AnswerOption>> = BTreeMap::new();
    for option in options {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(AnswerOption::new(option.id, option.text));
    }

    let questions = questions
        .into_iter()
        .map(|row| {
            let options = options_by_question.remove(&row.id).unwrap_or_default();
            let kind =
                QuestionKind::from_tag(row.kind, options).ok_or_else(|| CoreError::InvalidSchema {
                    form_id: form.id,
                    reason: format!("question {} has unknown type {}", row.id, row.kind),
                })?;
            Ok(Question {
                id: row.id,
                required: row.required,
                shuffle: row.shuffle,
                kind,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    Ok(Form {
        id: form.id,
        title: form.title,
        anonymous: form.anonymous,
        passage_limit: PassageLimit::from_raw(form.passage_max),
        questions,
    })
}

/// Storage operations used by the passage core.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Load the declared schema of a form, or `None` if it does not exist.
    ///
    /// Questions and their options are ordered by ascending identifier.
    async fn find_form(&self, form_id: i64) -> Result<Option<Form>, CoreError>;

    /// Number of stored passages attributed to `user_id` on `form_id`.
    ///
    /// Anonymous passages are never counted.
    async fn count_user_passages(&self, form_id: i64, user_id: i64) -> Result<i64, CoreError>;

    /// Persist a passage and all of its answers in one transaction.
    ///
    /// Sets `created_at` to the current UTC time and returns the generated
    /// passage id. On error nothing is written. Does not re-validate the
    /// passage against its schema.
    async fn save_passage(
        &self,
        passage: &FormPassage,
        submitter: Submitter,
    ) -> Result<i64, CoreError>;

    /// Read back a persisted passage with its answers.
    async fn load_passage(&self, passage_id: i64) -> Result<Option<PassageRecord>, CoreError>;

    /// Check database connectivity.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}
