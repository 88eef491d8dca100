// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for formpass-core tests.
//!
//! Provides an in-memory [`MockPersistence`], schema fixtures and SQLite seeding.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use formpass_core::error::CoreError;
use formpass_core::migrations;
use formpass_core::persistence::{PassageAnswerRecord, PassageRecord, Persistence};
use formpass_core::schema::{
    AnswerOption, Form, FormPassage, PassageAnswer, PassageLimit, Question, QuestionKind,
    Submitter,
};

// ============================================================================
// Mock Persistence
// ============================================================================

/// In-memory persistence with switchable failures.
#[derive(Default)]
pub struct MockPersistence {
    forms: Mutex<HashMap<i64, Form>>,
    passages: Mutex<Vec<PassageRecord>>,
    pub fail_find: Mutex<bool>,
    pub fail_count: Mutex<bool>,
    pub fail_save: Mutex<bool>,
    pub save_delay: Mutex<Option<Duration>>,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(self, form: Form) -> Self {
        self.forms.lock().unwrap().insert(form.id, form);
        self
    }

    /// Record a prior passage without going through the service.
    pub fn with_passage(self, form_id: i64, submitter: Submitter) -> Self {
        let mut passages = self.passages.lock().unwrap();
        let id = passages.len() as i64 + 1;
        passages.push(PassageRecord {
            id,
            form_id,
            submitter,
            created_at: Utc::now(),
            answers: vec![],
        });
        drop(passages);
        self
    }

    pub fn passages(&self) -> Vec<PassageRecord> {
        self.passages.lock().unwrap().clone()
    }

    fn mock_error(operation: &str) -> CoreError {
        CoreError::DatabaseError {
            operation: operation.to_string(),
            details: "Mock failure".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Persistence for MockPersistence {
    async fn find_form(&self, form_id: i64) -> Result<Option<Form>, CoreError> {
        if *self.fail_find.lock().unwrap() {
            return Err(Self::mock_error("find_form"));
        }
        Ok(self.forms.lock().unwrap().get(&form_id).cloned())
    }

    async fn count_user_passages(&self, form_id: i64, user_id: i64) -> Result<i64, CoreError> {
        if *self.fail_count.lock().unwrap() {
            return Err(Self::mock_error("count_user_passages"));
        }
        Ok(self
            .passages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.form_id == form_id && p.submitter == Submitter::User(user_id))
            .count() as i64)
    }

    async fn save_passage(
        &self,
        passage: &FormPassage,
        submitter: Submitter,
    ) -> Result<i64, CoreError> {
        let delay = *self.save_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_save.lock().unwrap() {
            return Err(Self::mock_error("save_passage"));
        }

        let mut passages = self.passages.lock().unwrap();
        let id = passages.len() as i64 + 1;
        passages.push(PassageRecord {
            id,
            form_id: passage.form_id,
            submitter,
            created_at: Utc::now(),
            answers: passage
                .answers
                .iter()
                .enumerate()
                .map(|(i, a)| PassageAnswerRecord {
                    id: i as i64 + 1,
                    question_id: a.question_id,
                    text: a.text.clone(),
                })
                .collect(),
        });
        Ok(id)
    }

    async fn load_passage(&self, passage_id: i64) -> Result<Option<PassageRecord>, CoreError> {
        Ok(self
            .passages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == passage_id)
            .cloned())
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        Ok(!*self.fail_find.lock().unwrap())
    }
}

// ============================================================================
// Schema Fixtures
// ============================================================================

pub fn question(id: i64, required: bool, kind: QuestionKind) -> Question {
    Question {
        id,
        required,
        shuffle: false,
        kind,
    }
}

pub fn form(id: i64, anonymous: bool, passage_max: i64, questions: Vec<Question>) -> Form {
    Form {
        id,
        title: format!("Form {id}"),
        anonymous,
        passage_limit: PassageLimit::from_raw(passage_max),
        questions,
    }
}

/// Form 7: one required single choice question 10 with Yes/No.
pub fn yes_no_form() -> Form {
    form(
        7,
        false,
        -1,
        vec![question(
            10,
            true,
            QuestionKind::SingleChoice {
                options: vec![AnswerOption::new(100, "Yes"), AnswerOption::new(101, "No")],
            },
        )],
    )
}

/// Form 8: capped at one passage per user, one optional text question 20.
pub fn capped_text_form() -> Form {
    form(8, false, 1, vec![question(20, false, QuestionKind::Text)])
}

/// Form 9: anonymous, one multiple choice question 30 with A/B.
pub fn anonymous_ab_form() -> Form {
    form(
        9,
        true,
        -1,
        vec![question(
            30,
            false,
            QuestionKind::MultipleChoice {
                options: vec![AnswerOption::new(40, "A"), AnswerOption::new(41, "B")],
            },
        )],
    )
}

/// Form 11: one single choice question 50 with a single option.
pub fn single_option_form() -> Form {
    form(
        11,
        false,
        -1,
        vec![question(
            50,
            false,
            QuestionKind::SingleChoice {
                options: vec![AnswerOption::new(60, "L")],
            },
        )],
    )
}

pub fn passage(form_id: i64, answers: &[(i64, &str)]) -> FormPassage {
    FormPassage {
        form_id,
        answers: answers
            .iter()
            .map(|(q, t)| PassageAnswer::new(*q, *t))
            .collect(),
    }
}

// ============================================================================
// SQLite Helpers
// ============================================================================

/// In-memory SQLite pool with migrations applied.
pub async fn sqlite_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Insert a form with its questions and options.
pub async fn seed_form(pool: &SqlitePool, form: &Form) {
    sqlx::query("INSERT INTO form (id, title, anonymous, passage_max) VALUES (?, ?, ?, ?)")
        .bind(form.id)
        .bind(&form.title)
        .bind(form.anonymous)
        .bind(form.passage_limit.to_raw())
        .execute(pool)
        .await
        .expect("Failed to insert form");

    for q in &form.questions {
        sqlx::query(
            "INSERT INTO question (id, form_id, type, required, shuffle) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(q.id)
        .bind(form.id)
        .bind(q.kind.tag())
        .bind(q.required)
        .bind(q.shuffle)
        .execute(pool)
        .await
        .expect("Failed to insert question");

        for option in q.kind.options() {
            sqlx::query("INSERT INTO answer (id, question_id, text) VALUES (?, ?, ?)")
                .bind(option.id)
                .bind(q.id)
                .bind(&option.text)
                .execute(pool)
                .await
                .expect("Failed to insert option");
        }
    }
}

/// Rows in `form_passage` as (form_id, user_id).
pub async fn stored_passages(pool: &SqlitePool) -> Vec<(i64, Option<i64>)> {
    sqlx::query_as("SELECT form_id, user_id FROM form_passage ORDER BY id")
        .fetch_all(pool)
        .await
        .expect("Failed to read passages")
}

/// Rows in `passage_answer` as (question_id, text).
pub async fn stored_answers(pool: &SqlitePool) -> Vec<(i64, String)> {
    sqlx::query_as("SELECT question_id, text FROM passage_answer ORDER BY id")
        .fetch_all(pool)
        .await
        .expect("Failed to read answers")
}

#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}
