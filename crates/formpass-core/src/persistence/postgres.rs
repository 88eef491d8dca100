// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL persistence for formpass-core.
//!
//! Free functions over a [`PgPool`]; [`PostgresPersistence`] delegates to them.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::CoreError;
use crate::schema::{Form, FormPassage, Submitter};

use super::{
    FormRow, OptionRow, PassageAnswerRecord, PassageHeaderRow, PassageRecord, Persistence,
    QuestionRow, assemble_form,
};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Form Schema
// ============================================================================

/// Load a form with its questions and options.
pub async fn find_form(pool: &PgPool, form_id: i64) -> Result<Option<Form>, CoreError> {
    let Some(form) = sqlx::query_as::<_, FormRow>(
        r#"
        SELECT id, title, anonymous, passage_max
        FROM form
        WHERE id = $1
        "#,
    )
    .bind(form_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, type AS kind, required, shuffle
        FROM question
        WHERE form_id = $1
        ORDER BY id
        "#,
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT a.id, a.question_id, a.text
        FROM answer a
        JOIN question q ON q.id = a.question_id
        WHERE q.form_id = $1
        ORDER BY a.id
        "#,
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    assemble_form(form, questions, options).map(Some)
}

// ============================================================================
// Passages
// ============================================================================

/// Count passages attributed to a user on a form.
pub async fn count_user_passages(
    pool: &PgPool,
    form_id: i64,
    user_id: i64,
) -> Result<i64, CoreError> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM form_passage
        WHERE form_id = $1 AND user_id = $2
        "#,
    )
    .bind(form_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count.0)
}

/// Insert a passage header and its answers in one transaction.
pub async fn save_passage(
    pool: &PgPool,
    passage: &FormPassage,
    submitter: Submitter,
) -> Result<i64, CoreError> {
    let form_id = passage.form_id;
    let failed = move |e: sqlx::Error| CoreError::PassageSaveFailed {
        form_id,
        reason: e.to_string(),
    };

    let mut tx = pool.begin().await.map_err(failed)?;

    let (passage_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO form_passage (form_id, user_id, created_at)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(form_id)
    .bind(submitter.user_id())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(failed)?;

    if !passage.answers.is_empty() {
        let question_ids: Vec<i64> = passage.answers.iter().map(|a| a.question_id).collect();
        let texts: Vec<&str> = passage.answers.iter().map(|a| a.text.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO passage_answer (form_passage_id, question_id, text)
            SELECT $1, question_id, text
            FROM UNNEST($2::BIGINT[], $3::TEXT[]) WITH ORDINALITY AS t(question_id, text, ord)
            ORDER BY ord
            "#,
        )
        .bind(passage_id)
        .bind(&question_ids)
        .bind(&texts)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;
    }

    tx.commit().await.map_err(failed)?;
    Ok(passage_id)
}

/// Load a persisted passage with its answers.
pub async fn load_passage(
    pool: &PgPool,
    passage_id: i64,
) -> Result<Option<PassageRecord>, CoreError> {
    let Some(header) = sqlx::query_as::<_, PassageHeaderRow>(
        r#"
        SELECT id, form_id, user_id, created_at
        FROM form_passage
        WHERE id = $1
        "#,
    )
    .bind(passage_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let answers = sqlx::query_as::<_, PassageAnswerRecord>(
        r#"
        SELECT id, question_id, text
        FROM passage_answer
        WHERE form_passage_id = $1
        ORDER BY id
        "#,
    )
    .bind(passage_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(PassageRecord::from_rows(header, answers)))
}

/// Check database health.
pub async fn health_check_db(pool: &PgPool) -> Result<bool, CoreError> {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(pool).await;
    Ok(result.is_ok())
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn find_form(&self, form_id: i64) -> Result<Option<Form>, CoreError> {
        find_form(&self.pool, form_id).await
    }

    async fn count_user_passages(&self, form_id: i64, user_id: i64) -> Result<i64, CoreError> {
        count_user_passages(&self.pool, form_id, user_id).await
    }

    async fn save_passage(
        &self,
        passage: &FormPassage,
        submitter: Submitter,
    ) -> Result<i64, CoreError> {
        save_passage(&self.pool, passage, submitter).await
    }

    async fn load_passage(&self, passage_id: i64) -> Result<Option<PassageRecord>, CoreError> {
        load_passage(&self.pool, passage_id).await
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        health_check_db(&self.pool).await
    }
}
