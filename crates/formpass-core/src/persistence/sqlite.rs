// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;
use crate::migrations;
use crate::schema::{Form, FormPassage, Submitter};

use super::{
    FormRow, OptionRow, PassageAnswerRecord, PassageHeaderRow, PassageRecord, Persistence,
    QuestionRow, assemble_form,
};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates missing parent directories and the database file, then runs
    /// all migrations.
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/formpass.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn find_form(&self, form_id: i64) -> Result<Option<Form>, CoreError> {
        let Some(form) = sqlx::query_as::<_, FormRow>(
            r#"
            SELECT id, title, anonymous, passage_max
            FROM form
            WHERE id = ?
            "#,
        )
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, type AS kind, required, shuffle
            FROM question
            WHERE form_id = ?
            ORDER BY id
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT a.id, a.question_id, a.text
            FROM answer a
            JOIN question q ON q.id = a.question_id
            WHERE q.form_id = ?
            ORDER BY a.id
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        assemble_form(form, questions, options).map(Some)
    }

    async fn count_user_passages(&self, form_id: i64, user_id: i64) -> Result<i64, CoreError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM form_passage
            WHERE form_id = ? AND user_id = ?
            "#,
        )
        .bind(form_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn save_passage(
        &self,
        passage: &FormPassage,
        submitter: Submitter,
    ) -> Result<i64, CoreError> {
        let form_id = passage.form_id;
        let failed = move |e: sqlx::Error| CoreError::PassageSaveFailed {
            form_id,
            reason: e.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;

        let passage_id = sqlx::query(
            r#"
            INSERT INTO form_passage (form_id, user_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(form_id)
        .bind(submitter.user_id())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(failed)?
        .last_insert_rowid();

        for answer in &passage.answers {
            sqlx::query(
                r#"
                INSERT INTO passage_answer (form_passage_id, question_id, text)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(passage_id)
            .bind(answer.question_id)
            .bind(&answer.text)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        }

        tx.commit().await.map_err(failed)?;
        Ok(passage_id)
    }

    async fn load_passage(&self, passage_id: i64) -> Result<Option<PassageRecord>, CoreError> {
        let Some(header) = sqlx::query_as::<_, PassageHeaderRow>(
            r#"
            SELECT id, form_id, user_id, created_at
            FROM form_passage
            WHERE id = ?
            "#,
        )
        .bind(passage_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, PassageAnswerRecord>(
            r#"
            SELECT id, question_id, text
            FROM passage_answer
            WHERE form_passage_id = ?
            ORDER BY id
            "#,
        )
        .bind(passage_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PassageRecord::from_rows(header, answers)))
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}
