// Copyright (C) 2025 The formpass authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL persistence tests.
//!
//! Run only when `TEST_DATABASE_URL` points at a scratch database; every test
//! truncates the formpass tables.

mod common;

use std::sync::Arc;

use common::*;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;

use formpass_core::migrations;
use formpass_core::passage_service::{Outcome, PassageService};
use formpass_core::persistence::{Persistence, PostgresPersistence};
use formpass_core::schema::{Form, Submitter};

// Tests share one database.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn pg_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres");

    migrations::run_postgres(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE passage_answer, form_passage, answer, question, form RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to truncate tables");

    pool
}

async fn seed_pg_form(pool: &PgPool, form: &Form) {
    sqlx::query("INSERT INTO form (id, title, anonymous, passage_max) VALUES ($1, $2, $3, $4)")
        .bind(form.id)
        .bind(&form.title)
        .bind(form.anonymous)
        .bind(form.passage_limit.to_raw())
        .execute(pool)
        .await
        .expect("Failed to insert form");

    for q in &form.questions {
        sqlx::query(
            "INSERT INTO question (id, form_id, type, required, shuffle) VALUES ($1, $2, $3, $4, $5)",
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
            sqlx::query("INSERT INTO answer (id, question_id, text) VALUES ($1, $2, $3)")
                .bind(option.id)
                .bind(q.id)
                .bind(&option.text)
                .execute(pool)
                .await
                .expect("Failed to insert option");
        }
    }
}

#[tokio::test]
async fn test_pg_find_form_round_trip() {
    skip_if_no_db!();
    let _lock = DB_LOCK.lock().await;
    let pool = pg_pool().await;
    seed_pg_form(&pool, &yes_no_form()).await;
    seed_pg_form(&pool, &anonymous_ab_form()).await;
    let persistence = PostgresPersistence::new(pool);

    assert_eq!(persistence.find_form(7).await.unwrap(), Some(yes_no_form()));
    assert_eq!(
        persistence.find_form(9).await.unwrap(),
        Some(anonymous_ab_form())
    );
    assert_eq!(persistence.find_form(404).await.unwrap(), None);
    assert!(persistence.health_check_db().await.unwrap());
}

#[tokio::test]
async fn test_pg_save_and_load_passage() {
    skip_if_no_db!();
    let _lock = DB_LOCK.lock().await;
    let pool = pg_pool().await;
    seed_pg_form(&pool, &anonymous_ab_form()).await;
    let persistence = PostgresPersistence::new(pool);

    let id = persistence
        .save_passage(&passage(9, &[(30, "B"), (30, "A")]), Submitter::Anonymous)
        .await
        .unwrap();

    let record = persistence.load_passage(id).await.unwrap().unwrap();
    assert_eq!(record.form_id, 9);
    assert_eq!(record.submitter, Submitter::Anonymous);
    let texts: Vec<_> = record.answers.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, vec!["B", "A"]);

    assert!(persistence.load_passage(id + 1000).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pg_count_ignores_other_users_and_anonymous() {
    skip_if_no_db!();
    let _lock = DB_LOCK.lock().await;
    let pool = pg_pool().await;
    seed_pg_form(&pool, &capped_text_form()).await;
    let persistence = PostgresPersistence::new(pool);
    let payload = passage(8, &[(20, "x")]);

    persistence
        .save_passage(&payload, Submitter::User(4))
        .await
        .unwrap();
    persistence
        .save_passage(&payload, Submitter::User(5))
        .await
        .unwrap();
    persistence
        .save_passage(&payload, Submitter::Anonymous)
        .await
        .unwrap();

    assert_eq!(persistence.count_user_passages(8, 4).await.unwrap(), 1);
    assert_eq!(persistence.count_user_passages(8, 6).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pg_failed_answer_insert_rolls_back() {
    skip_if_no_db!();
    let _lock = DB_LOCK.lock().await;
    let pool = pg_pool().await;
    seed_pg_form(&pool, &capped_text_form()).await;
    let persistence = PostgresPersistence::new(pool.clone());

    // Question 999 does not exist, so the answer insert violates its foreign key.
    let result = persistence
        .save_passage(&passage(8, &[(20, "ok"), (999, "dangling")]), Submitter::User(4))
        .await;
    assert!(result.is_err());

    let (passages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM form_passage")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (answers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM passage_answer")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!((passages, answers), (0, 0));
}

#[tokio::test]
async fn test_pg_service_enforces_limit() {
    skip_if_no_db!();
    let _lock = DB_LOCK.lock().await;
    let pool = pg_pool().await;
    seed_pg_form(&pool, &capped_text_form()).await;
    let service = PassageService::new(Arc::new(PostgresPersistence::new(pool)));
    let payload = passage(8, &[(20, "again")]);

    assert!(matches!(
        service.submit(&payload, Some(4)).await,
        Outcome::Accepted { .. }
    ));
    assert_eq!(service.submit(&payload, Some(4)).await, Outcome::QuotaExceeded);
}
