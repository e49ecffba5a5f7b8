//! Postgres-backed checks of the question upsert invariants.
//! Run with `DATABASE_URL` set: `cargo test -- --ignored`.

use interviewkit_api::db::create_pool;
use interviewkit_api::models::question::{AnswerItem, QuestionItem};
use interviewkit_api::storage::questions::upsert_question_with_answers;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    create_pool(&url).await.unwrap()
}

fn item(source: &str, external_id: &str, title: &str) -> QuestionItem {
    QuestionItem {
        source: source.to_string(),
        external_id: external_id.to_string(),
        url: format!("https://example.test/{external_id}"),
        title: title.to_string(),
        body_markdown: Some("body".to_string()),
        tags: vec!["rust".to_string()],
        score: 1,
        ..Default::default()
    }
}

async fn rows_for_source(pool: &PgPool, source: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE source = $1")
        .bind(source)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_same_external_id_updates_the_existing_row() {
    let pool = pool().await;
    let source = format!("test_{}", Uuid::new_v4().simple());

    let first = upsert_question_with_answers(&pool, &item(&source, "42", "Original title"))
        .await
        .unwrap();
    let mut changed = item(&source, "42", "Edited title");
    changed.score = 9;
    let second = upsert_question_with_answers(&pool, &changed).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(rows_for_source(&pool, &source).await, 1);

    let (title, score): (String, i64) =
        sqlx::query_as("SELECT title, score FROM questions WHERE id = $1")
            .bind(first.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(title, "Edited title");
    assert_eq!(score, 9);
}

#[tokio::test]
#[ignore]
async fn test_same_hash_with_new_external_id_is_one_row() {
    let pool = pool().await;
    let source = format!("test_{}", Uuid::new_v4().simple());

    let first = upsert_question_with_answers(&pool, &item(&source, "a", "Same text"))
        .await
        .unwrap();
    let second = upsert_question_with_answers(&pool, &item(&source, "b", "  same TEXT "))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(rows_for_source(&pool, &source).await, 1);
    let external_id: String = sqlx::query_scalar("SELECT external_id FROM questions WHERE id = $1")
        .bind(first.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(external_id, "a");
}

#[tokio::test]
#[ignore]
async fn test_answers_are_upserted_per_question() {
    let pool = pool().await;
    let source = format!("test_{}", Uuid::new_v4().simple());
    let mut question = item(&source, "7", "With answers");
    question.answers = vec![AnswerItem {
        external_id: "ans-1".into(),
        body_markdown: Some("first".into()),
        score: 1,
        ..Default::default()
    }];

    let outcome = upsert_question_with_answers(&pool, &question).await.unwrap();
    question.answers[0].score = 5;
    upsert_question_with_answers(&pool, &question).await.unwrap();

    let scores: Vec<i64> = sqlx::query_scalar("SELECT score FROM answers WHERE question_id = $1")
        .bind(outcome.id)
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(scores, vec![5]);
}
