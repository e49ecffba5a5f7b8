//! Question persistence: idempotent upserts plus the embedding and
//! classification caches hanging off each question row.

use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::models::question::{
    AnswerItem, CandidateQuestion, QuestionItem, QuestionMeta, QuestionMetaRow,
};

/// Result of an upsert: the row id and whether a new row was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    pub created: bool,
}

/// Lower-cased, trimmed `title\n\nbody` used as the dedup fingerprint input.
pub fn canonical_question_text(title: &str, body_markdown: Option<&str>) -> String {
    let title = title.trim().to_lowercase();
    let body = body_markdown.unwrap_or("").trim().to_lowercase();
    format!("{title}\n\n{body}")
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Content hash of a question as stored in `questions.hash`.
pub fn content_hash(title: &str, body_markdown: Option<&str>) -> String {
    sha256_hex(&canonical_question_text(title, body_markdown))
}

/// Upserts a question and its answers.
///
/// Identity is `(source, external_id)` or `(source, hash)`; whichever matches
/// first wins and the existing row is updated in place. `source`,
/// `external_id` and `hash` are never rewritten on update. A concurrent insert
/// that trips a unique constraint is recovered by re-reading the winner.
pub async fn upsert_question_with_answers(
    pool: &PgPool,
    item: &QuestionItem,
) -> Result<UpsertOutcome, sqlx::Error> {
    let hash = item
        .hash
        .clone()
        .unwrap_or_else(|| content_hash(&item.title, item.body_markdown.as_deref()));

    let mut tx = pool.begin().await?;

    let outcome = match find_existing(&mut tx, item, &hash).await? {
        Some(id) => {
            update_question(&mut tx, id, item).await?;
            UpsertOutcome { id, created: false }
        }
        None => match insert_question(&mut tx, item, &hash).await? {
            Some(id) => UpsertOutcome { id, created: true },
            None => {
                debug!(
                    "Unique conflict inserting {}:{}; re-fetching existing row",
                    item.source, item.external_id
                );
                let id = find_existing(&mut tx, item, &hash)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                update_question(&mut tx, id, item).await?;
                UpsertOutcome { id, created: false }
            }
        },
    };

    for answer in &item.answers {
        upsert_answer(&mut tx, outcome.id, answer).await?;
    }

    tx.commit().await?;
    Ok(outcome)
}

/// Prefers the external-id match when both keys hit different rows.
const FIND_EXISTING_SQL: &str = r#"
    SELECT id FROM questions
    WHERE source = $1 AND (external_id = $2 OR hash = $3)
    ORDER BY (external_id = $2) DESC, id ASC
    LIMIT 1
"#;

async fn find_existing(
    tx: &mut Transaction<'_, Postgres>,
    item: &QuestionItem,
    hash: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(FIND_EXISTING_SQL)
    .bind(&item.source)
    .bind(&item.external_id)
    .bind(hash)
    .fetch_optional(&mut **tx)
    .await
}

async fn insert_question(
    tx: &mut Transaction<'_, Postgres>,
    item: &QuestionItem,
    hash: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO questions
            (source, external_id, url, title, body_markdown, body_html, tags, companies,
             question_type, difficulty, created_at_source, score, hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&item.source)
    .bind(&item.external_id)
    .bind(&item.url)
    .bind(&item.title)
    .bind(&item.body_markdown)
    .bind(&item.body_html)
    .bind(&item.tags)
    .bind(&item.companies)
    .bind(&item.question_type)
    .bind(&item.difficulty)
    .bind(item.created_at)
    .bind(item.score)
    .bind(hash)
    .fetch_optional(&mut **tx)
    .await
}

async fn update_question(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    item: &QuestionItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE questions SET
            url = $2, title = $3, body_markdown = $4, body_html = $5, tags = $6,
            companies = $7, question_type = $8, difficulty = $9,
            created_at_source = $10, score = $11, fetched_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&item.url)
    .bind(&item.title)
    .bind(&item.body_markdown)
    .bind(&item.body_html)
    .bind(&item.tags)
    .bind(&item.companies)
    .bind(&item.question_type)
    .bind(&item.difficulty)
    .bind(item.created_at)
    .bind(item.score)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_answer(
    tx: &mut Transaction<'_, Postgres>,
    question_id: i64,
    answer: &AnswerItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO answers
            (question_id, external_id, body_markdown, body_html, score, is_accepted, created_at_source)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (question_id, external_id) DO UPDATE SET
            body_markdown = EXCLUDED.body_markdown,
            body_html = EXCLUDED.body_html,
            score = EXCLUDED.score,
            is_accepted = EXCLUDED.is_accepted,
            created_at_source = EXCLUDED.created_at_source
        "#,
    )
    .bind(question_id)
    .bind(&answer.external_id)
    .bind(&answer.body_markdown)
    .bind(&answer.body_html)
    .bind(answer.score)
    .bind(answer.is_accepted)
    .bind(answer.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Questions whose tags intersect `tags` (case-insensitive), best-scored first.
pub async fn get_questions_with_any_tags(
    pool: &PgPool,
    tags: &[String],
    limit: i64,
) -> Result<Vec<CandidateQuestion>, sqlx::Error> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let wanted: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();

    sqlx::query_as::<_, CandidateQuestion>(
        r#"
        SELECT id, title, COALESCE(body_markdown, body_html, '') AS body, url, tags
        FROM questions
        WHERE EXISTS (SELECT 1 FROM unnest(tags) AS t(tag) WHERE lower(t.tag) = ANY($1))
        ORDER BY score DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(&wanted)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// One question in the shape the classifier and package builder consume.
pub async fn get_candidate_question(
    pool: &PgPool,
    question_id: i64,
) -> Result<Option<CandidateQuestion>, sqlx::Error> {
    sqlx::query_as::<_, CandidateQuestion>(
        r#"
        SELECT id, title, COALESCE(body_markdown, body_html, '') AS body, url, tags
        FROM questions
        WHERE id = $1
        "#,
    )
    .bind(question_id)
    .fetch_optional(pool)
    .await
}

/// The subset of `ids` that already carry classifier metadata.
pub async fn ids_with_meta(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar("SELECT question_id FROM question_meta WHERE question_id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn get_question_vector(
    pool: &PgPool,
    question_id: i64,
) -> Result<Option<Vec<f32>>, sqlx::Error> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT embedding_json FROM question_vectors WHERE question_id = $1")
            .bind(question_id)
            .fetch_optional(pool)
            .await?;

    Ok(raw.and_then(|json| match serde_json::from_str::<Vec<f32>>(&json) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Discarding unreadable embedding for question {question_id}: {e}");
            None
        }
    }))
}

pub async fn upsert_question_vector(
    pool: &PgPool,
    question_id: i64,
    embedding: &[f32],
) -> Result<(), sqlx::Error> {
    let json = serde_json::to_string(embedding)
        .map_err(|e| sqlx::Error::Protocol(format!("embedding serialization failed: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO question_vectors (question_id, dim, embedding_json)
        VALUES ($1, $2, $3)
        ON CONFLICT (question_id) DO UPDATE SET
            dim = EXCLUDED.dim,
            embedding_json = EXCLUDED.embedding_json,
            updated_at = NOW()
        "#,
    )
    .bind(question_id)
    .bind(embedding.len() as i32)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_question_meta(
    pool: &PgPool,
    question_id: i64,
) -> Result<Option<QuestionMeta>, sqlx::Error> {
    let row: Option<QuestionMetaRow> = sqlx::query_as(
        "SELECT question_id, qtype, difficulty, rubric FROM question_meta WHERE question_id = $1",
    )
    .bind(question_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(QuestionMetaRow::into_meta))
}

pub async fn upsert_question_meta(
    pool: &PgPool,
    question_id: i64,
    meta: &QuestionMeta,
) -> Result<(), sqlx::Error> {
    let rubric = serde_json::to_value(&meta.evaluation_rubric)
        .map_err(|e| sqlx::Error::Protocol(format!("rubric serialization failed: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO question_meta (question_id, qtype, difficulty, rubric)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (question_id) DO UPDATE SET
            qtype = EXCLUDED.qtype,
            difficulty = EXCLUDED.difficulty,
            rubric = EXCLUDED.rubric,
            updated_at = NOW()
        "#,
    )
    .bind(question_id)
    .bind(meta.qtype.as_str())
    .bind(meta.difficulty.as_str())
    .bind(rubric)
    .execute(pool)
    .await?;
    Ok(())
}

/// Inserts an answer for an existing question (used for LLM-written answers).
pub async fn insert_answer(
    pool: &PgPool,
    question_id: i64,
    answer: &AnswerItem,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    upsert_answer(&mut tx, question_id, answer).await?;
    tx.commit().await
}
