//! Role-scoped views over classified questions.
//!
//! A question is relevant to a role when its tags overlap the role's top
//! skills (case-insensitive). The same filter drives classification, counts
//! and the question listings.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use crate::models::question::{Difficulty, QuestionType, SOURCE_GENERATED, SOURCE_STACKEXCHANGE};
use crate::skills::query::top_k_skills_for_role;

pub const RELEVANCE_TOP_K: i64 = 8;
pub const RELEVANCE_LIMIT: i64 = 10_000;

/// Which question sources a view draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Web,
    Llm,
    #[default]
    All,
}

impl SourceMode {
    /// `None` means every source.
    pub fn sources(&self) -> Option<Vec<String>> {
        match self {
            SourceMode::Web => Some(vec![SOURCE_STACKEXCHANGE.to_string()]),
            SourceMode::Llm => Some(vec![SOURCE_GENERATED.to_string()]),
            SourceMode::All => None,
        }
    }

    pub fn includes_web(&self) -> bool {
        matches!(self, SourceMode::Web | SourceMode::All)
    }

    pub fn includes_llm(&self) -> bool {
        matches!(self, SourceMode::Llm | SourceMode::All)
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(SourceMode::Web),
            "llm" => Ok(SourceMode::Llm),
            "all" | "" => Ok(SourceMode::All),
            other => Err(format!("unknown source mode '{other}' (expected web, llm or all)")),
        }
    }
}

/// A classified question as listed to interviewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedQuestion {
    pub id: i64,
    pub question: String,
    #[serde(rename = "type")]
    pub qtype: Option<String>,
    pub difficulty: Option<String>,
    pub evaluation_rubric: Value,
    pub url: String,
    pub tags: Vec<String>,
    pub source: String,
    pub best_answer: Option<String>,
}

#[derive(Debug, FromRow)]
struct TypedQuestionRow {
    id: i64,
    title: String,
    body: Option<String>,
    url: String,
    tags: Vec<String>,
    source: String,
    qtype: Option<String>,
    difficulty: Option<String>,
    rubric: Option<Value>,
    best_answer: Option<String>,
}

impl From<TypedQuestionRow> for TypedQuestion {
    fn from(row: TypedQuestionRow) -> Self {
        TypedQuestion {
            id: row.id,
            question: question_text(&row.title, row.body.as_deref()),
            qtype: row.qtype,
            difficulty: row.difficulty,
            evaluation_rubric: row.rubric.unwrap_or_else(|| Value::Object(Default::default())),
            url: row.url,
            tags: row.tags,
            source: row.source,
            best_answer: row.best_answer,
        }
    }
}

/// Title, plus a blank line and the body when there is one.
pub fn question_text(title: &str, body: Option<&str>) -> String {
    match body.map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => format!("{}\n\n{body}", title.trim()),
        None => title.trim().to_string(),
    }
}

/// Filters shared by the typed listings.
#[derive(Debug, Clone, Default)]
pub struct TypedFilter {
    pub qtype: Option<QuestionType>,
    pub difficulty: Option<Difficulty>,
    pub sources: Option<Vec<String>>,
    pub limit: i64,
}

/// Ids of questions whose tags overlap the role's top skills, best-scored first.
pub async fn relevant_question_ids_for_role(
    pool: &PgPool,
    role_id: i64,
    top_k: i64,
    limit: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let skills: Vec<String> = top_k_skills_for_role(pool, role_id, top_k)
        .await?
        .into_iter()
        .map(|s| s.name.to_lowercase())
        .collect();
    if skills.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar(
        r#"
        SELECT id FROM questions
        WHERE EXISTS (SELECT 1 FROM unnest(tags) AS t(tag) WHERE lower(t.tag) = ANY($1))
        ORDER BY score DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(&skills)
    .bind(limit)
    .fetch_all(pool)
    .await
}

async fn fetch_typed(
    pool: &PgPool,
    ids: Option<&[i64]>,
    filter: &TypedFilter,
) -> Result<Vec<TypedQuestion>, sqlx::Error> {
    let rows: Vec<TypedQuestionRow> = sqlx::query_as(
        r#"
        SELECT q.id, q.title, COALESCE(q.body_markdown, q.body_html) AS body, q.url, q.tags,
               q.source, m.qtype, m.difficulty, m.rubric,
               (SELECT COALESCE(a.body_markdown, a.body_html)
                  FROM answers a
                 WHERE a.question_id = q.id
                 ORDER BY a.is_accepted DESC, a.score DESC, a.id ASC
                 LIMIT 1) AS best_answer
        FROM questions q
        JOIN question_meta m ON m.question_id = q.id
        WHERE ($1::BIGINT[] IS NULL OR q.id = ANY($1))
          AND ($2::TEXT IS NULL OR m.qtype = $2)
          AND ($3::TEXT IS NULL OR m.difficulty = $3)
          AND ($4::TEXT[] IS NULL OR q.source = ANY($4))
        ORDER BY q.score DESC, q.id DESC
        LIMIT $5
        "#,
    )
    .bind(ids)
    .bind(filter.qtype.map(|t| t.as_str()))
    .bind(filter.difficulty.map(|d| d.as_str()))
    .bind(filter.sources.as_deref())
    .bind(filter.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TypedQuestion::from).collect())
}

/// Classified questions relevant to a role.
pub async fn fetch_typed_questions_for_role(
    pool: &PgPool,
    role_id: i64,
    filter: &TypedFilter,
) -> Result<Vec<TypedQuestion>, sqlx::Error> {
    let ids = relevant_question_ids_for_role(pool, role_id, RELEVANCE_TOP_K, filter.limit).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    fetch_typed(pool, Some(&ids), filter).await
}

/// Classified questions across every role.
pub async fn fetch_all_typed_questions(
    pool: &PgPool,
    filter: &TypedFilter,
) -> Result<Vec<TypedQuestion>, sqlx::Error> {
    fetch_typed(pool, None, filter).await
}

/// The listing behind the questions view: generated-only mode is global,
/// other modes are role-scoped.
pub async fn questions_for_view(
    pool: &PgPool,
    role_id: i64,
    mode: SourceMode,
    filter: TypedFilter,
) -> Result<Vec<TypedQuestion>, sqlx::Error> {
    let filter = TypedFilter {
        sources: mode.sources(),
        ..filter
    };
    match mode {
        SourceMode::Llm => fetch_all_typed_questions(pool, &filter).await,
        SourceMode::Web | SourceMode::All => {
            fetch_typed_questions_for_role(pool, role_id, &filter).await
        }
    }
}

/// Per-type counts of classified questions relevant to a role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityCounts {
    pub counts: BTreeMap<QuestionType, i64>,
    pub total: i64,
}

impl AvailabilityCounts {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts: BTreeMap<QuestionType, i64> =
            QuestionType::ALL.iter().map(|t| (*t, 0)).collect();
        for label in labels {
            if let Ok(qtype) = label.parse::<QuestionType>() {
                *counts.entry(qtype).or_insert(0) += 1;
            }
        }
        let total = counts.values().sum();
        Self { counts, total }
    }
}

pub async fn available_counts_for_role(
    pool: &PgPool,
    role_id: i64,
) -> Result<AvailabilityCounts, sqlx::Error> {
    let ids = relevant_question_ids_for_role(pool, role_id, RELEVANCE_TOP_K, RELEVANCE_LIMIT).await?;
    if ids.is_empty() {
        return Ok(AvailabilityCounts::from_labels(std::iter::empty()));
    }

    let labels: Vec<Option<String>> =
        sqlx::query_scalar("SELECT qtype FROM question_meta WHERE question_id = ANY($1)")
            .bind(&ids)
            .fetch_all(pool)
            .await?;
    Ok(AvailabilityCounts::from_labels(labels.iter().flatten().map(String::as_str)))
}
