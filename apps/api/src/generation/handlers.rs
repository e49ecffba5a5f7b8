//! Axum route handlers for generation and packaging.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::generation::generate_for_role;
use crate::generation::package::{
    build_interview_package, default_per_type_target, resolve_distribution, DistributionStatus,
    InterviewPackage, PackageDeps, PackageRequest, DEFAULT_TOTAL,
};
use crate::generation::qna::{
    generate_qna_for_role, QnaItem, QnaOptions, DEFAULT_CODE_LANG, DEFAULT_DIFFICULTY_POLICY,
};
use crate::models::question::{Difficulty, QuestionType};
use crate::progress::stream_job;
use crate::retrieval::availability::SourceMode;
use crate::skills::handlers::ensure_role_exists;
use crate::state::AppState;
use crate::storage::PgStore;

const MAX_QNA_COUNT: usize = 50;
const MAX_PACKAGE_TOTAL: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QnaRequest {
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    pub count: usize,
    pub difficulty_policy: Option<String>,
    pub code_lang: Option<String>,
    pub persist: Option<bool>,
    pub restrict_difficulty: Option<Difficulty>,
}

#[derive(Debug, Serialize)]
pub struct QnaResponse {
    pub role_id: i64,
    pub count: usize,
    pub items: Vec<QnaItem>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PackageBody {
    pub total: Option<usize>,
    pub per_type_target: Option<BTreeMap<QuestionType, usize>>,
    #[serde(default = "default_true")]
    pub flexible: bool,
    #[serde(default = "default_true")]
    pub allow_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub distribution: DistributionStatus,
    #[serde(flatten)]
    pub package: InterviewPackage,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub mode: Option<String>,
    pub difficulty: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/roles/:id/qna
///
/// Generates one batch of questions of a single type for the role.
pub async fn handle_generate_qna(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Json(request): Json<QnaRequest>,
) -> Result<Json<QnaResponse>, AppError> {
    if request.count == 0 || request.count > MAX_QNA_COUNT {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_QNA_COUNT}"
        )));
    }
    ensure_role_exists(&state, role_id).await?;

    let options = QnaOptions {
        difficulty_policy: request
            .difficulty_policy
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIFFICULTY_POLICY.to_string()),
        code_lang: request
            .code_lang
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CODE_LANG.to_string()),
        persist: request.persist.unwrap_or(true),
        restrict_difficulty: request.restrict_difficulty,
    };
    let items = generate_qna_for_role(
        &state.db,
        state.generator.as_ref(),
        role_id,
        request.qtype,
        request.count,
        &options,
    )
    .await?;

    Ok(Json(QnaResponse {
        role_id,
        count: items.len(),
        items,
    }))
}

/// POST /api/v1/roles/:id/package
///
/// Builds an interview package. Targets default to one Behavioral, two
/// Technical, one Coding and one System Design question.
pub async fn handle_build_package(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Json(body): Json<PackageBody>,
) -> Result<Json<PackageResponse>, AppError> {
    let total = body.total.unwrap_or(DEFAULT_TOTAL);
    let target = body.per_type_target.unwrap_or_else(default_per_type_target);
    if total > MAX_PACKAGE_TOTAL || target.values().any(|c| *c > MAX_PACKAGE_TOTAL) {
        return Err(AppError::Validation(format!(
            "total and per-type counts must not exceed {MAX_PACKAGE_TOTAL}"
        )));
    }
    let resolved = resolve_distribution(total, &target, body.flexible)?;
    if resolved.total > MAX_PACKAGE_TOTAL {
        return Err(AppError::Validation(format!(
            "total must not exceed {MAX_PACKAGE_TOTAL}"
        )));
    }
    ensure_role_exists(&state, role_id).await?;

    let store = PgStore::new(state.db.clone());
    let deps = PackageDeps {
        store: &store,
        embedder: state.embedder.as_ref(),
        classifier: state.classifier.as_ref(),
        generator: state.generator.as_ref(),
    };
    let request = PackageRequest {
        role_id,
        total: resolved.total,
        per_type_target: resolved.counts,
        allow_fallback: body.allow_fallback,
    };
    let package = build_interview_package(deps, &request).await?;

    Ok(Json(PackageResponse {
        distribution: resolved.status,
        package,
    }))
}

/// POST /api/v1/roles/:id/generate?mode=web|llm|all&difficulty=
///
/// Streams crawl, classification and generation progress for the role.
pub async fn handle_generate_for_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(params): Query<GenerateQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mode = params
        .mode
        .as_deref()
        .unwrap_or("all")
        .parse::<SourceMode>()
        .map_err(AppError::Validation)?;
    let restrict = match params.difficulty.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(d) if d.eq_ignore_ascii_case("all") => None,
        Some(d) => Some(d.parse::<Difficulty>().map_err(AppError::Validation)?),
    };
    ensure_role_exists(&state, role_id).await?;

    Ok(stream_job(move |progress| async move {
        generate_for_role(&state, role_id, mode, restrict, &progress).await
    }))
}
