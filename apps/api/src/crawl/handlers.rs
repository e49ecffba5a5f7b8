//! Axum route handlers for crawling.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};

use crate::crawl::pipeline::{crawl_for_role, persist_questions, PersistSummary};
use crate::errors::AppError;
use crate::progress::stream_job;
use crate::skills::handlers::ensure_role_exists;
use crate::state::AppState;

const DEFAULT_GITHUB_SOURCE: &str = "github";

/// POST /api/v1/roles/:id/crawl
///
/// Streams crawl progress; the final `done` event carries the per-site summary.
pub async fn handle_crawl_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    ensure_role_exists(&state, role_id).await?;

    Ok(stream_job(move |progress| async move {
        crawl_for_role(
            &state.db,
            &state.stackexchange,
            &state.config.crawl,
            role_id,
            &progress,
        )
        .await
    }))
}

#[derive(Debug, Deserialize)]
pub struct GithubImportRequest {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GithubImportResponse {
    pub source: String,
    pub found: usize,
    #[serde(flatten)]
    pub persisted: PersistSummary,
}

/// POST /api/v1/crawl/github
///
/// Imports the questions of one markdown list file.
pub async fn handle_github_import(
    State(state): State<AppState>,
    Json(request): Json<GithubImportRequest>,
) -> Result<Json<GithubImportResponse>, AppError> {
    for (field, value) in [
        ("owner", &request.owner),
        ("repo", &request.repo),
        ("path", &request.path),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }
    let source = request
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GITHUB_SOURCE.to_string());
    let tags: Vec<String> = request.tags.iter().map(|t| t.trim().to_lowercase()).collect();

    let items = state
        .github
        .fetch_questions(&request.owner, &request.repo, &request.path, &source, &tags)
        .await?;
    let found = items.len();
    let persisted = persist_questions(&state.db, items).await;

    Ok(Json(GithubImportResponse {
        source,
        found,
        persisted,
    }))
}
