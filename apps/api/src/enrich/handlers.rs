//! Axum route handlers for classification.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;

use crate::enrich::{classify_role_questions, DEFAULT_CLASSIFY_BATCH};
use crate::errors::AppError;
use crate::progress::stream_job;
use crate::skills::handlers::ensure_role_exists;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub batch_size: Option<usize>,
    pub max_items: Option<usize>,
}

/// POST /api/v1/roles/:id/classify?batch_size=&max_items=
///
/// Streams per-batch progress; the `done` event carries the counters.
pub async fn handle_classify_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(params): Query<ClassifyQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let batch_size = params.batch_size.unwrap_or(DEFAULT_CLASSIFY_BATCH);
    if batch_size == 0 {
        return Err(AppError::Validation("batch_size must be positive".to_string()));
    }
    ensure_role_exists(&state, role_id).await?;

    Ok(stream_job(move |progress| async move {
        classify_role_questions(
            &state.db,
            state.classifier.as_ref(),
            role_id,
            batch_size,
            params.max_items,
            &progress,
        )
        .await
    }))
}
