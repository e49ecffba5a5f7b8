//! Axum route handlers for the question views.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::question::{Difficulty, QuestionType};
use crate::retrieval::availability::{
    available_counts_for_role, questions_for_view, AvailabilityCounts, SourceMode, TypedFilter,
    TypedQuestion, RELEVANCE_LIMIT,
};
use crate::skills::handlers::ensure_role_exists;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub qtype: Option<String>,
    pub difficulty: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub role_id: i64,
    pub mode: SourceMode,
    pub count: usize,
    pub items: Vec<TypedQuestion>,
}

/// "All" (or nothing) means no filter.
fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(AppError::Validation),
    }
}

/// GET /api/v1/roles/:id/questions?mode=&type=&difficulty=
///
/// `mode=llm` lists generated questions across every role; `web` and `all`
/// are scoped to the role's skill tags.
pub async fn handle_list_questions(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(params): Query<QuestionsQuery>,
) -> Result<Json<QuestionsResponse>, AppError> {
    let mode = params
        .mode
        .as_deref()
        .unwrap_or("all")
        .parse::<SourceMode>()
        .map_err(AppError::Validation)?;
    let filter = TypedFilter {
        qtype: parse_optional::<QuestionType>(params.qtype.as_deref())?,
        difficulty: parse_optional::<Difficulty>(params.difficulty.as_deref())?,
        sources: None,
        limit: params.limit.unwrap_or(RELEVANCE_LIMIT).clamp(1, RELEVANCE_LIMIT),
    };
    ensure_role_exists(&state, role_id).await?;

    let items = questions_for_view(&state.db, role_id, mode, filter).await?;
    Ok(Json(QuestionsResponse {
        role_id,
        mode,
        count: items.len(),
        items,
    }))
}

/// GET /api/v1/roles/:id/availability
pub async fn handle_availability(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> Result<Json<AvailabilityCounts>, AppError> {
    ensure_role_exists(&state, role_id).await?;
    let counts = available_counts_for_role(&state.db, role_id).await?;
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_treats_all_as_no_filter() {
        assert_eq!(parse_optional::<QuestionType>(Some("All")).unwrap(), None);
        assert_eq!(parse_optional::<QuestionType>(None).unwrap(), None);
        assert_eq!(
            parse_optional::<QuestionType>(Some("system design")).unwrap(),
            Some(QuestionType::SystemDesign)
        );
        assert!(matches!(
            parse_optional::<Difficulty>(Some("impossible")),
            Err(AppError::Validation(_))
        ));
    }
}
