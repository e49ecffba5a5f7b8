//! Axum route handlers for JD intake.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::parsing::{extract_structured, text_from_upload, ParsedJobDescription};
use crate::skills::build_and_store_skill_graph;
use crate::skills::models::SkillGraph;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ParseJdRequest {
    pub jd_text: String,
}

#[derive(Debug, Serialize)]
pub struct ParseJdResponse {
    pub role_id: i64,
    pub parsed: ParsedJobDescription,
    pub graph: SkillGraph,
    pub ranked_skills: Vec<(String, f64)>,
}

/// POST /api/v1/jd/parse
///
/// Extracts structured fields, infers the skill graph and persists it.
/// The returned `role_id` drives every role-scoped endpoint.
pub async fn handle_parse_jd(
    State(state): State<AppState>,
    Json(request): Json<ParseJdRequest>,
) -> Result<Json<ParseJdResponse>, AppError> {
    ingest_jd(&state, &request.jd_text).await.map(Json)
}

/// POST /api/v1/jd/upload
///
/// Multipart form with a single `file` field holding a `.txt` or `.pdf` JD.
pub async fn handle_upload_jd(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ParseJdResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

        info!("Received JD upload '{file_name}' ({} bytes)", bytes.len());
        let jd_text = text_from_upload(&file_name, &bytes)?;
        return ingest_jd(&state, &jd_text).await.map(Json);
    }

    Err(AppError::Validation(
        "multipart body must contain a 'file' field".to_string(),
    ))
}

async fn ingest_jd(state: &AppState, jd_text: &str) -> Result<ParseJdResponse, AppError> {
    let parsed = extract_structured(jd_text, &state.llm).await?;
    let stored = build_and_store_skill_graph(&parsed, jd_text, &state.llm, &state.db).await?;

    Ok(ParseJdResponse {
        role_id: stored.role_id,
        parsed,
        graph: stored.graph,
        ranked_skills: stored.ranked,
    })
}
