//! Axum route handlers for the skill graph read API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::skill::RankedSkill;
use crate::skills::models::Relation;
use crate::skills::query::{self, RoleSkillGraph};
use crate::state::AppState;

const DEFAULT_TOP_K: i64 = 8;
const DEFAULT_GRAPH_TOP_K: i64 = 50;
const DEFAULT_GRAPH_NEIGHBORS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct TopSkillsQuery {
    pub k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TopSkillsResponse {
    pub role_id: i64,
    pub skills: Vec<RankedSkill>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub top_k: Option<i64>,
    pub neighbors: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NeighborsQuery {
    pub relation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NeighborsResponse {
    pub skill: String,
    pub relation: Relation,
    pub neighbors: Vec<String>,
}

/// GET /api/v1/roles/:id/skills?k=
pub async fn handle_top_skills(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(params): Query<TopSkillsQuery>,
) -> Result<Json<TopSkillsResponse>, AppError> {
    let k = params.k.unwrap_or(DEFAULT_TOP_K);
    if k <= 0 {
        return Err(AppError::Validation("k must be positive".to_string()));
    }
    ensure_role_exists(&state, role_id).await?;

    let skills = query::top_k_skills_for_role(&state.db, role_id, k).await?;
    Ok(Json(TopSkillsResponse { role_id, skills }))
}

/// GET /api/v1/roles/:id/graph?top_k=&neighbors=
pub async fn handle_role_graph(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Query(params): Query<GraphQuery>,
) -> Result<Json<RoleSkillGraph>, AppError> {
    let top_k = params.top_k.unwrap_or(DEFAULT_GRAPH_TOP_K).max(1);
    let neighbors = params.neighbors.unwrap_or(DEFAULT_GRAPH_NEIGHBORS).max(0);
    ensure_role_exists(&state, role_id).await?;

    let graph = query::build_role_skill_graph(&state.db, role_id, top_k, neighbors).await?;
    Ok(Json(graph))
}

/// GET /api/v1/skills/:name/neighbors?relation=
///
/// Defaults to `related_to`.
pub async fn handle_skill_neighbors(
    State(state): State<AppState>,
    Path(skill): Path<String>,
    Query(params): Query<NeighborsQuery>,
) -> Result<Json<NeighborsResponse>, AppError> {
    let relation = match params.relation.as_deref() {
        Some(raw) => raw.parse::<Relation>().map_err(AppError::Validation)?,
        None => Relation::RelatedTo,
    };

    let neighbors = query::neighbors(&state.db, &skill, relation).await?;
    Ok(Json(NeighborsResponse {
        skill,
        relation,
        neighbors,
    }))
}

pub(crate) async fn ensure_role_exists(state: &AppState, role_id: i64) -> Result<String, AppError> {
    query::role_name(&state.db, role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role {role_id} not found")))
}
