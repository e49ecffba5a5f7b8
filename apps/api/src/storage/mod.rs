//! Storage seam for the package builder.
//!
//! The builder only needs a handful of reads and two caches, so it talks to a
//! `QuestionStore` rather than a pool. `PgStore` is the production backend;
//! tests use the in-memory store in `memory`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::question::{CandidateQuestion, QuestionMeta};
use crate::models::skill::RankedSkill;
use crate::skills::query;

#[cfg(test)]
pub mod memory;
pub mod questions;

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn role_title(&self, role_id: i64) -> Result<Option<String>, AppError>;

    /// Top `k` skills by weight desc, name asc.
    async fn top_k_skills(&self, role_id: i64, k: i64) -> Result<Vec<RankedSkill>, AppError>;

    async fn questions_with_any_tags(
        &self,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<CandidateQuestion>, AppError>;

    async fn question_vector(&self, question_id: i64) -> Result<Option<Vec<f32>>, AppError>;

    async fn upsert_question_vector(
        &self,
        question_id: i64,
        embedding: &[f32],
    ) -> Result<(), AppError>;

    async fn question_meta(&self, question_id: i64) -> Result<Option<QuestionMeta>, AppError>;

    async fn upsert_question_meta(
        &self,
        question_id: i64,
        meta: &QuestionMeta,
    ) -> Result<(), AppError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn role_title(&self, role_id: i64) -> Result<Option<String>, AppError> {
        Ok(query::role_name(&self.pool, role_id).await?)
    }

    async fn top_k_skills(&self, role_id: i64, k: i64) -> Result<Vec<RankedSkill>, AppError> {
        Ok(query::top_k_skills_for_role(&self.pool, role_id, k).await?)
    }

    async fn questions_with_any_tags(
        &self,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<CandidateQuestion>, AppError> {
        Ok(questions::get_questions_with_any_tags(&self.pool, tags, limit).await?)
    }

    async fn question_vector(&self, question_id: i64) -> Result<Option<Vec<f32>>, AppError> {
        Ok(questions::get_question_vector(&self.pool, question_id).await?)
    }

    async fn upsert_question_vector(
        &self,
        question_id: i64,
        embedding: &[f32],
    ) -> Result<(), AppError> {
        Ok(questions::upsert_question_vector(&self.pool, question_id, embedding).await?)
    }

    async fn question_meta(&self, question_id: i64) -> Result<Option<QuestionMeta>, AppError> {
        Ok(questions::get_question_meta(&self.pool, question_id).await?)
    }

    async fn upsert_question_meta(
        &self,
        question_id: i64,
        meta: &QuestionMeta,
    ) -> Result<(), AppError> {
        Ok(questions::upsert_question_meta(&self.pool, question_id, meta).await?)
    }
}
