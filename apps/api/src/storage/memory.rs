//! In-memory `QuestionStore` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::question::{CandidateQuestion, QuestionMeta};
use crate::models::skill::RankedSkill;
use crate::storage::QuestionStore;

#[derive(Default)]
pub struct MemoryStore {
    roles: HashMap<i64, String>,
    role_skills: HashMap<i64, Vec<RankedSkill>>,
    /// Kept in storage order (score desc, id desc).
    questions: Vec<CandidateQuestion>,
    vectors: Mutex<HashMap<i64, Vec<f32>>>,
    meta: Mutex<HashMap<i64, QuestionMeta>>,
    vector_writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role_id: i64, title: &str, skills: &[(&str, f64)]) -> Self {
        self.roles.insert(role_id, title.to_string());
        self.role_skills.insert(
            role_id,
            skills
                .iter()
                .map(|(name, weight)| RankedSkill {
                    name: name.to_string(),
                    weight: *weight,
                })
                .collect(),
        );
        self
    }

    pub fn with_question(mut self, id: i64, title: &str, tags: &[&str]) -> Self {
        self.questions.push(CandidateQuestion {
            id,
            title: title.to_string(),
            body: String::new(),
            url: format!("https://example.test/q/{id}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Adds question `id` with the same url, title, body and tags as `of`.
    pub fn with_duplicate_of(mut self, id: i64, of: i64) -> Self {
        if let Some(original) = self.questions.iter().find(|q| q.id == of).cloned() {
            self.questions.push(CandidateQuestion { id, ..original });
        }
        self
    }

    pub fn with_vector(self, question_id: i64, vector: Vec<f32>) -> Self {
        self.vectors
            .lock()
            .unwrap()
            .insert(question_id, vector);
        self
    }

    pub fn vector_writes(&self) -> usize {
        *self.vector_writes.lock().unwrap()
    }

    pub fn stored_meta(&self, question_id: i64) -> Option<QuestionMeta> {
        self.meta.lock().unwrap().get(&question_id).cloned()
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn role_title(&self, role_id: i64) -> Result<Option<String>, AppError> {
        Ok(self.roles.get(&role_id).cloned())
    }

    async fn top_k_skills(&self, role_id: i64, k: i64) -> Result<Vec<RankedSkill>, AppError> {
        let mut skills = self.role_skills.get(&role_id).cloned().unwrap_or_default();
        skills.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        skills.truncate(k.max(0) as usize);
        Ok(skills)
    }

    async fn questions_with_any_tags(
        &self,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<CandidateQuestion>, AppError> {
        let wanted: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        Ok(self
            .questions
            .iter()
            .filter(|q| q.tags.iter().any(|t| wanted.contains(&t.to_lowercase())))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn question_vector(&self, question_id: i64) -> Result<Option<Vec<f32>>, AppError> {
        Ok(self.vectors.lock().unwrap().get(&question_id).cloned())
    }

    async fn upsert_question_vector(
        &self,
        question_id: i64,
        embedding: &[f32],
    ) -> Result<(), AppError> {
        self.vectors
            .lock()
            .unwrap()
            .insert(question_id, embedding.to_vec());
        *self.vector_writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn question_meta(&self, question_id: i64) -> Result<Option<QuestionMeta>, AppError> {
        Ok(self.meta.lock().unwrap().get(&question_id).cloned())
    }

    async fn upsert_question_meta(
        &self,
        question_id: i64,
        meta: &QuestionMeta,
    ) -> Result<(), AppError> {
        self.meta.lock().unwrap().insert(question_id, meta.clone());
        Ok(())
    }
}
