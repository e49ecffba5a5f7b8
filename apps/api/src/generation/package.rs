//! Interview package assembly.
//!
//! Flow: top skills → tagged candidates → embeddings (cached) → cosine rank →
//! suitability gate → per-type stats → quota pass → top-up pass → generated
//! fallback for whatever is still missing.
//!
//! A failing gate keeps the question. A failing classification leaves the
//! question out of the per-type counts; the pick passes try it again and skip
//! it only if that attempt fails too.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::enrich::{ensure_meta, QuestionClassifier};
use crate::errors::AppError;
use crate::generation::qna::{GenerationRequest, QuestionGenerator};
use crate::models::question::{
    CandidateQuestion, Difficulty, EvaluationRubric, QuestionMeta, QuestionType,
};
use crate::models::skill::RankedSkill;
use crate::retrieval::embeddings::{EmbeddingBackend, EmbeddingError};
use crate::retrieval::similarity::rank_by_similarity;
use crate::storage::QuestionStore;

pub const PACKAGE_TOP_K_SKILLS: i64 = 8;
pub const CANDIDATE_LIMIT: i64 = 1200;
/// Gated candidates classified up front to report per-type availability.
pub const STATS_CLASSIFY_LIMIT: usize = 400;
pub const DEFAULT_TOTAL: usize = 5;

/// `{Behavioral: 1, Technical: 2, Coding: 1, System Design: 1}`
pub fn default_per_type_target() -> BTreeMap<QuestionType, usize> {
    BTreeMap::from([
        (QuestionType::Behavioral, 1),
        (QuestionType::Technical, 2),
        (QuestionType::Coding, 1),
        (QuestionType::SystemDesign, 1),
    ])
}

// ────────────────────────────────────────────────────────────────────────────
// Distribution
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    /// Strict mode and the counts matched the total.
    StrictOk,
    Ok,
    /// Counts were short; the remainder was spread over the types.
    Filled,
    /// Counts exceeded the total; the total was raised to match.
    Raised,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDistribution {
    pub counts: BTreeMap<QuestionType, usize>,
    pub total: usize,
    pub status: DistributionStatus,
}

/// Reconciles a requested total with per-type counts.
///
/// Strict mode rejects any mismatch. Flexible mode spreads a shortfall
/// evenly over the requested types, earlier types taking any remainder (every
/// type when none were given), and raises the total when the counts exceed it.
pub fn resolve_distribution(
    total: usize,
    dist: &BTreeMap<QuestionType, usize>,
    flexible: bool,
) -> Result<ResolvedDistribution, AppError> {
    let mut counts = dist.clone();
    let sum = counts
        .values()
        .try_fold(0usize, |acc, n| acc.checked_add(*n))
        .ok_or_else(|| AppError::Validation("Per-type counts are too large.".to_string()))?;

    if !flexible {
        if sum != total {
            return Err(AppError::Validation(format!(
                "Counts ({sum}) do not equal total ({total})."
            )));
        }
        return Ok(ResolvedDistribution {
            counts,
            total,
            status: DistributionStatus::StrictOk,
        });
    }

    if sum == total {
        return Ok(ResolvedDistribution {
            counts,
            total,
            status: DistributionStatus::Ok,
        });
    }
    if sum > total {
        return Ok(ResolvedDistribution {
            counts,
            total: sum,
            status: DistributionStatus::Raised,
        });
    }

    let keys: Vec<QuestionType> = if counts.is_empty() {
        QuestionType::ALL.to_vec()
    } else {
        counts.keys().copied().collect()
    };
    let shortfall = total - sum;
    let (each, extra) = (shortfall / keys.len(), shortfall % keys.len());
    for (i, key) in keys.iter().enumerate() {
        *counts.entry(*key).or_insert(0) += each + usize::from(i < extra);
    }
    Ok(ResolvedDistribution {
        counts,
        total,
        status: DistributionStatus::Filled,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Package
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub role_id: i64,
    pub total: usize,
    pub per_type_target: BTreeMap<QuestionType, usize>,
    pub allow_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Retrieved,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageItem {
    pub question: String,
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    pub difficulty: Difficulty,
    pub evaluation_rubric: EvaluationRubric,
    pub source: ItemSource,
    pub url: Option<String>,
    pub tags: Vec<String>,
}

impl PackageItem {
    fn retrieved(question: &CandidateQuestion, meta: &QuestionMeta) -> Self {
        PackageItem {
            question: question.display_text(),
            qtype: meta.qtype,
            difficulty: meta.difficulty,
            evaluation_rubric: meta.evaluation_rubric.clone(),
            source: ItemSource::Retrieved,
            url: Some(question.url.clone()),
            tags: question.tags.clone(),
        }
    }

    fn same_as(&self, other: &PackageItem) -> bool {
        self.url == other.url && self.question == other.question
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageStats {
    pub requested_total: usize,
    pub per_type_target: BTreeMap<QuestionType, usize>,
    pub candidates: usize,
    pub after_gate: usize,
    pub per_type_available: BTreeMap<QuestionType, usize>,
    pub produced: usize,
    pub shortfall: usize,
}

impl PackageStats {
    fn new(request: &PackageRequest) -> Self {
        PackageStats {
            requested_total: request.total,
            per_type_target: request.per_type_target.clone(),
            candidates: 0,
            after_gate: 0,
            per_type_available: QuestionType::ALL.iter().map(|t| (*t, 0)).collect(),
            produced: 0,
            shortfall: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewPackage {
    pub role_id: i64,
    pub package: Vec<PackageItem>,
    pub stats: PackageStats,
}

/// The collaborators a package build talks to.
#[derive(Clone, Copy)]
pub struct PackageDeps<'a> {
    pub store: &'a dyn QuestionStore,
    pub embedder: &'a dyn EmbeddingBackend,
    pub classifier: &'a dyn QuestionClassifier,
    pub generator: &'a dyn QuestionGenerator,
}

/// `Role: <title>\nTop skills: <csv>\nGoal: ...`
pub fn build_query_text(role_title: &str, skills: &[RankedSkill]) -> String {
    let csv = skills
        .iter()
        .take(PACKAGE_TOP_K_SKILLS as usize)
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Role: {role_title}\nTop skills: {csv}\nGoal: find interview questions that assess these."
    )
}

/// Builds an interview package of at most `request.total` questions.
pub async fn build_interview_package(
    deps: PackageDeps<'_>,
    request: &PackageRequest,
) -> Result<InterviewPackage, AppError> {
    let mut stats = PackageStats::new(request);
    let total = request.total;

    let skills = deps
        .store
        .top_k_skills(request.role_id, PACKAGE_TOP_K_SKILLS)
        .await?;
    if skills.is_empty() {
        info!("Role {} has no ranked skills; returning an empty package", request.role_id);
        return Ok(InterviewPackage {
            role_id: request.role_id,
            package: Vec::new(),
            stats,
        });
    }
    let role_title = deps
        .store
        .role_title(request.role_id)
        .await?
        .unwrap_or_else(|| format!("Role {}", request.role_id));

    let tags: Vec<String> = skills.iter().map(|s| s.name.clone()).collect();
    let candidates = deps
        .store
        .questions_with_any_tags(&tags, CANDIDATE_LIMIT)
        .await?;
    stats.candidates = candidates.len();

    let gated = if candidates.is_empty() {
        Vec::new()
    } else {
        let query = embed_one(deps.embedder, build_query_text(&role_title, &skills)).await?;
        let vectors = ensure_vectors(deps, &candidates, query.len()).await?;
        let ranked: Vec<&CandidateQuestion> = rank_by_similarity(&query, &vectors)
            .into_iter()
            .map(|i| &candidates[i])
            .collect();
        gate_candidates(deps.classifier, ranked).await
    };
    stats.after_gate = gated.len();
    info!(
        "Role {}: {} candidates, {} after gate",
        request.role_id, stats.candidates, stats.after_gate
    );

    let mut metas = MetaCache::default();
    for question in gated.iter().take(STATS_CLASSIFY_LIMIT) {
        if let Some(meta) = metas.get(deps, question).await {
            *stats.per_type_available.entry(meta.qtype).or_insert(0) += 1;
        }
    }

    let mut picked: Vec<PackageItem> = Vec::new();

    // Quota pass: only types still under their target.
    let mut counts: BTreeMap<QuestionType, usize> = BTreeMap::new();
    for question in &gated {
        if picked.len() >= total {
            break;
        }
        let Some(meta) = metas.get(deps, question).await else {
            continue;
        };
        let have = counts.get(&meta.qtype).copied().unwrap_or(0);
        let want = request.per_type_target.get(&meta.qtype).copied().unwrap_or(0);
        if have >= want {
            continue;
        }
        let item = PackageItem::retrieved(question, &meta);
        if picked.iter().any(|p| p.same_as(&item)) {
            continue;
        }
        picked.push(item);
        *counts.entry(meta.qtype).or_insert(0) += 1;
    }

    // Top-up pass: any type.
    for question in &gated {
        if picked.len() >= total {
            break;
        }
        let Some(meta) = metas.get(deps, question).await else {
            continue;
        };
        let item = PackageItem::retrieved(question, &meta);
        if !picked.iter().any(|p| p.same_as(&item)) {
            picked.push(item);
        }
    }

    if picked.len() < total && request.allow_fallback {
        let names: Vec<String> = skills
            .iter()
            .take(PACKAGE_TOP_K_SKILLS as usize)
            .map(|s| s.name.clone())
            .collect();
        generate_shortfall(deps.generator, request, &role_title, &names, &mut picked).await;
    }

    picked.truncate(total);
    stats.produced = picked.len();
    stats.shortfall = total.saturating_sub(picked.len());
    info!(
        "Role {}: package of {} ({} short)",
        request.role_id, stats.produced, stats.shortfall
    );

    Ok(InterviewPackage {
        role_id: request.role_id,
        package: picked,
        stats,
    })
}

async fn embed_one(embedder: &dyn EmbeddingBackend, text: String) -> Result<Vec<f32>, AppError> {
    let vector = embedder
        .embed_texts(&[text])
        .await?
        .into_iter()
        .next()
        .ok_or(EmbeddingError::MissingEmbedding)?;
    Ok(vector)
}

/// One vector per candidate, in candidate order. Missing vectors and vectors
/// whose dimension differs from the query are embedded in a single batch and
/// written back.
async fn ensure_vectors(
    deps: PackageDeps<'_>,
    candidates: &[CandidateQuestion],
    dim: usize,
) -> Result<Vec<Vec<f32>>, AppError> {
    let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(candidates.len());
    let mut missing: Vec<usize> = Vec::new();
    for (i, question) in candidates.iter().enumerate() {
        match deps.store.question_vector(question.id).await? {
            Some(v) if v.len() == dim => vectors.push(Some(v)),
            _ => {
                vectors.push(None);
                missing.push(i);
            }
        }
    }

    if !missing.is_empty() {
        debug!("Embedding {} uncached candidates", missing.len());
        let texts: Vec<String> = missing
            .iter()
            .map(|&i| candidates[i].display_text())
            .collect();
        let fresh = deps.embedder.embed_texts(&texts).await?;
        if fresh.len() != missing.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: missing.len(),
                actual: fresh.len(),
            }
            .into());
        }
        for (&i, vector) in missing.iter().zip(fresh) {
            deps.store
                .upsert_question_vector(candidates[i].id, &vector)
                .await?;
            vectors[i] = Some(vector);
        }
    }

    Ok(vectors.into_iter().map(Option::unwrap_or_default).collect())
}

/// Keeps candidates the gate accepts, in the given order. A gate error keeps
/// the candidate.
async fn gate_candidates<'q>(
    classifier: &dyn QuestionClassifier,
    ranked: Vec<&'q CandidateQuestion>,
) -> Vec<&'q CandidateQuestion> {
    let mut gated = Vec::with_capacity(ranked.len());
    for question in ranked {
        match classifier
            .gate(question.title.trim(), question.body.trim())
            .await
        {
            Ok(verdict) if !verdict.is_interview => {
                debug!("Gate rejected question {}: {}", question.id, verdict.reason);
            }
            Ok(_) => gated.push(question),
            Err(e) => {
                warn!("Gate failed for question {}, keeping it: {e}", question.id);
                gated.push(question);
            }
        }
    }
    gated
}

/// Per-build memo of classifier results. Only successes are kept, so a
/// question that failed while counting is classified again when picking.
#[derive(Default)]
struct MetaCache {
    entries: HashMap<i64, QuestionMeta>,
}

impl MetaCache {
    async fn get(
        &mut self,
        deps: PackageDeps<'_>,
        question: &CandidateQuestion,
    ) -> Option<QuestionMeta> {
        if let Some(cached) = self.entries.get(&question.id) {
            return Some(cached.clone());
        }
        match ensure_meta(deps.store, deps.classifier, question).await {
            Ok(meta) => {
                self.entries.insert(question.id, meta.clone());
                Some(meta)
            }
            Err(e) => {
                warn!("Classification failed for question {}, skipping: {e}", question.id);
                None
            }
        }
    }
}

/// Appends generated items until `picked` reaches the requested total:
/// most-underfilled types first, then the first requested type for any
/// remainder. Generator failures leave the shortfall in place.
async fn generate_shortfall(
    generator: &dyn QuestionGenerator,
    request: &PackageRequest,
    role_title: &str,
    skills: &[String],
    picked: &mut Vec<PackageItem>,
) {
    let mut needs: Vec<(QuestionType, usize)> = request
        .per_type_target
        .iter()
        .map(|(qtype, want)| {
            let have = picked.iter().filter(|p| p.qtype == *qtype).count();
            (*qtype, want.saturating_sub(have))
        })
        .collect();
    needs.sort_by(|a, b| b.1.cmp(&a.1));

    for (qtype, need) in needs {
        let shortfall = request.total.saturating_sub(picked.len());
        if shortfall == 0 {
            return;
        }
        let count = need.min(shortfall);
        if count > 0 {
            generate_into(generator, role_title, skills, qtype, count, picked).await;
        }
    }

    let shortfall = request.total.saturating_sub(picked.len());
    if shortfall > 0 {
        let qtype = request
            .per_type_target
            .keys()
            .next()
            .copied()
            .unwrap_or(QuestionType::Technical);
        generate_into(generator, role_title, skills, qtype, shortfall, picked).await;
    }
}

async fn generate_into(
    generator: &dyn QuestionGenerator,
    role_title: &str,
    skills: &[String],
    qtype: QuestionType,
    count: usize,
    picked: &mut Vec<PackageItem>,
) {
    let request = GenerationRequest::new(role_title, skills.to_vec(), qtype, count);
    match generator.generate(&request).await {
        Ok(items) => {
            debug!("Generated {} {qtype} fallback questions", items.len());
            picked.extend(items.into_iter().take(count).map(|g| PackageItem {
                question: g.question,
                qtype: g.qtype,
                difficulty: g.difficulty,
                evaluation_rubric: g.evaluation_rubric,
                source: ItemSource::Generated,
                url: None,
                tags: Vec::new(),
            }));
        }
        Err(e) => warn!("Fallback generation of {count} {qtype} questions failed: {e}"),
    }
}
