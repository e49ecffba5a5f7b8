//! Enrichment: the interview-suitability gate and the cached
//! type/difficulty/rubric classifier.
//!
//! Both calls sit behind `QuestionClassifier` so the package builder can be
//! exercised without a model. `LlmClassifier` is the production backend.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{DIFFICULTY_INSTRUCTION, JSON_ONLY_SYSTEM, QUESTION_TYPES_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::question::{CandidateQuestion, QuestionMeta, QuestionType};
use crate::progress::Progress;
use crate::retrieval::availability::{
    relevant_question_ids_for_role, RELEVANCE_LIMIT, RELEVANCE_TOP_K,
};
use crate::storage::{questions, QuestionStore};

pub mod handlers;
pub mod prompts;

use prompts::{CLASSIFY_PROMPT_TEMPLATE, GATE_PROMPT_TEMPLATE};

pub const DEFAULT_CLASSIFY_BATCH: usize = 25;
const DEFAULT_RUBRIC_SCORING: &str = "0-5 rubric";

/// Gate verdict for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suitability {
    pub is_interview: bool,
    #[serde(default, deserialize_with = "lenient_type")]
    pub suggested_type: Option<QuestionType>,
    #[serde(default)]
    pub reason: String,
}

// An unrecognised suggestion should not turn a usable verdict into a failure.
fn lenient_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<QuestionType>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[async_trait]
pub trait QuestionClassifier: Send + Sync {
    async fn gate(&self, title: &str, body: &str) -> Result<Suitability, AppError>;

    async fn classify(&self, title: &str, body: &str) -> Result<QuestionMeta, AppError>;
}

/// Classifier backed by the shared LLM client.
#[derive(Clone)]
pub struct LlmClassifier {
    llm: LlmClient,
}

impl LlmClassifier {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QuestionClassifier for LlmClassifier {
    async fn gate(&self, title: &str, body: &str) -> Result<Suitability, AppError> {
        interview_gate(&self.llm, title, body).await
    }

    async fn classify(&self, title: &str, body: &str) -> Result<QuestionMeta, AppError> {
        classify_question(&self.llm, title, body).await
    }
}

fn type_labels() -> String {
    let labels: Vec<&str> = QuestionType::ALL.iter().map(|t| t.as_str()).collect();
    json!(labels).to_string()
}

fn build_gate_prompt(title: &str, body: &str) -> String {
    GATE_PROMPT_TEMPLATE
        .replace("{types}", &type_labels())
        .replace("{title}", title.trim())
        .replace("{body}", body.trim())
}

fn build_classify_prompt(title: &str, body: &str) -> String {
    CLASSIFY_PROMPT_TEMPLATE
        .replace("{types}", QUESTION_TYPES_INSTRUCTION)
        .replace("{difficulties}", DIFFICULTY_INSTRUCTION)
        .replace("{title}", title.trim())
        .replace("{body}", body.trim())
}

/// Asks whether a crawled question could be put to a candidate as-is.
pub async fn interview_gate(
    llm: &LlmClient,
    title: &str,
    body: &str,
) -> Result<Suitability, AppError> {
    llm.call_json(&build_gate_prompt(title, body), JSON_ONLY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Interview gate failed: {e}")))
}

/// Category, difficulty and rubric for one question.
pub async fn classify_question(
    llm: &LlmClient,
    title: &str,
    body: &str,
) -> Result<QuestionMeta, AppError> {
    let meta: QuestionMeta = llm
        .call_json(&build_classify_prompt(title, body), JSON_ONLY_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Question classification failed: {e}")))?;
    Ok(with_default_scoring(meta))
}

fn with_default_scoring(mut meta: QuestionMeta) -> QuestionMeta {
    if meta.evaluation_rubric.scoring.trim().is_empty() {
        meta.evaluation_rubric.scoring = DEFAULT_RUBRIC_SCORING.to_string();
    }
    meta
}

/// Cached metadata for `question`, classifying and persisting it on first use.
pub async fn ensure_meta(
    store: &dyn QuestionStore,
    classifier: &dyn QuestionClassifier,
    question: &CandidateQuestion,
) -> Result<QuestionMeta, AppError> {
    if let Some(meta) = store.question_meta(question.id).await? {
        return Ok(meta);
    }
    let meta = classifier
        .classify(question.title.trim(), question.body.trim())
        .await?;
    store.upsert_question_meta(question.id, &meta).await?;
    debug!("Classified question {} as {}", question.id, meta.qtype);
    Ok(meta)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifySummary {
    pub role_id: i64,
    pub total: usize,
    pub classified: usize,
    pub skipped: usize,
}

/// Classifies every question relevant to the role that has no metadata yet.
///
/// Questions are handled in `batch_size` chunks with a progress line after each
/// chunk. A missing row or a failed classification counts as skipped.
pub async fn classify_role_questions(
    pool: &PgPool,
    classifier: &dyn QuestionClassifier,
    role_id: i64,
    batch_size: usize,
    max_items: Option<usize>,
    progress: &Progress,
) -> Result<ClassifySummary, AppError> {
    let mut summary = ClassifySummary {
        role_id,
        ..Default::default()
    };

    let ids = relevant_question_ids_for_role(pool, role_id, RELEVANCE_TOP_K, RELEVANCE_LIMIT).await?;
    if ids.is_empty() {
        progress.emit("[classify] No relevant web questions found for this role.");
        return Ok(summary);
    }

    let have_meta: HashSet<i64> = questions::ids_with_meta(pool, &ids)
        .await?
        .into_iter()
        .collect();
    let mut targets: Vec<i64> = ids.into_iter().filter(|id| !have_meta.contains(id)).collect();
    if let Some(max) = max_items {
        targets.truncate(max);
    }
    summary.total = targets.len();
    progress.emit(format!("[classify] Classifying {} web questions…", summary.total));

    let batch_size = batch_size.max(1);
    for (n, chunk) in targets.chunks(batch_size).enumerate() {
        for &question_id in chunk {
            match classify_one(pool, classifier, question_id).await {
                Ok(true) => summary.classified += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!("Skipping question {question_id}: {e}");
                    summary.skipped += 1;
                }
            }
        }
        let done = ((n + 1) * batch_size).min(summary.total);
        progress.emit(format!(
            "[classify] …{done}/{} done (classified {}, skipped {})",
            summary.total, summary.classified, summary.skipped
        ));
    }

    progress.emit(format!(
        "[classify] Done. Classified {}, skipped {}.",
        summary.classified, summary.skipped
    ));
    Ok(summary)
}

/// `Ok(false)` when the row has disappeared.
async fn classify_one(
    pool: &PgPool,
    classifier: &dyn QuestionClassifier,
    question_id: i64,
) -> Result<bool, AppError> {
    let Some(question) = questions::get_candidate_question(pool, question_id).await? else {
        return Ok(false);
    };
    let meta = classifier
        .classify(question.title.trim(), question.body.trim())
        .await?;
    questions::upsert_question_meta(pool, question_id, &meta).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::question::{Difficulty, EvaluationRubric};
    use crate::storage::memory::MemoryStore;

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionClassifier for CountingClassifier {
        async fn gate(&self, _title: &str, _body: &str) -> Result<Suitability, AppError> {
            Ok(Suitability {
                is_interview: true,
                suggested_type: None,
                reason: String::new(),
            })
        }

        async fn classify(&self, _title: &str, _body: &str) -> Result<QuestionMeta, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(QuestionMeta {
                qtype: QuestionType::Coding,
                difficulty: Difficulty::Medium,
                evaluation_rubric: EvaluationRubric::default(),
            })
        }
    }

    #[test]
    fn test_gate_prompt_lists_types_and_question() {
        let prompt = build_gate_prompt(" What is a mutex? ", "Explain.");
        assert!(prompt.contains(r#"["Behavioral","Technical","Coding","System Design"]"#));
        assert!(prompt.contains("What is a mutex?\n"));
        assert!(prompt.contains("```Explain.```"));
    }

    #[test]
    fn test_classify_prompt_fills_every_placeholder() {
        let prompt = build_classify_prompt("Title", "Body");
        for placeholder in ["{types}", "{difficulties}", "{title}", "{body}"] {
            assert!(!prompt.contains(placeholder), "{placeholder} left in prompt");
        }
        assert!(prompt.contains(QUESTION_TYPES_INSTRUCTION));
        assert!(prompt.contains(DIFFICULTY_INSTRUCTION));
    }

    #[test]
    fn test_suitability_tolerates_unknown_or_missing_type() {
        let s: Suitability =
            serde_json::from_str(r#"{"is_interview": true, "suggested_type": "Trivia"}"#).unwrap();
        assert!(s.is_interview);
        assert_eq!(s.suggested_type, None);

        let s: Suitability = serde_json::from_str(
            r#"{"is_interview": false, "suggested_type": "system design", "reason": "opinion"}"#,
        )
        .unwrap();
        assert_eq!(s.suggested_type, Some(QuestionType::SystemDesign));
        assert_eq!(s.reason, "opinion");
    }

    #[test]
    fn test_empty_scoring_gets_default() {
        let meta: QuestionMeta =
            serde_json::from_str(r#"{"qtype": "Technical", "difficulty": "Easy"}"#).unwrap();
        assert_eq!(with_default_scoring(meta).evaluation_rubric.scoring, "0-5 rubric");
    }

    #[tokio::test]
    async fn test_ensure_meta_classifies_once() {
        let store = MemoryStore::new().with_question(1, "Reverse a list", &["python"]);
        let question = store
            .questions_with_any_tags(&["python".to_string()], 10)
            .await
            .unwrap()
            .remove(0);
        let classifier = CountingClassifier {
            calls: AtomicUsize::new(0),
        };

        let first = ensure_meta(&store, &classifier, &question).await.unwrap();
        let second = ensure_meta(&store, &classifier, &question).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stored_meta(1).map(|m| m.qtype), Some(QuestionType::Coding));
    }
}

#[cfg(test)]
mod llm_tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn anthropic_reply(text: &str) -> serde_json::Value {
        json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn test_llm_classifier_parses_fenced_meta() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply(
                "```json\n{\"qtype\": \"System Design\", \"difficulty\": \"Hard\", \
                 \"evaluation_rubric\": {\"signals\": [\"sharding\"]}}\n```",
            )))
            .mount(&server)
            .await;

        let llm = LlmClient::with_api_url("test-key".into(), server.uri()).unwrap();
        let meta = LlmClassifier::new(llm)
            .classify("Design a URL shortener", "")
            .await
            .unwrap();
        assert_eq!(meta.qtype, QuestionType::SystemDesign);
        assert_eq!(meta.evaluation_rubric.signals, vec!["sharding".to_string()]);
        assert_eq!(meta.evaluation_rubric.scoring, "0-5 rubric");
    }

    #[tokio::test]
    async fn test_llm_gate_reports_malformed_output_as_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply("maybe?")))
            .mount(&server)
            .await;

        let llm = LlmClient::with_api_url("test-key".into(), server.uri()).unwrap();
        let err = LlmClassifier::new(llm).gate("Title", "Body").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
