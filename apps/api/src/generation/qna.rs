//! LLM question generation, optionally persisted as `generated` questions.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::prompts::QNA_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{DIFFICULTY_INSTRUCTION, JSON_ONLY_SYSTEM, QUESTION_TYPES_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::models::question::{
    AnswerItem, Difficulty, EvaluationRubric, QuestionItem, QuestionMeta, QuestionType,
    SOURCE_GENERATED,
};
use crate::skills::query::{role_name, top_k_skills_for_role};
use crate::storage::questions::{insert_answer, upsert_question_meta, upsert_question_with_answers};

const GENERATION_TEMPERATURE: f32 = 0.3;
const QNA_TOP_K_SKILLS: i64 = 10;
const TITLE_MAX_CHARS: usize = 200;
pub const DEFAULT_DIFFICULTY_POLICY: &str = "Mixed (let the model balance)";
pub const DEFAULT_CODE_LANG: &str = "Python";

/// What to ask the generator for.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub role_title: String,
    pub skills: Vec<String>,
    pub target_type: QuestionType,
    pub count: usize,
    pub code_lang: String,
    pub difficulty_policy: String,
    pub restrict_difficulty: Option<Difficulty>,
}

impl GenerationRequest {
    pub fn new(role_title: &str, skills: Vec<String>, target_type: QuestionType, count: usize) -> Self {
        Self {
            role_title: role_title.to_string(),
            skills,
            target_type,
            count,
            code_lang: DEFAULT_CODE_LANG.to_string(),
            difficulty_policy: DEFAULT_DIFFICULTY_POLICY.to_string(),
            restrict_difficulty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub evaluation_rubric: EvaluationRubric,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// At most `request.count` questions.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedQuestion>, AppError>;
}

/// Generator backed by the shared LLM client.
#[derive(Clone)]
pub struct LlmQuestionGenerator {
    llm: LlmClient,
}

impl LlmQuestionGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeneratedBatch {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawGenerated {
    #[serde(default)]
    question: String,
    #[serde(rename = "type", default)]
    qtype: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    evaluation_rubric: Option<EvaluationRubric>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedQuestion>, AppError> {
        if request.count == 0 {
            return Ok(Vec::new());
        }
        let batch: GeneratedBatch = self
            .llm
            .call_json_with_temperature(&build_qna_prompt(request), JSON_ONLY_SYSTEM, GENERATION_TEMPERATURE)
            .await
            .map_err(|e| AppError::Llm(format!("Question generation failed: {e}")))?;

        Ok(normalize_batch(batch.items, request))
    }
}

pub(crate) fn build_qna_prompt(request: &GenerationRequest) -> String {
    let skills = if request.skills.is_empty() {
        "software engineering".to_string()
    } else {
        request.skills.join(", ")
    };
    QNA_PROMPT_TEMPLATE
        .replace("{role_title}", &request.role_title)
        .replace("{role_skills}", &skills)
        .replace("{target_type}", request.target_type.as_str())
        .replace("{count}", &request.count.to_string())
        .replace("{code_lang}", &request.code_lang)
        .replace("{difficulty_policy}", &request.difficulty_policy)
        .replace(
            "{restrict_difficulty}",
            request.restrict_difficulty.map(|d| d.as_str()).unwrap_or("None"),
        )
        .replace("{types}", QUESTION_TYPES_INSTRUCTION)
        .replace("{difficulties}", DIFFICULTY_INSTRUCTION)
}

/// Drops malformed or empty items, fills missing labels from the request and
/// caps the batch at the requested count.
fn normalize_batch(items: Vec<Value>, request: &GenerationRequest) -> Vec<GeneratedQuestion> {
    items
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawGenerated>(value) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Dropping malformed generated item: {e}");
                None
            }
        })
        .filter(|raw| !raw.question.trim().is_empty())
        .map(|raw| GeneratedQuestion {
            question: raw.question.trim().to_string(),
            qtype: raw
                .qtype
                .and_then(|t| t.parse().ok())
                .unwrap_or(request.target_type),
            difficulty: request
                .restrict_difficulty
                .or_else(|| raw.difficulty.and_then(|d| d.parse().ok()))
                .unwrap_or(Difficulty::Medium),
            evaluation_rubric: raw.evaluation_rubric.unwrap_or_default(),
            tags: raw.tags,
            answer: raw.answer.filter(|a| !a.trim().is_empty()),
            url: raw.url.filter(|u| !u.trim().is_empty()),
        })
        .take(request.count)
        .collect()
}

/// Knobs for a role-scoped generation batch.
#[derive(Debug, Clone)]
pub struct QnaOptions {
    pub difficulty_policy: String,
    pub code_lang: String,
    pub persist: bool,
    pub restrict_difficulty: Option<Difficulty>,
}

impl Default for QnaOptions {
    fn default() -> Self {
        Self {
            difficulty_policy: DEFAULT_DIFFICULTY_POLICY.to_string(),
            code_lang: DEFAULT_CODE_LANG.to_string(),
            persist: true,
            restrict_difficulty: None,
        }
    }
}

/// A generated question as returned to callers; `id` is set once persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QnaItem {
    pub id: Option<i64>,
    pub question: String,
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    pub difficulty: Difficulty,
    pub evaluation_rubric: EvaluationRubric,
    pub url: String,
    pub tags: Vec<String>,
    pub source: String,
    pub answer: Option<String>,
}

impl QnaItem {
    fn from_generated(item: GeneratedQuestion, id: Option<i64>) -> Self {
        QnaItem {
            id,
            question: item.question,
            qtype: item.qtype,
            difficulty: item.difficulty,
            evaluation_rubric: item.evaluation_rubric,
            url: item.url.unwrap_or_default(),
            tags: item.tags,
            source: SOURCE_GENERATED.to_string(),
            answer: item.answer,
        }
    }
}

/// Generates `count` questions of `target_type` for a role.
///
/// System Design batches are generated as Technical. A generator failure is
/// logged and yields an empty batch; persistence failures are returned.
pub async fn generate_qna_for_role(
    pool: &PgPool,
    generator: &dyn QuestionGenerator,
    role_id: i64,
    target_type: QuestionType,
    count: usize,
    options: &QnaOptions,
) -> Result<Vec<QnaItem>, AppError> {
    let target_type = match target_type {
        QuestionType::SystemDesign => QuestionType::Technical,
        other => other,
    };

    let skills: Vec<String> = top_k_skills_for_role(pool, role_id, QNA_TOP_K_SKILLS)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    let role_title = role_name(pool, role_id)
        .await?
        .or_else(|| skills.first().cloned())
        .unwrap_or_else(|| format!("Role {role_id}"));

    info!(
        "Generating {count} {target_type} questions for role {role_id} ('{role_title}'), restrict={}",
        options.restrict_difficulty.map(|d| d.as_str()).unwrap_or("None")
    );

    let request = GenerationRequest {
        code_lang: options.code_lang.clone(),
        difficulty_policy: options.difficulty_policy.clone(),
        restrict_difficulty: options.restrict_difficulty,
        ..GenerationRequest::new(&role_title, skills, target_type, count)
    };
    let items = match generator.generate(&request).await {
        Ok(items) => items,
        Err(e) => {
            warn!("Generation for role {role_id} failed: {e}");
            return Ok(Vec::new());
        }
    };
    info!("Generator returned {} items", items.len());

    if !options.persist {
        return Ok(items
            .into_iter()
            .map(|item| QnaItem::from_generated(item, None))
            .collect());
    }
    persist_generated(pool, items).await
}

/// Title used for a generated question: its first line, capped.
fn generated_title(question: &str) -> String {
    question
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect()
}

fn to_question_item(item: &GeneratedQuestion) -> QuestionItem {
    QuestionItem {
        source: SOURCE_GENERATED.to_string(),
        external_id: format!("gen_{}", Uuid::new_v4().simple()),
        url: item.url.clone().unwrap_or_default(),
        title: generated_title(&item.question),
        body_markdown: Some(item.question.clone()),
        tags: item.tags.clone(),
        question_type: Some(item.qtype.as_str().to_string()),
        difficulty: Some(item.difficulty.as_str().to_string()),
        created_at: Some(Utc::now()),
        ..Default::default()
    }
}

async fn persist_generated(
    pool: &PgPool,
    items: Vec<GeneratedQuestion>,
) -> Result<Vec<QnaItem>, AppError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let outcome = upsert_question_with_answers(pool, &to_question_item(&item)).await?;
        let meta = QuestionMeta {
            qtype: item.qtype,
            difficulty: item.difficulty,
            evaluation_rubric: item.evaluation_rubric.clone(),
        };
        upsert_question_meta(pool, outcome.id, &meta).await?;

        if let Some(answer) = &item.answer {
            let answer = AnswerItem {
                external_id: format!("gen_{}_ans", Uuid::new_v4().simple()),
                body_markdown: Some(answer.clone()),
                score: 0,
                is_accepted: true,
                created_at: Some(Utc::now()),
                ..Default::default()
            };
            insert_answer(pool, outcome.id, &answer).await?;
        }
        out.push(QnaItem::from_generated(item, Some(outcome.id)));
    }
    info!("Persisted {} generated questions", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_batch(items: &[(&str, &str)]) -> Value {
        json!({
            "items": items
                .iter()
                .map(|(question, qtype)| json!({
                    "question": question,
                    "type": qtype,
                    "difficulty": "Medium",
                    "evaluation_rubric": {"signals": ["clarity"]},
                    "tags": ["rust"]
                }))
                .collect::<Vec<_>>()
        })
    }

    fn request(target: QuestionType, count: usize) -> GenerationRequest {
        GenerationRequest::new("Backend Engineer", vec!["rust".into(), "postgres".into()], target, count)
    }

    #[test]
    fn test_prompt_fills_placeholders() {
        let mut req = request(QuestionType::Coding, 3);
        req.restrict_difficulty = Some(Difficulty::Hard);
        let prompt = build_qna_prompt(&req);
        assert!(prompt.contains("Role: Backend Engineer"));
        assert!(prompt.contains("Top role skills/tags: rust, postgres"));
        assert!(prompt.contains("Target round: Coding"));
        assert!(prompt.contains("Requested count: 3"));
        assert!(prompt.contains("Restrict difficulty: Hard"));
        assert!(prompt.contains("Use Python terminology"));
        assert!(!prompt.contains("{types}"));
    }

    #[test]
    fn test_prompt_defaults_skills_when_none_known() {
        let req = GenerationRequest::new("Role 4", vec![], QuestionType::Technical, 1);
        assert!(build_qna_prompt(&req).contains("Top role skills/tags: software engineering"));
    }

    #[test]
    fn test_normalize_fills_labels_and_caps_count() {
        let items = vec![
            json!({"question": "Q1", "type": "coding", "difficulty": "EASY"}),
            json!({"question": "  ", "type": "Coding"}),
            json!({"question": "Q2", "type": "Trivia"}),
            json!({"question": "Q3"}),
            json!(42),
        ];
        let out = normalize_batch(items, &request(QuestionType::Technical, 2));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].qtype, QuestionType::Coding);
        assert_eq!(out[0].difficulty, Difficulty::Easy);
        assert_eq!(out[1].question, "Q2");
        assert_eq!(out[1].qtype, QuestionType::Technical);
        assert_eq!(out[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_normalize_enforces_restricted_difficulty() {
        let mut req = request(QuestionType::Behavioral, 5);
        req.restrict_difficulty = Some(Difficulty::Easy);
        let out = normalize_batch(
            vec![json!({"question": "Tell me about a conflict", "difficulty": "Hard"})],
            &req,
        );
        assert_eq!(out[0].difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_generated_title_is_first_line_capped() {
        assert_eq!(generated_title("First line\nsecond"), "First line");
        assert_eq!(generated_title(&"x".repeat(300)).chars().count(), 200);
    }

    #[test]
    fn test_question_item_shape() {
        let item = GeneratedQuestion {
            question: "Design a rate limiter\nfor an API gateway".into(),
            qtype: QuestionType::Technical,
            difficulty: Difficulty::Hard,
            evaluation_rubric: EvaluationRubric::default(),
            tags: vec!["system design".into()],
            answer: None,
            url: None,
        };
        let q = to_question_item(&item);
        assert_eq!(q.source, "generated");
        assert!(q.external_id.starts_with("gen_"));
        assert_eq!(q.title, "Design a rate limiter");
        assert_eq!(q.body_markdown.as_deref(), Some(item.question.as_str()));
        assert_eq!(q.question_type.as_deref(), Some("Technical"));
        assert!(q.hash.is_none());
        assert!(q.answers.is_empty());
    }

    #[tokio::test]
    async fn test_llm_generator_reads_items_from_reply() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let reply = sample_batch(&[("What is ownership?", "Technical"), ("Explain Send", "Technical")]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": reply.to_string()}],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            })))
            .mount(&server)
            .await;

        let llm = LlmClient::with_api_url("k".into(), server.uri()).unwrap();
        let out = LlmQuestionGenerator::new(llm)
            .generate(&request(QuestionType::Technical, 5))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].evaluation_rubric.signals, vec!["clarity".to_string()]);
        assert_eq!(out[1].tags, vec!["rust".to_string()]);
    }
}
