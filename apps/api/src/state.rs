use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::crawl::github::GithubListsClient;
use crate::crawl::stackexchange::StackExchangeClient;
use crate::enrich::QuestionClassifier;
use crate::generation::qna::QuestionGenerator;
use crate::llm_client::LlmClient;
use crate::retrieval::embeddings::EmbeddingBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub config: Config,
    /// Embedding backend used to rank package candidates.
    pub embedder: Arc<dyn EmbeddingBackend>,
    /// Suitability gate and type/difficulty classifier. Default: LlmClassifier.
    pub classifier: Arc<dyn QuestionClassifier>,
    /// Question generator. Default: LlmQuestionGenerator.
    pub generator: Arc<dyn QuestionGenerator>,
    pub stackexchange: StackExchangeClient,
    pub github: GithubListsClient,
}
