use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interviewkit_api::config::Config;
use interviewkit_api::crawl::github::GithubListsClient;
use interviewkit_api::crawl::stackexchange::StackExchangeClient;
use interviewkit_api::db::create_pool;
use interviewkit_api::enrich::LlmClassifier;
use interviewkit_api::generation::qna::LlmQuestionGenerator;
use interviewkit_api::llm_client::{self, LlmClient};
use interviewkit_api::retrieval::embeddings::{EmbeddingBackend, OpenAiEmbeddingClient};
use interviewkit_api::routes::build_router;
use interviewkit_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting InterviewKit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client and the services built on it
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let classifier = Arc::new(LlmClassifier::new(llm.clone()));
    let generator = Arc::new(LlmQuestionGenerator::new(llm.clone()));

    // Initialize embeddings
    let embedder = Arc::new(OpenAiEmbeddingClient::new(
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_base_url.clone(),
    )?);
    info!(
        "Embedding backend initialized ({}, model: {})",
        embedder.name(),
        config.embedding_model
    );

    // Initialize crawl clients
    let stackexchange = StackExchangeClient::new(config.stackexchange_key.clone())?;
    let github = GithubListsClient::new()?;
    info!(
        "Crawl clients initialized (sites: {})",
        config.crawl.sites.join(", ")
    );

    // Build app state
    let state = AppState {
        db,
        llm,
        config: config.clone(),
        embedder,
        classifier,
        generator,
        stackexchange,
        github,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
