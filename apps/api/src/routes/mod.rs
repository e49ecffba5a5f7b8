pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{crawl, enrich, generation, parsing, retrieval, skills};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // JD intake
        .route("/api/v1/jd/parse", post(parsing::handlers::handle_parse_jd))
        .route("/api/v1/jd/upload", post(parsing::handlers::handle_upload_jd))
        // Skill graph
        .route(
            "/api/v1/roles/:id/skills",
            get(skills::handlers::handle_top_skills),
        )
        .route(
            "/api/v1/roles/:id/graph",
            get(skills::handlers::handle_role_graph),
        )
        .route(
            "/api/v1/skills/:name/neighbors",
            get(skills::handlers::handle_skill_neighbors),
        )
        // Question bank
        .route(
            "/api/v1/roles/:id/crawl",
            post(crawl::handlers::handle_crawl_role),
        )
        .route(
            "/api/v1/crawl/github",
            post(crawl::handlers::handle_github_import),
        )
        .route(
            "/api/v1/roles/:id/classify",
            post(enrich::handlers::handle_classify_role),
        )
        .route(
            "/api/v1/roles/:id/generate",
            post(generation::handlers::handle_generate_for_role),
        )
        .route(
            "/api/v1/roles/:id/qna",
            post(generation::handlers::handle_generate_qna),
        )
        // Packaging and views
        .route(
            "/api/v1/roles/:id/package",
            post(generation::handlers::handle_build_package),
        )
        .route(
            "/api/v1/roles/:id/questions",
            get(retrieval::handlers::handle_list_questions),
        )
        .route(
            "/api/v1/roles/:id/availability",
            get(retrieval::handlers::handle_availability),
        )
        .with_state(state)
}
