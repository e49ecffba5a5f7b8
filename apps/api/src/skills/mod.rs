// Skill graph: LLM inference from a parsed JD, persistence into the
// role/skill/tool tables, and read-side queries used by crawl and packaging.

pub mod handlers;
pub mod models;
pub mod persist;
pub mod prompts;
pub mod query;

use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::parsing::ParsedJobDescription;
use models::{Relation, SkillCategory, SkillGraph};
use prompts::{SKILL_GRAPH_PROMPT_TEMPLATE, SKILL_GRAPH_SYSTEM};

/// Asks the LLM for a skill graph of the role described by `parsed` / `jd_text`.
pub async fn infer_skill_graph(
    parsed: &ParsedJobDescription,
    jd_text: &str,
    llm: &LlmClient,
) -> Result<SkillGraph, AppError> {
    let prompt = build_skill_graph_prompt(parsed, jd_text)?;
    let graph: SkillGraph = llm
        .call_json(&prompt, SKILL_GRAPH_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Skill graph inference failed: {e}")))?;

    let mut graph = graph.normalized();
    if graph.role_title.is_none() && !parsed.job_title.trim().is_empty() {
        graph.role_title = Some(parsed.job_title.trim().to_string());
    }
    info!(
        "Inferred skill graph: {} skills, {} edges",
        graph.skills.len(),
        graph.edges.len()
    );
    Ok(graph)
}

fn build_skill_graph_prompt(
    parsed: &ParsedJobDescription,
    jd_text: &str,
) -> Result<String, AppError> {
    let parsed_json = serde_json::to_string_pretty(parsed)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("serializing parsed JD: {e}")))?;
    let categories: Vec<&str> = SkillCategory::ALL.iter().map(|c| c.as_str()).collect();
    let relations: Vec<&str> = Relation::ALL.iter().map(|r| r.as_str()).collect();

    Ok(SKILL_GRAPH_PROMPT_TEMPLATE
        .replace("{categories}", &json!(categories).to_string())
        .replace("{relations}", &json!(relations).to_string())
        .replace("{parsed_json}", &parsed_json)
        .replace("{jd_text}", jd_text))
}

/// Outcome of the parse → infer → persist pipeline.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredSkillGraph {
    pub role_id: i64,
    pub graph: SkillGraph,
    pub ranked: Vec<(String, f64)>,
}

/// End to end: LLM graph inference followed by transactional persistence.
pub async fn build_and_store_skill_graph(
    parsed: &ParsedJobDescription,
    jd_text: &str,
    llm: &LlmClient,
    pool: &PgPool,
) -> Result<StoredSkillGraph, AppError> {
    let graph = infer_skill_graph(parsed, jd_text, llm).await?;
    let (role_id, ranked) = persist::persist_skill_graph(pool, &graph).await?;
    Ok(StoredSkillGraph {
        role_id,
        graph,
        ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_vocabularies_and_inputs() {
        let parsed = ParsedJobDescription {
            job_title: "ML Engineer".into(),
            skills: vec!["PyTorch".into()],
            ..Default::default()
        };
        let prompt = build_skill_graph_prompt(&parsed, "We train models.").unwrap();
        assert!(prompt.contains(r#""orchestration""#));
        assert!(prompt.contains(r#""co_occurs_with""#));
        assert!(prompt.contains("\"job_title\": \"ML Engineer\""));
        assert!(prompt.ends_with("We train models."));
        assert!(!prompt.contains("{jd_text}"));
    }
}
