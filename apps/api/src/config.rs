use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::models::question::QuestionType;

const DEFAULT_CRAWL_SITES: &str = "stackoverflow,softwareengineering,dba,datascience,ai";
const DEFAULT_GEN_COUNTS: &str = r#"{"Technical":10,"Coding":10,"Behavioral":10}"#;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub stackexchange_key: Option<String>,
    pub crawl: CrawlSettings,
    /// Per-type batch sizes for the "generate with the LLM" flow.
    pub llm_gen_counts: BTreeMap<QuestionType, usize>,
    pub port: u16,
    pub rust_log: String,
}

/// Defaults for the role-aware crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub sites: Vec<String>,
    pub pages: u32,
    pub page_size: u32,
    pub query_hint: Option<String>,
    pub sleep_ms: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            sites: split_sites(DEFAULT_CRAWL_SITES),
            pages: 2,
            page_size: 50,
            query_hint: Some("interview".to_string()),
            sleep_ms: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let embedding_api_key = std::env::var("EMBEDDING_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        if embedding_api_key.is_empty() {
            tracing::warn!("EMBEDDING_API_KEY / OPENAI_API_KEY not set; package building will fail");
        }

        let query_hint = optional_env("CRAWL_QUERY_HINT").unwrap_or_else(|| "interview".to_string());

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            embedding_api_key,
            embedding_model: optional_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_base_url: optional_env("EMBEDDING_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            stackexchange_key: optional_env("STACKEXCHANGE_KEY"),
            crawl: CrawlSettings {
                sites: split_sites(
                    &optional_env("CRAWL_SITES").unwrap_or_else(|| DEFAULT_CRAWL_SITES.to_string()),
                ),
                pages: parse_env("CRAWL_PAGES", 2)?,
                page_size: parse_env("CRAWL_PAGE_SIZE", 50)?,
                query_hint: Some(query_hint).filter(|q| !q.trim().is_empty()),
                sleep_ms: parse_env("CRAWL_SLEEP_MS", 200)?,
            },
            llm_gen_counts: parse_gen_counts(
                &optional_env("LLM_GEN_COUNTS").unwrap_or_else(|| DEFAULT_GEN_COUNTS.to_string()),
            )?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn split_sites(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `{"Technical":10,"Coding":10}` into typed per-category counts.
pub fn parse_gen_counts(raw: &str) -> Result<BTreeMap<QuestionType, usize>> {
    let parsed: BTreeMap<String, usize> =
        serde_json::from_str(raw).context("LLM_GEN_COUNTS must be a JSON object of counts")?;

    parsed
        .into_iter()
        .map(|(name, count)| {
            let qtype = name
                .parse::<QuestionType>()
                .map_err(|e| anyhow::anyhow!("LLM_GEN_COUNTS: {e}"))?;
            Ok((qtype, count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sites_trims_and_drops_empty() {
        assert_eq!(
            split_sites(" stackoverflow, ,dba ,"),
            vec!["stackoverflow".to_string(), "dba".to_string()]
        );
    }

    #[test]
    fn test_default_gen_counts_parse() {
        let counts = parse_gen_counts(DEFAULT_GEN_COUNTS).unwrap();
        assert_eq!(counts.get(&QuestionType::Technical), Some(&10));
        assert_eq!(counts.get(&QuestionType::Behavioral), Some(&10));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_gen_counts_reject_unknown_type() {
        assert!(parse_gen_counts(r#"{"Trivia": 3}"#).is_err());
    }

    #[test]
    fn test_crawl_defaults() {
        let crawl = CrawlSettings::default();
        assert_eq!(crawl.sites.len(), 5);
        assert_eq!(crawl.pages, 2);
        assert_eq!(crawl.query_hint.as_deref(), Some("interview"));
    }
}
