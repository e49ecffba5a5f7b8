//! normalize → hash → upsert, plus the role-aware crawl driver.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use crate::config::CrawlSettings;
use crate::crawl::stackexchange::{FetchRequest, StackExchangeClient};
use crate::errors::AppError;
use crate::models::question::QuestionItem;
use crate::progress::Progress;
use crate::skills::query::top_k_skills_for_role;
use crate::storage::questions::{content_hash, upsert_question_with_answers};

/// Skills used to steer the crawl.
pub const CRAWL_TOP_K_SKILLS: i64 = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistSummary {
    pub upserted: usize,
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteCrawl {
    pub fetched: usize,
    pub upserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub role_id: i64,
    pub skills: Vec<String>,
    pub by_site: BTreeMap<String, SiteCrawl>,
    pub upserted: usize,
    pub skipped: usize,
}

/// Fills in the content hash when the item has none.
pub fn with_hash(mut item: QuestionItem) -> QuestionItem {
    if item.hash.is_none() {
        item.hash = Some(content_hash(&item.title, item.body_markdown.as_deref()));
    }
    item
}

/// Upserts each item; a failed upsert is logged and counted as skipped.
pub async fn persist_questions(pool: &PgPool, items: Vec<QuestionItem>) -> PersistSummary {
    let mut summary = PersistSummary::default();
    for item in items.into_iter().map(with_hash) {
        match upsert_question_with_answers(pool, &item).await {
            Ok(outcome) => {
                summary.upserted += 1;
                if outcome.created {
                    summary.created += 1;
                }
            }
            Err(e) => {
                warn!(
                    "Skipping {}:{} after upsert failure: {e}",
                    item.source, item.external_id
                );
                summary.skipped += 1;
            }
        }
    }
    summary
}

/// Crawls every configured site for the role's top skills and persists the
/// results. Sites are processed one after another.
pub async fn crawl_for_role(
    pool: &PgPool,
    client: &StackExchangeClient,
    settings: &CrawlSettings,
    role_id: i64,
    progress: &Progress,
) -> Result<CrawlSummary, AppError> {
    let skills: Vec<String> = top_k_skills_for_role(pool, role_id, CRAWL_TOP_K_SKILLS)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();

    let mut summary = CrawlSummary {
        role_id,
        skills: skills.clone(),
        ..Default::default()
    };
    if skills.is_empty() {
        progress.emit("[crawl] No skills for this role. Parse a JD and build the skill graph first.");
        return Ok(summary);
    }
    progress.emit(format!("[crawl] Skills: {}", skills.join(", ")));

    for site in &settings.sites {
        progress.emit(format!(
            "[crawl] Fetching {site} (tags_any={skills:?}, q={:?}, pages={}, page_size={})",
            settings.query_hint.as_deref().unwrap_or(""),
            settings.pages,
            settings.page_size
        ));

        let outcome = client
            .fetch(&FetchRequest {
                site: site.clone(),
                pages: settings.pages,
                page_size: settings.page_size,
                tags_any: skills.clone(),
                query: settings.query_hint.clone(),
                with_body: true,
                sleep: Duration::from_millis(settings.sleep_ms),
            })
            .await;

        for error in &outcome.errors {
            progress.emit(format!("[crawl] [{site}] fetch failed: {error}"));
        }

        let fetched = outcome.items.len();
        let persisted = persist_questions(pool, outcome.items).await;
        let site_skipped = persisted.skipped + outcome.errors.len();

        progress.emit(format!(
            "[crawl] [{site}] upserted: {} (skipped {site_skipped})",
            persisted.upserted
        ));
        summary.upserted += persisted.upserted;
        summary.skipped += site_skipped;
        summary.by_site.insert(
            site.clone(),
            SiteCrawl {
                fetched,
                upserted: persisted.upserted,
                skipped: site_skipped,
            },
        );
    }

    progress.emit(format!("[crawl] Done. Total upserted: {}", summary.upserted));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hash_computes_missing_hash() {
        let item = with_hash(QuestionItem {
            title: "What is a mutex?".into(),
            body_markdown: Some("Explain.".into()),
            ..Default::default()
        });
        assert_eq!(
            item.hash.as_deref(),
            Some(content_hash("What is a mutex?", Some("Explain.")).as_str())
        );
    }

    #[test]
    fn test_with_hash_keeps_existing_hash() {
        let item = with_hash(QuestionItem {
            title: "Anything".into(),
            hash: Some("fixed".into()),
            ..Default::default()
        });
        assert_eq!(item.hash.as_deref(), Some("fixed"));
    }
}
