//! Stack Exchange API client.
//!
//! For each page the fetcher walks a fallback ladder: `search/advanced` with a
//! full-text `q`, then `search/advanced` with `intitle`, then the plain tag
//! listing at `/questions`. A rung is tried only if the previous one failed
//! with an HTTP status error. There is no backoff; pages are spaced by a fixed
//! sleep.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::crawl::{ensure_success, CrawlError};
use crate::models::question::{QuestionItem, SOURCE_STACKEXCHANGE};

pub const DEFAULT_API_BASE: &str = "https://api.stackexchange.com/2.3";
const USER_AGENT: &str = "interviewkit-crawler/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One fetch job: a site, an optional any-of tag list and an optional query.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub site: String,
    pub pages: u32,
    pub page_size: u32,
    /// Each tag gets its own paginated pass. Empty means one untagged pass.
    pub tags_any: Vec<String>,
    pub query: Option<String>,
    pub with_body: bool,
    pub sleep: Duration,
}

/// Items gathered by a fetch plus the passes that had to be abandoned.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<QuestionItem>,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    items: Vec<ApiQuestion>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiQuestion {
    question_id: i64,
    link: Option<String>,
    title: Option<String>,
    body_markdown: Option<String>,
    body: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    creation_date: Option<i64>,
    #[serde(default)]
    score: i64,
}

impl From<ApiQuestion> for QuestionItem {
    fn from(q: ApiQuestion) -> Self {
        QuestionItem {
            source: SOURCE_STACKEXCHANGE.to_string(),
            external_id: q.question_id.to_string(),
            url: q.link.unwrap_or_default(),
            title: q.title.unwrap_or_default(),
            body_markdown: q.body_markdown.or_else(|| q.body.clone()),
            body_html: q.body,
            tags: q.tags,
            created_at: Some(epoch_to_utc(q.creation_date.unwrap_or(0))),
            score: q.score,
            ..Default::default()
        }
    }
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct StackExchangeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl StackExchangeClient {
    pub fn new(api_key: Option<String>) -> Result<Self, CrawlError> {
        Self::with_base_url(api_key, DEFAULT_API_BASE.to_string())
    }

    /// Points the client at a different API root (used by tests).
    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Fetches every tag pass of `request`. A page that fails on every rung
    /// ends that tag's pass and is recorded in `errors`; other passes go on.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let tags = normalize_tags(&request.tags_any);
        let passes: Vec<Option<&str>> = if tags.is_empty() {
            vec![None]
        } else {
            tags.iter().map(|t| Some(t.as_str())).collect()
        };
        let query = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        for tag in passes {
            let base = self.base_params(request, tag);

            for page in 1..=request.pages {
                if page > 1 && !request.sleep.is_zero() {
                    tokio::time::sleep(request.sleep).await;
                }
                let mut params = base.clone();
                params.push(("page", page.to_string()));

                match self.fetch_page(&params, query).await {
                    Ok(data) => {
                        debug!(
                            "[{}] tag={:?} page={page}: {} items",
                            request.site,
                            tag,
                            data.items.len()
                        );
                        outcome
                            .items
                            .extend(data.items.into_iter().map(QuestionItem::from));
                        if !data.has_more {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("[{}] tag={:?} page={page} failed: {e}", request.site, tag);
                        outcome.errors.push(format!(
                            "{} tag={} page={page}: {e}",
                            request.site,
                            tag.unwrap_or("-")
                        ));
                        break;
                    }
                }
            }
        }
        outcome
    }

    fn base_params(&self, request: &FetchRequest, tag: Option<&str>) -> Vec<(&'static str, String)> {
        let with_body = request.with_body && self.api_key.is_some();
        let mut params = vec![
            ("order", "desc".to_string()),
            ("sort", "votes".to_string()),
            ("site", request.site.clone()),
            (
                "filter",
                if with_body { "withbody" } else { "default" }.to_string(),
            ),
            ("pagesize", request.page_size.to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }
        if let Some(tag) = tag {
            params.push(("tagged", tag.to_string()));
        }
        params
    }

    async fn fetch_page(
        &self,
        params: &[(&'static str, String)],
        query: Option<&str>,
    ) -> Result<ApiPage, CrawlError> {
        if let Some(query) = query {
            let search_url = format!("{}/search/advanced", self.base_url);

            match self.get_page(&search_url, params, Some(("q", query))).await {
                Err(e) if e.is_status() => debug!("full-text search failed, trying intitle: {e}"),
                other => return other,
            }
            match self.get_page(&search_url, params, Some(("intitle", query))).await {
                Err(e) if e.is_status() => debug!("intitle search failed, trying tag listing: {e}"),
                other => return other,
            }
        }

        let questions_url = format!("{}/questions", self.base_url);
        self.get_page(&questions_url, params, None).await
    }

    async fn get_page(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        extra: Option<(&'static str, &str)>,
    ) -> Result<ApiPage, CrawlError> {
        let mut request = self.client.get(url).query(params);
        if let Some(extra) = extra {
            request = request.query(&[extra]);
        }
        let response = ensure_success(request.send().await?).await?;
        response
            .json::<ApiPage>()
            .await
            .map_err(|e| CrawlError::Decode(e.to_string()))
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(pages: u32, tags: &[&str], query: Option<&str>) -> FetchRequest {
        FetchRequest {
            site: "stackoverflow".into(),
            pages,
            page_size: 2,
            tags_any: tags.iter().map(|t| t.to_string()).collect(),
            query: query.map(str::to_string),
            with_body: true,
            sleep: Duration::ZERO,
        }
    }

    fn page(ids: &[i64], has_more: bool) -> serde_json::Value {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "question_id": id,
                    "link": format!("https://stackoverflow.com/q/{id}"),
                    "title": format!("Question {id}?"),
                    "body": "<p>html body</p>",
                    "tags": ["rust"],
                    "creation_date": 1_700_000_000,
                    "score": 10
                })
            })
            .collect();
        json!({"items": items, "has_more": has_more})
    }

    #[tokio::test]
    async fn test_ladder_falls_back_to_tag_listing_on_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .and(query_param("q", "interview"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad q"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .and(query_param("intitle", "interview"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("tagged", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = StackExchangeClient::with_base_url(None, server.uri()).unwrap();
        let outcome = client.fetch(&request(3, &[" Rust "], Some("interview"))).await;

        assert!(outcome.errors.is_empty());
        let ids: Vec<&str> = outcome.items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_successful_full_text_search_skips_other_rungs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .and(query_param("q", "interview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[7], false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[99], false)))
            .expect(0)
            .mount(&server)
            .await;

        let client = StackExchangeClient::with_base_url(None, server.uri()).unwrap();
        let outcome = client.fetch(&request(1, &["rust"], Some("interview"))).await;
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].external_id, "7");
    }

    #[tokio::test]
    async fn test_pagination_stops_when_has_more_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[3], false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[4], false)))
            .expect(0)
            .mount(&server)
            .await;

        let client = StackExchangeClient::with_base_url(None, server.uri()).unwrap();
        let outcome = client.fetch(&request(5, &[], None)).await;
        assert_eq!(outcome.items.len(), 3);
    }

    #[tokio::test]
    async fn test_body_filter_requires_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("filter", "withbody"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1], false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("filter", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[2], false)))
            .expect(1)
            .mount(&server)
            .await;

        let keyed = StackExchangeClient::with_base_url(Some("secret".into()), server.uri()).unwrap();
        let anonymous = StackExchangeClient::with_base_url(Some("  ".into()), server.uri()).unwrap();

        assert_eq!(keyed.fetch(&request(1, &[], None)).await.items[0].external_id, "1");
        assert_eq!(anonymous.fetch(&request(1, &[], None)).await.items[0].external_id, "2");
    }

    #[tokio::test]
    async fn test_failed_pass_is_recorded_and_next_tag_continues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("tagged", "go"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("tagged", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[5], false)))
            .mount(&server)
            .await;

        let client = StackExchangeClient::with_base_url(None, server.uri()).unwrap();
        let outcome = client.fetch(&request(2, &["go", "rust"], None)).await;
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("tag=go"));
        assert_eq!(outcome.items.len(), 1);
    }

    #[test]
    fn test_item_normalization_falls_back_to_html_body() {
        let api: ApiQuestion = serde_json::from_value(json!({
            "question_id": 42,
            "link": "https://dba.stackexchange.com/q/42",
            "title": "Why is my index unused?",
            "body": "<p>details</p>",
            "creation_date": 0
        }))
        .unwrap();
        let item = QuestionItem::from(api);
        assert_eq!(item.source, SOURCE_STACKEXCHANGE);
        assert_eq!(item.external_id, "42");
        assert_eq!(item.body_markdown.as_deref(), Some("<p>details</p>"));
        assert_eq!(item.body_html.as_deref(), Some("<p>details</p>"));
        assert_eq!(item.created_at, Some(DateTime::<Utc>::default()));
        assert_eq!(item.score, 0);
        assert!(item.hash.is_none());
    }
}
