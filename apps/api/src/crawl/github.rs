//! Curated interview-question lists kept as markdown files on GitHub.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;

use crate::crawl::{ensure_success, CrawlError};
use crate::models::question::QuestionItem;
use crate::storage::questions::sha256_hex;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = "interviewkit-crawler/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MIN_QUESTION_CHARS: usize = 15;
const TITLE_CHARS: usize = 120;

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
}

#[derive(Clone)]
pub struct GithubListsClient {
    client: Client,
    base_url: String,
}

impl GithubListsClient {
    pub fn new() -> Result<Self, CrawlError> {
        Self::with_base_url(DEFAULT_GITHUB_API.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Downloads a file through the contents API and decodes it as UTF-8.
    pub async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> Result<String, CrawlError> {
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.base_url);
        let response = ensure_success(self.client.get(&url).send().await?).await?;
        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| CrawlError::Decode(e.to_string()))?;
        decode_contents(&contents.content)
    }

    pub async fn fetch_questions(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        source_label: &str,
        tags: &[String],
    ) -> Result<Vec<QuestionItem>, CrawlError> {
        let markdown = self.fetch_file(owner, repo, path).await?;
        let url = format!("https://github.com/{owner}/{repo}/blob/main/{path}");

        Ok(parse_markdown_questions(&markdown)
            .into_iter()
            .map(|question| QuestionItem {
                source: source_label.to_string(),
                external_id: format!("{owner}/{repo}/{path}:{}", &sha256_hex(&question)[..16]),
                url: url.clone(),
                title: question.chars().take(TITLE_CHARS).collect(),
                body_markdown: Some(question),
                tags: tags.to_vec(),
                ..Default::default()
            })
            .collect())
    }
}

/// GitHub wraps base64 content at 60 columns.
fn decode_contents(content: &str) -> Result<String, CrawlError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| CrawlError::Decode(format!("invalid base64 content: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Lines that look like questions: list/heading markers stripped, longer
/// than 15 characters, ending in `?`.
pub fn parse_markdown_questions(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .map(|line| line.trim_matches(|c: char| matches!(c, ' ' | '-' | '*' | '#' | '\t')))
        .filter(|line| line.chars().count() > MIN_QUESTION_CHARS && line.ends_with('?'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIST: &str = "# Backend questions\n\
        - What is the difference between a process and a thread?\n\
        * Why?\n\
        ## How does a B-tree index speed up lookups?\n\
        Plain prose that is not a question.\n";

    #[test]
    fn test_parse_markdown_questions_filters_lines() {
        let questions = parse_markdown_questions(LIST);
        assert_eq!(
            questions,
            vec![
                "What is the difference between a process and a thread?",
                "How does a B-tree index speed up lookups?",
            ]
        );
    }

    #[test]
    fn test_decode_contents_handles_wrapped_base64() {
        let encoded = STANDARD.encode("hello world, this is a list");
        let wrapped = format!("{}\n{}", &encoded[..10], &encoded[10..]);
        assert_eq!(decode_contents(&wrapped).unwrap(), "hello world, this is a list");
        assert!(decode_contents("***").is_err());
    }

    #[tokio::test]
    async fn test_fetch_questions_builds_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/interviews/contents/backend.md"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": STANDARD.encode(LIST), "encoding": "base64"})),
            )
            .mount(&server)
            .await;

        let client = GithubListsClient::with_base_url(server.uri()).unwrap();
        let items = client
            .fetch_questions("acme", "interviews", "backend.md", "github", &["backend".into()])
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "github");
        assert!(items[0].external_id.starts_with("acme/interviews/backend.md:"));
        assert_ne!(items[0].external_id, items[1].external_id);
        assert_eq!(items[0].url, "https://github.com/acme/interviews/blob/main/backend.md");
        assert_eq!(items[0].tags, vec!["backend".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = GithubListsClient::with_base_url(server.uri()).unwrap();
        let err = client.fetch_file("acme", "nope", "x.md").await.unwrap_err();
        assert!(err.is_status());
    }
}
