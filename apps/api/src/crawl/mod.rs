// Question crawling: Stack Exchange search with a per-page fallback ladder,
// curated GitHub markdown lists, and the persist pipeline that upserts
// normalized items idempotently.

pub mod github;
pub mod handlers;
pub mod pipeline;
pub mod stackexchange;

use thiserror::Error;

use crate::errors::AppError;

const BODY_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl CrawlError {
    /// Status errors move the Stack Exchange fetch down its fallback ladder;
    /// transport and decode errors do not.
    pub fn is_status(&self) -> bool {
        matches!(self, CrawlError::Status { .. })
    }
}

impl From<CrawlError> for AppError {
    fn from(e: CrawlError) -> Self {
        AppError::Crawl(e.to_string())
    }
}

/// Turns a non-2xx response into `CrawlError::Status` with a body snippet.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, CrawlError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(CrawlError::Status {
        status: status.as_u16(),
        url,
        body: body.chars().take(BODY_SNIPPET_CHARS).collect(),
    })
}
