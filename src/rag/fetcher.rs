//! Bounded-time page retrieval.
//!
//! Every failure (bad scheme, transport error, timeout, non-2xx, non-HTML,
//! oversized body, empty extraction) ends up as `None` from
//! [`ContentFetcher::fetch_text`]; the cause is only visible in the logs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use super::extract::{ExtractError, HtmlExtractor, ScraperExtractor};
use super::settings::RagSettings;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("not an HTML document (content-type: {0:?})")]
    ContentType(Option<String>),
    #[error("body exceeded {0} bytes")]
    TooLarge(usize),
    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("extraction task failed: {0}")]
    ExtractTask(#[from] tokio::task::JoinError),
}

/// Retrieves the readable text of a page.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Plain text of the page at `url`, or `None` when it could not be
    /// fetched or had no extractable text.
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

pub struct HttpContentFetcher {
    client: Client,
    extractor: Arc<dyn HtmlExtractor>,
    user_agent: String,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpContentFetcher {
    pub fn new(settings: &RagSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.fetch_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(FetchError::Request)?;
        Ok(Self::with_client(
            client,
            Arc::new(ScraperExtractor::new()),
            settings,
        ))
    }

    pub fn with_client(
        client: Client,
        extractor: Arc<dyn HtmlExtractor>,
        settings: &RagSettings,
    ) -> Self {
        Self {
            client,
            extractor,
            user_agent: settings.user_agent.clone(),
            timeout: settings.fetch_timeout,
            max_bytes: settings.fetch_max_bytes,
        }
    }

    /// Like [`ContentFetcher::fetch_text`] but keeps the failure cause.
    pub async fn try_fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let html = match tokio::time::timeout(self.timeout, self.download_html(url)).await {
            Ok(result) => result?,
            // Dropping the download future aborts the in-flight request.
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };
        // Parsing a large document is CPU-bound; keep it off the async workers.
        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract(&html)).await??;
        Ok(text)
    }

    async fn download_html(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(FetchError::UnsupportedScheme(scheme.to_string()));
        }

        let mut response = self
            .client
            .get(parsed)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "text/html")
            .send()
            .await
            .map_err(FetchError::Request)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if !content_type
            .as_deref()
            .map(|v| v.contains("text/html"))
            .unwrap_or(false)
        {
            return Err(FetchError::ContentType(content_type));
        }

        if response
            .content_length()
            .map(|len| len as usize > self.max_bytes)
            .unwrap_or(false)
        {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::Body)? {
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.try_fetch_text(url).await {
            Ok(text) => Some(text),
            Err(FetchError::Timeout(limit)) => {
                tracing::warn!(url, "Fetch timed out after {}ms", limit.as_millis());
                None
            }
            Err(err @ (FetchError::Request(_) | FetchError::Body(_))) => {
                tracing::error!(url, "Fetch error: {}", err);
                None
            }
            Err(err) => {
                tracing::warn!(url, "Skipping page: {}", err);
                None
            }
        }
    }
}
