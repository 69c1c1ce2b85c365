use reqwest::Client;
use serde_json::Value;

use crate::core::config::defaults::DEFAULT_SEARCH_PROVIDER;
use crate::core::errors::ApiError;
use crate::rag::SearchResult;

const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Which web search backend to call and how to reach it.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub provider: String,
    pub google_api_key: String,
    pub google_engine_id: String,
    pub google_endpoint: String,
    pub duckduckgo_endpoint: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_SEARCH_PROVIDER.to_string(),
            google_api_key: String::new(),
            google_engine_id: String::new(),
            google_endpoint: GOOGLE_ENDPOINT.to_string(),
            duckduckgo_endpoint: DUCKDUCKGO_ENDPOINT.to_string(),
        }
    }
}

impl SearchSettings {
    pub fn from_config(config: &Value) -> Self {
        let field = |key: &str| {
            config
                .get("search")
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let defaults = Self::default();

        Self {
            provider: field("provider").unwrap_or(defaults.provider),
            google_api_key: field("google_search_api_key").unwrap_or_default(),
            google_engine_id: field("google_search_engine_id").unwrap_or_default(),
            google_endpoint: field("google_endpoint").unwrap_or(defaults.google_endpoint),
            duckduckgo_endpoint: field("duckduckgo_endpoint")
                .unwrap_or(defaults.duckduckgo_endpoint),
        }
    }

    fn google_ready(&self) -> bool {
        self.provider == "google"
            && !self.google_api_key.is_empty()
            && !self.google_engine_id.is_empty()
    }
}

/// Runs `query` against the configured provider.
///
/// Google Custom Search is used when selected and fully configured; an
/// error or an empty answer from it falls back to DuckDuckGo.
pub async fn perform_search(
    client: &Client,
    settings: &SearchSettings,
    query: &str,
) -> Result<Vec<SearchResult>, ApiError> {
    if settings.google_ready() {
        match google_search(client, settings, query).await {
            Ok(results) if !results.is_empty() => return Ok(results),
            Ok(_) => tracing::info!("Google search returned no items; falling back to DuckDuckGo"),
            Err(err) => tracing::warn!("Google search failed, falling back to DuckDuckGo: {}", err),
        }
    }

    duckduckgo_search(client, settings, query).await
}

async fn google_search(
    client: &Client,
    settings: &SearchSettings,
    query: &str,
) -> Result<Vec<SearchResult>, ApiError> {
    let url = format!(
        "{}?key={}&cx={}&q={}",
        settings.google_endpoint,
        urlencoding::encode(&settings.google_api_key),
        urlencoding::encode(&settings.google_engine_id),
        urlencoding::encode(query)
    );

    let response = client.get(url).send().await.map_err(ApiError::upstream)?;

    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "Google search failed: {}",
            response.status()
        )));
    }

    let payload: Value = response.json().await.map_err(ApiError::upstream)?;
    Ok(parse_google_items(&payload))
}

fn parse_google_items(payload: &Value) -> Vec<SearchResult> {
    let Some(items) = payload.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for item in items {
        let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let link = item.get("link").and_then(|v| v.as_str()).unwrap_or("");
        let snippet = item
            .get("snippet")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty());
        if title.is_empty() || link.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: title.to_string(),
            link: link.to_string(),
            snippet: snippet.map(str::to_string),
        });
    }
    results
}

async fn duckduckgo_search(
    client: &Client,
    settings: &SearchSettings,
    query: &str,
) -> Result<Vec<SearchResult>, ApiError> {
    let url = format!(
        "{}?q={}&format=json&no_redirect=1&no_html=1",
        settings.duckduckgo_endpoint,
        urlencoding::encode(query)
    );

    let response = client.get(url).send().await.map_err(ApiError::upstream)?;

    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "DuckDuckGo search failed: {}",
            response.status()
        )));
    }

    // The instant-answer API labels JSON as `application/x-javascript`.
    let body = response.text().await.map_err(ApiError::upstream)?;
    let payload: Value = serde_json::from_str(&body).map_err(ApiError::upstream)?;
    Ok(parse_duckduckgo(&payload))
}

fn parse_duckduckgo(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = payload
        .get("AbstractText")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let abstract_url = payload
        .get("AbstractURL")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = payload
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| abstract_text.split(" - ").next().unwrap_or(abstract_text));
        results.push(SearchResult::new(heading, abstract_url).with_snippet(abstract_text));
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }

    results
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(
            SearchResult::new(text.split(" - ").next().unwrap_or(text), url).with_snippet(text),
        );
    }
}
