use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::rag::SearchResult;
use crate::state::AppState;
use crate::tools::search::perform_search;

const MAX_QUERY_CHARS: usize = 1000;
const MAX_RESULTS_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RagRequest {
    pub query: String,
    /// Pre-fetched search hits. When absent the configured provider is queried.
    #[serde(default)]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

pub async fn perform_rag(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate_query(&payload.query)?;

    let results = match payload.search_results {
        Some(results) => results,
        None => perform_search(&state.search_client, &state.search, query).await?,
    };

    let max_results = payload
        .max_results
        .unwrap_or(state.assembler.settings().max_results_to_process)
        .clamp(1, MAX_RESULTS_LIMIT);

    // Dropping this future on client disconnect also drops the in-flight fetch.
    let result = state
        .assembler
        .perform_rag(query, &results, max_results)
        .await;
    tracing::info!(
        citations = result.citations.len(),
        context_chars = result.context.chars().count(),
        "RAG context assembled"
    );
    Ok(Json(result))
}

pub(crate) fn validate_query(raw: &str) -> Result<&str, ApiError> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ApiError::BadRequest(format!(
            "query exceeds {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(query)
}
