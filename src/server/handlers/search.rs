use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::server::handlers::rag::validate_query;
use crate::state::AppState;
use crate::tools::search::perform_search;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate_query(&payload.query)?;
    let results = perform_search(&state.search_client, &state.search, query).await?;
    tracing::info!(count = results.len(), "Search returned results");
    Ok(Json(json!({ "results": results })))
}
