use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::core::config::{AppPaths, ConfigService};
use crate::rag::{ContentFetcher, ContextAssembler, HttpContentFetcher, RagSettings};
use crate::tools::search::SearchSettings;

pub mod error;

use error::InitializationError;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state handed to every route.
///
/// Contains:
/// - Configuration and paths
/// - The context assembler with its page fetcher
/// - Search provider settings and the client used to call it
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub assembler: Arc<ContextAssembler>,
    pub search: SearchSettings,
    pub search_client: Client,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Discovers paths and loads (and validates) configuration
    /// 2. Builds the page fetcher and context assembler from the `rag` section
    /// 3. Builds the search client from the `search` section
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let loaded = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let settings = RagSettings::from_config(&loaded);
        let fetcher = HttpContentFetcher::new(&settings)
            .map_err(|e| InitializationError::HttpClient(e.into()))?;
        let search_client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| InitializationError::HttpClient(e.into()))?;

        Ok(Arc::new(Self::from_parts(
            paths,
            config,
            &loaded,
            Arc::new(fetcher),
            search_client,
        )))
    }

    /// Assembles state from already-loaded pieces.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        loaded: &Value,
        fetcher: Arc<dyn ContentFetcher>,
        search_client: Client,
    ) -> Self {
        let settings = RagSettings::from_config(loaded);
        tracing::info!(
            max_context_length = settings.max_context_length,
            max_snippet_length = settings.max_snippet_length,
            fetch_timeout_ms = settings.fetch_timeout.as_millis() as u64,
            max_results_to_process = settings.max_results_to_process,
            priority_sources = settings.priority_sources.len(),
            "RAG settings loaded"
        );

        AppState {
            paths,
            config,
            assembler: Arc::new(ContextAssembler::new(settings, fetcher)),
            search: SearchSettings::from_config(loaded),
            search_client,
        }
    }
}
