use std::time::Duration;

use serde_json::Value;

use super::domain::SourceRule;
use crate::core::config::defaults::{
    default_priority_sources, DEFAULT_FETCH_MAX_BYTES, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MAX_CONTEXT_LENGTH, DEFAULT_MAX_RESULTS_TO_PROCESS, DEFAULT_MAX_SNIPPET_LENGTH,
    DEFAULT_MIN_PARTIAL_SEGMENT, DEFAULT_USER_AGENT,
};

/// Tunables for context assembly and page fetching.
///
/// Built once at startup and handed to the assembler and fetcher; nothing
/// here changes while the process runs.
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Hard cap on the assembled context, in characters.
    pub max_context_length: usize,
    /// Characters kept from each fetched page.
    pub max_snippet_length: usize,
    pub fetch_timeout: Duration,
    pub max_results_to_process: usize,
    pub fetch_max_bytes: usize,
    /// A truncated trailing segment is only written when more than this many
    /// characters of budget remain.
    pub min_partial_segment: usize,
    pub user_agent: String,
    pub priority_sources: Vec<SourceRule>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            max_context_length: DEFAULT_MAX_CONTEXT_LENGTH,
            max_snippet_length: DEFAULT_MAX_SNIPPET_LENGTH,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            max_results_to_process: DEFAULT_MAX_RESULTS_TO_PROCESS,
            fetch_max_bytes: DEFAULT_FETCH_MAX_BYTES,
            min_partial_segment: DEFAULT_MIN_PARTIAL_SEGMENT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            priority_sources: default_rules(),
        }
    }
}

impl RagSettings {
    /// Reads the `rag` section of a loaded config, falling back to defaults
    /// for anything missing and clamping numbers into sane ranges.
    pub fn from_config(config: &Value) -> Self {
        let rag = config.get("rag");
        let u64_field = |key: &str| rag.and_then(|v| v.get(key)).and_then(|v| v.as_u64());

        let max_context_length = u64_field("max_context_length")
            .map(|v| v.clamp(500, 200_000) as usize)
            .unwrap_or(DEFAULT_MAX_CONTEXT_LENGTH);
        let max_snippet_length = u64_field("max_snippet_length")
            .map(|v| v.clamp(1, 100_000) as usize)
            .unwrap_or(DEFAULT_MAX_SNIPPET_LENGTH);
        let fetch_timeout_ms = u64_field("fetch_timeout_ms")
            .map(|v| v.clamp(100, 120_000))
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS);
        let max_results_to_process = u64_field("max_results_to_process")
            .map(|v| v.clamp(1, 20) as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS_TO_PROCESS);
        let fetch_max_bytes = u64_field("fetch_max_bytes")
            .map(|v| v.clamp(1024, 50_000_000) as usize)
            .unwrap_or(DEFAULT_FETCH_MAX_BYTES);
        let min_partial_segment = u64_field("min_partial_segment")
            .map(|v| v.min(10_000) as usize)
            .unwrap_or(DEFAULT_MIN_PARTIAL_SEGMENT);
        let user_agent = rag
            .and_then(|v| v.get("user_agent"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
            .to_string();

        Self {
            max_context_length,
            max_snippet_length,
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            max_results_to_process,
            fetch_max_bytes,
            min_partial_segment,
            user_agent,
            priority_sources: priority_sources(rag),
        }
    }
}

fn default_rules() -> Vec<SourceRule> {
    default_priority_sources()
        .into_iter()
        .map(|(pattern, label)| SourceRule::new(pattern, label))
        .collect()
}

fn priority_sources(rag: Option<&Value>) -> Vec<SourceRule> {
    let Some(list) = rag
        .and_then(|v| v.get("priority_sources"))
        .and_then(|v| v.as_array())
    else {
        return default_rules();
    };

    let rules: Vec<SourceRule> = list
        .iter()
        .filter_map(|entry| {
            let pattern = entry.get("pattern")?.as_str()?.trim();
            let label = entry.get("label")?.as_str()?.trim();
            if pattern.is_empty() || label.is_empty() {
                return None;
            }
            Some(SourceRule::new(pattern, label))
        })
        .collect();

    if rules.is_empty() {
        tracing::warn!("rag.priority_sources has no usable entries; using built-in table");
        return default_rules();
    }
    rules
}
