use serde::{Deserialize, Serialize};

/// One hit from an upstream search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Identifies where a context segment came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub url: String,
    pub title: String,
}

/// Assembled grounding text plus the citations for each segment, in order.
///
/// An empty `citations` list is a valid outcome: nothing could be fetched,
/// and `context` holds only the header line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagResult {
    pub context: String,
    pub citations: Vec<Citation>,
}

impl RagResult {
    pub fn has_grounding(&self) -> bool {
        !self.citations.is_empty()
    }
}
