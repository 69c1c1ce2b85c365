//! Retrieval-augmented generation context assembly.
//!
//! This module provides:
//! - `DomainClassifier`: host normalization and source labelling
//! - `ContentFetcher` / `HttpContentFetcher`: bounded-time page text retrieval
//! - `ContextAssembler`: ranks search hits and builds a size-bounded context with citations

mod cancel;
mod context_builder;
mod domain;
mod extract;
mod fetcher;
mod settings;
mod types;

pub use cancel::CancellationToken;
pub use context_builder::ContextAssembler;
pub use domain::{DomainClassifier, SourceRule};
pub use extract::{normalize_whitespace, ExtractError, HtmlExtractor, ScraperExtractor};
pub use fetcher::{ContentFetcher, FetchError, HttpContentFetcher};
pub use settings::RagSettings;
pub use types::{Citation, RagResult, SearchResult};
