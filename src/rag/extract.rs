//! HTML to plain text.
//!
//! Non-content elements are detached from the parsed tree first; text is
//! then taken from the first primary-content container that exists
//! (`main`, then `article`, then `body`).

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

const REMOVED_SELECTORS: [&str; 22] = [
    "script",
    "style",
    "noscript",
    "template",
    "nav",
    "footer",
    "header",
    "aside",
    "iframe",
    "svg",
    "form",
    "button",
    "input",
    "select",
    "textarea",
    ".sidebar",
    ".menu",
    ".advertisement",
    ".ads",
    ".cookie-banner",
    ".popup",
    ".social-share",
];

const CONTAINER_SELECTORS: [&str; 4] = ["main", "[role=\"main\"]", "article", "body"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document contained no text")]
    Empty,
}

/// Turns an HTML document into plain text.
pub trait HtmlExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<String, ExtractError>;
}

/// `scraper`-backed extractor.
#[derive(Debug)]
pub struct ScraperExtractor {
    removed: Vec<Selector>,
    containers: Vec<Selector>,
}

impl ScraperExtractor {
    pub fn new() -> Self {
        Self {
            removed: parse_selectors(&REMOVED_SELECTORS),
            containers: parse_selectors(&CONTAINER_SELECTORS),
        }
    }
}

impl Default for ScraperExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor for ScraperExtractor {
    fn extract(&self, html: &str) -> Result<String, ExtractError> {
        let mut document = Html::parse_document(html);

        // `Html::select` walks the whole arena, detached nodes included, so
        // every lookup goes through the root element instead.
        let doomed: Vec<_> = {
            let root = document.root_element();
            self.removed
                .iter()
                .flat_map(|selector| root.select(selector).map(|el| el.id()))
                .collect()
        };
        for id in doomed {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let root = document.root_element();
        let raw = match self
            .containers
            .iter()
            .find_map(|selector| root.select(selector).next())
        {
            Some(container) => container.text().collect::<String>(),
            None => root.text().collect::<String>(),
        };

        let text = normalize_whitespace(&raw);
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

/// Collapses whitespace runs to a single space, newline runs to a single
/// newline, and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
    static NEWLINE_RUN: OnceLock<Regex> = OnceLock::new();

    let whitespace_run =
        WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s{2,}").expect("whitespace pattern is valid"));
    let newline_run =
        NEWLINE_RUN.get_or_init(|| Regex::new(r"\n+").expect("newline pattern is valid"));

    let collapsed = whitespace_run.replace_all(text, " ");
    newline_run.replace_all(&collapsed, "\n").trim().to_string()
}

fn parse_selectors(sources: &[&str]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|source| match Selector::parse(source) {
            Ok(selector) => Some(selector),
            Err(err) => {
                tracing::error!("Skipping invalid selector {:?}: {:?}", source, err);
                None
            }
        })
        .collect()
}
