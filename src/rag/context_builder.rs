//! RAG context assembly.
//!
//! Turns a query plus unranked search hits into a bounded block of grounding
//! text:
//! 1. Hits from priority domains move to the front (stable, ties keep input order)
//! 2. Pages are fetched one at a time until enough succeed or the budget is spent
//! 3. Each page contributes one formatted, length-clipped segment and one citation

use std::sync::Arc;

use super::cancel::CancellationToken;
use super::domain::DomainClassifier;
use super::fetcher::ContentFetcher;
use super::settings::RagSettings;
use super::types::{Citation, RagResult, SearchResult};

const TRUNCATION_MARKER: &str = "...\n";

/// Builds [`RagResult`]s from search hits.
///
/// Holds no per-call state; one instance can serve concurrent calls, each of
/// which fetches its candidates strictly in sequence.
pub struct ContextAssembler {
    settings: RagSettings,
    classifier: DomainClassifier,
    fetcher: Arc<dyn ContentFetcher>,
}

impl ContextAssembler {
    pub fn new(settings: RagSettings, fetcher: Arc<dyn ContentFetcher>) -> Self {
        let classifier = DomainClassifier::new(settings.priority_sources.clone());
        Self {
            settings,
            classifier,
            fetcher,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Assembles context using the configured `max_results_to_process`.
    pub async fn perform_rag_default(&self, query: &str, results: &[SearchResult]) -> RagResult {
        self.perform_rag(query, results, self.settings.max_results_to_process)
            .await
    }

    /// Assembles context from at most `max_results_to_process` successfully
    /// fetched pages.
    ///
    /// Never fails: unusable candidates are logged and skipped. With no usable
    /// candidate the context is just the header line and `citations` is empty.
    pub async fn perform_rag(
        &self,
        query: &str,
        results: &[SearchResult],
        max_results_to_process: usize,
    ) -> RagResult {
        self.assemble(query, results, max_results_to_process, None)
            .await
    }

    /// [`perform_rag`](Self::perform_rag) that stops early once `token` is
    /// cancelled, aborting the in-flight fetch. Whatever was assembled before
    /// cancellation is returned.
    pub async fn perform_rag_with_cancel(
        &self,
        query: &str,
        results: &[SearchResult],
        max_results_to_process: usize,
        token: &CancellationToken,
    ) -> RagResult {
        self.assemble(query, results, max_results_to_process, Some(token))
            .await
    }

    /// Priority-domain hits first; relative order is otherwise preserved.
    pub fn prioritize<'a>(&self, results: &'a [SearchResult]) -> Vec<&'a SearchResult> {
        let mut ordered: Vec<&SearchResult> = results.iter().collect();
        ordered.sort_by_key(|result| !self.classifier.is_priority_url(&result.link));
        ordered
    }

    async fn assemble(
        &self,
        query: &str,
        results: &[SearchResult],
        max_results_to_process: usize,
        token: Option<&CancellationToken>,
    ) -> RagResult {
        tracing::info!(
            candidates = results.len(),
            max_results_to_process,
            "Assembling context for query {:?}",
            query
        );

        let mut buffer = ContextBuffer::new(self.settings.max_context_length);
        buffer.push_clipped(&format!("Information related to \"{}\":\n\n", query));
        let mut citations = Vec::new();
        let mut processed = 0;

        for result in self.prioritize(results) {
            if processed >= max_results_to_process || buffer.is_full() {
                break;
            }
            if token.map(CancellationToken::is_cancelled).unwrap_or(false) {
                tracing::info!("Context assembly cancelled");
                break;
            }

            let Some(domain) = DomainClassifier::domain_name(&result.link) else {
                tracing::warn!(link = %result.link, "Skipping search result with malformed URL");
                continue;
            };

            let fetch = self.fetcher.fetch_text(&result.link);
            let fetched = match token {
                Some(token) => tokio::select! {
                    text = fetch => Some(text),
                    _ = token.cancelled() => None,
                },
                None => Some(fetch.await),
            };
            let Some(fetched) = fetched else {
                tracing::info!(link = %result.link, "Context assembly cancelled during fetch");
                break;
            };
            let Some(text) = fetched else {
                tracing::debug!(link = %result.link, "No content extracted; trying next result");
                continue;
            };

            processed += 1;
            let source = self.classifier.source_name(&domain);
            let snippet: String = text.chars().take(self.settings.max_snippet_length).collect();
            let segment = format!(
                "Source: {} ({})\nURL: {}\nContent Snippet:\n{}\n\n---\n\n",
                source, result.title, result.link, snippet
            );
            let citation = Citation {
                source,
                url: result.link.clone(),
                title: result.title.clone(),
            };

            match buffer.append(&segment, self.settings.min_partial_segment) {
                Appended::Full => citations.push(citation),
                Appended::Truncated => {
                    tracing::debug!(
                        link = %result.link,
                        "Context budget reached; segment truncated"
                    );
                    citations.push(citation);
                    break;
                }
                Appended::Dropped => {
                    tracing::debug!(
                        link = %result.link,
                        "Context budget reached; segment dropped"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            citations = citations.len(),
            context_chars = buffer.chars,
            "Context assembled"
        );

        RagResult {
            context: buffer.text.trim().to_string(),
            citations,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Appended {
    Full,
    Truncated,
    Dropped,
}

/// String with a hard cap measured in characters.
struct ContextBuffer {
    text: String,
    chars: usize,
    max_chars: usize,
}

impl ContextBuffer {
    fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
        }
    }

    fn remaining(&self) -> usize {
        self.max_chars.saturating_sub(self.chars)
    }

    fn is_full(&self) -> bool {
        self.chars >= self.max_chars
    }

    fn push_clipped(&mut self, value: &str) {
        let taken: String = value.chars().take(self.remaining()).collect();
        self.chars += taken.chars().count();
        self.text.push_str(&taken);
    }

    /// Appends `segment` whole if it fits. Otherwise, when more than
    /// `min_partial` characters remain, appends as much of it as fits ahead
    /// of the truncation marker, filling the buffer exactly.
    fn append(&mut self, segment: &str, min_partial: usize) -> Appended {
        let segment_chars = segment.chars().count();
        let remaining = self.remaining();
        if segment_chars <= remaining {
            self.text.push_str(segment);
            self.chars += segment_chars;
            return Appended::Full;
        }

        let marker_chars = TRUNCATION_MARKER.chars().count();
        if remaining > min_partial && remaining > marker_chars {
            let keep = remaining - marker_chars;
            self.text.extend(segment.chars().take(keep));
            self.text.push_str(TRUNCATION_MARKER);
            self.chars += keep + marker_chars;
            return Appended::Truncated;
        }

        Appended::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    /// Serves canned page text and records every URL it was asked for.
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_pages(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, text)| (url.to_string(), text.to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl ContentFetcher for FakeFetcher {
        async fn fetch_text(&self, url: &str) -> Option<String> {
            self.calls.lock().expect("calls lock").push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages.get(url).cloned()
        }
    }

    fn assembler(fetcher: Arc<FakeFetcher>, settings: RagSettings) -> ContextAssembler {
        ContextAssembler::new(settings, fetcher)
    }

    fn hit(title: &str, link: &str) -> SearchResult {
        SearchResult::new(title, link).with_snippet("...")
    }

    #[tokio::test]
    async fn priority_domain_is_processed_first() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://randomblog.com/bar", "Blog says eat more kale."),
            ("https://who.int/foo", "Wash hands before handling food."),
        ]));
        let assembler = assembler(fetcher.clone(), RagSettings::default());
        let results = vec![
            hit("Random blog", "https://randomblog.com/bar"),
            hit("WHO food safety", "https://who.int/foo"),
        ];

        let rag = assembler.perform_rag("food safety", &results, 3).await;

        assert_eq!(rag.citations.len(), 2);
        assert_eq!(
            rag.citations[0],
            Citation {
                source: "WHO".to_string(),
                url: "https://who.int/foo".to_string(),
                title: "WHO food safety".to_string(),
            }
        );
        assert_eq!(rag.citations[1].source, "RANDOMBLOG");
        assert_eq!(
            fetcher.calls(),
            vec!["https://who.int/foo", "https://randomblog.com/bar"]
        );

        let who_at = rag.context.find("Source: WHO (WHO food safety)").expect("who segment");
        let blog_at = rag.context.find("Source: RANDOMBLOG (Random blog)").expect("blog segment");
        assert!(who_at < blog_at);
    }

    #[tokio::test]
    async fn segments_are_formatted_under_the_header() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[(
            "https://www.fda.gov/food",
            "Cook poultry to 165°F.",
        )]));
        let rag = assembler(fetcher, RagSettings::default())
            .perform_rag("poultry", &[hit("FDA food", "https://www.fda.gov/food")], 3)
            .await;

        assert_eq!(
            rag.context,
            "Information related to \"poultry\":\n\n\
             Source: FDA (FDA food)\n\
             URL: https://www.fda.gov/food\n\
             Content Snippet:\n\
             Cook poultry to 165°F.\n\n---"
        );
    }

    #[tokio::test]
    async fn all_fetch_failures_leave_only_the_header() {
        let fetcher = Arc::new(FakeFetcher::default());
        let results = vec![
            hit("a", "https://a.com/1"),
            hit("b", "https://b.org/2"),
            hit("c", "https://who.int/3"),
        ];

        let rag = assembler(fetcher.clone(), RagSettings::default())
            .perform_rag("vitamin d", &results, 3)
            .await;

        assert!(rag.citations.is_empty());
        assert!(!rag.has_grounding());
        assert_eq!(rag.context, "Information related to \"vitamin d\":");
        // Failures do not consume the budget, so every candidate is tried.
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn stops_after_max_results_successes() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://one.com/", "first"),
            ("https://two.com/", "second"),
            ("https://three.com/", "third"),
        ]));
        let results = vec![
            hit("one", "https://one.com/"),
            hit("two", "https://two.com/"),
            hit("three", "https://three.com/"),
        ];

        let rag = assembler(fetcher.clone(), RagSettings::default())
            .perform_rag("q", &results, 1)
            .await;

        assert_eq!(rag.citations.len(), 1);
        assert_eq!(rag.citations[0].url, "https://one.com/");
        assert_eq!(fetcher.calls(), vec!["https://one.com/"]);
    }

    #[tokio::test]
    async fn oversized_first_page_is_truncated_and_ends_the_loop() {
        let settings = RagSettings {
            max_context_length: 1000,
            max_snippet_length: 5000,
            ..RagSettings::default()
        };
        let huge = "protein ".repeat(1000);
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://nih.gov/big", huge.as_str()),
            ("https://cdc.gov/small", "small page"),
        ]));
        let results = vec![
            hit("NIH", "https://nih.gov/big"),
            hit("CDC", "https://cdc.gov/small"),
        ];

        let rag = assembler(fetcher.clone(), settings)
            .perform_rag("protein", &results, 3)
            .await;

        assert_eq!(rag.citations.len(), 1);
        assert_eq!(rag.citations[0].source, "NIH");
        assert!(rag.context.starts_with("Information related to \"protein\":"));
        assert!(rag.context.ends_with("..."));
        assert!(rag.context.chars().count() <= 1000);
        assert_eq!(fetcher.calls(), vec!["https://nih.gov/big"]);
    }

    #[tokio::test]
    async fn segment_is_dropped_when_too_little_budget_remains() {
        // Header (29 chars) + first segment leaves < 100 chars for the second.
        let first_text = "x".repeat(850);
        let second_text = "y".repeat(500);
        let settings = RagSettings {
            max_context_length: 1000,
            ..RagSettings::default()
        };
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://a.com/", first_text.as_str()),
            ("https://b.com/", second_text.as_str()),
            ("https://c.com/", "z"),
        ]));
        let results = vec![
            hit("A", "https://a.com/"),
            hit("B", "https://b.com/"),
            hit("C", "https://c.com/"),
        ];

        let rag = assembler(fetcher.clone(), settings)
            .perform_rag("q", &results, 3)
            .await;

        assert_eq!(rag.citations.len(), 1);
        assert!(!rag.context.contains("Source: B"));
        assert_eq!(fetcher.calls(), vec!["https://a.com/", "https://b.com/"]);
    }

    #[tokio::test]
    async fn context_never_exceeds_budget() {
        let long = "calcium ".repeat(400);
        let pages: Vec<(String, String)> = (0..6)
            .map(|i| (format!("https://site{}.com/", i), long.clone()))
            .collect();
        let page_refs: Vec<(&str, &str)> = pages
            .iter()
            .map(|(url, text)| (url.as_str(), text.as_str()))
            .collect();
        let results: Vec<SearchResult> = pages
            .iter()
            .map(|(url, _)| hit("site", url))
            .collect();

        for max_context_length in [500, 777, 1500, 3000, 8000] {
            for max_snippet_length in [10, 900, 5000] {
                let settings = RagSettings {
                    max_context_length,
                    max_snippet_length,
                    ..RagSettings::default()
                };
                let fetcher = Arc::new(FakeFetcher::with_pages(&page_refs));
                let rag = assembler(fetcher, settings)
                    .perform_rag("calcium", &results, 6)
                    .await;
                assert!(
                    rag.context.chars().count() <= max_context_length,
                    "context {} > {}",
                    rag.context.chars().count(),
                    max_context_length
                );
                // Every citation has its segment.
                assert_eq!(
                    rag.context.matches("Source: SITE").count(),
                    rag.citations.len()
                );
            }
        }
    }

    #[tokio::test]
    async fn citations_bounded_by_max_and_input_length() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://a.com/", "a"),
            ("https://b.com/", "b"),
        ]));
        let assembler = assembler(fetcher, RagSettings::default());
        let results = vec![hit("a", "https://a.com/"), hit("b", "https://b.com/")];

        for max in 0..5 {
            let rag = assembler.perform_rag("q", &results, max).await;
            assert_eq!(rag.citations.len(), max.min(results.len()));
        }
    }

    #[tokio::test]
    async fn order_is_stable_without_priority_domains() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://c.com/", "c"),
            ("https://a.com/", "a"),
            ("https://d.com/", "d"),
        ]));
        let results = vec![
            hit("c", "https://c.com/"),
            hit("b", "https://b.com/"),
            hit("a", "https://a.com/"),
            hit("d", "https://d.com/"),
        ];

        let rag = assembler(fetcher, RagSettings::default())
            .perform_rag("q", &results, 10)
            .await;

        let urls: Vec<&str> = rag.citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://c.com/", "https://a.com/", "https://d.com/"]);
    }

    #[test]
    fn prioritize_is_a_stable_partition() {
        let assembler = assembler(Arc::new(FakeFetcher::default()), RagSettings::default());
        let results = vec![
            hit("1", "https://blog.com/"),
            hit("2", "https://www.cdc.gov/a"),
            hit("3", "not a url"),
            hit("4", "https://who.int/b"),
            hit("5", "https://shop.com/"),
            hit("6", "https://fda.gov/c"),
        ];

        let titles: Vec<&str> = assembler
            .prioritize(&results)
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["2", "4", "6", "1", "3", "5"]);
    }

    #[tokio::test]
    async fn malformed_urls_are_skipped_without_fetching() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[("https://ok.com/", "fine")]));
        let results = vec![hit("bad", "::nonsense::"), hit("ok", "https://ok.com/")];

        let rag = assembler(fetcher.clone(), RagSettings::default())
            .perform_rag("q", &results, 1)
            .await;

        assert_eq!(rag.citations.len(), 1);
        assert_eq!(fetcher.calls(), vec!["https://ok.com/"]);
    }

    #[tokio::test]
    async fn snippets_are_clipped_by_characters() {
        let settings = RagSettings {
            max_snippet_length: 5,
            ..RagSettings::default()
        };
        let fetcher = Arc::new(FakeFetcher::with_pages(&[("https://a.com/", "ñandú ñandú")]));
        let rag = assembler(fetcher, settings)
            .perform_rag("q", &[hit("a", "https://a.com/")], 3)
            .await;

        assert!(rag.context.contains("Content Snippet:\nñandú\n\n---"));
    }

    #[tokio::test]
    async fn header_longer_than_budget_is_clipped() {
        let settings = RagSettings {
            max_context_length: 500,
            ..RagSettings::default()
        };
        let fetcher = Arc::new(FakeFetcher::with_pages(&[("https://a.com/", "a")]));
        let query = "q".repeat(600);
        let rag = assembler(fetcher.clone(), settings)
            .perform_rag(&query, &[hit("a", "https://a.com/")], 3)
            .await;

        assert_eq!(rag.context.chars().count(), 500);
        assert!(rag.citations.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn default_uses_configured_max_results() {
        let settings = RagSettings {
            max_results_to_process: 2,
            ..RagSettings::default()
        };
        let fetcher = Arc::new(FakeFetcher::with_pages(&[
            ("https://a.com/", "a"),
            ("https://b.com/", "b"),
            ("https://c.com/", "c"),
        ]));
        let results = vec![
            hit("a", "https://a.com/"),
            hit("b", "https://b.com/"),
            hit("c", "https://c.com/"),
        ];

        let rag = assembler(fetcher, settings)
            .perform_rag_default("q", &results)
            .await;
        assert_eq!(rag.citations.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_fetch() {
        let fetcher = Arc::new(FakeFetcher {
            delay: Some(Duration::from_secs(5)),
            ..FakeFetcher::with_pages(&[("https://a.com/", "a"), ("https://b.com/", "b")])
        });
        let assembler = assembler(fetcher.clone(), RagSettings::default());
        let results = vec![hit("a", "https://a.com/"), hit("b", "https://b.com/")];
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let rag = tokio::time::timeout(
            Duration::from_secs(2),
            assembler.perform_rag_with_cancel("q", &results, 3, &token),
        )
        .await
        .expect("cancellation should end the call promptly");
        canceller.await.expect("canceller task");

        assert!(rag.citations.is_empty());
        assert_eq!(rag.context, "Information related to \"q\":");
        assert_eq!(fetcher.calls(), vec!["https://a.com/"]);
    }

    #[tokio::test]
    async fn pre_cancelled_token_fetches_nothing() {
        let fetcher = Arc::new(FakeFetcher::with_pages(&[("https://a.com/", "a")]));
        let token = CancellationToken::new();
        token.cancel();

        let rag = assembler(fetcher.clone(), RagSettings::default())
            .perform_rag_with_cancel("q", &[hit("a", "https://a.com/")], 3, &token)
            .await;

        assert!(rag.citations.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn buffer_truncation_fills_budget_exactly() {
        let mut buffer = ContextBuffer::new(200);
        buffer.push_clipped("header\n\n");
        assert_eq!(buffer.append(&"s".repeat(500), 100), Appended::Truncated);
        assert_eq!(buffer.chars, 200);
        assert_eq!(buffer.text.chars().count(), 200);
        assert!(buffer.text.ends_with("s...\n"));
        assert!(buffer.is_full());

        let mut tight = ContextBuffer::new(150);
        tight.push_clipped(&"h".repeat(60));
        assert_eq!(tight.append(&"s".repeat(500), 100), Appended::Dropped);
        assert_eq!(tight.text.chars().count(), 60);
    }
}
