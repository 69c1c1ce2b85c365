//! Domain normalization and source labelling.
//!
//! Search hits are ranked and cited by the site they come from. A hit whose
//! host contains one of the configured patterns is a *priority* source and
//! is labelled with that rule's label; anything else is labelled with its
//! first DNS label in upper case (`example.com` -> `EXAMPLE`).

use reqwest::Url;

/// Maps hosts containing `pattern` to a human-readable `label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRule {
    pub pattern: String,
    pub label: String,
}

impl SourceRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
        }
    }

    pub fn matches(&self, domain: &str) -> bool {
        domain.contains(self.pattern.as_str())
    }
}

/// Ordered rule table; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    rules: Vec<SourceRule>,
}

impl DomainClassifier {
    pub fn new(rules: Vec<SourceRule>) -> Self {
        Self { rules }
    }

    /// Host of `url` with one leading `www.` removed.
    ///
    /// Returns `None` for anything that does not parse as an absolute URL
    /// with a host.
    pub fn domain_name(url: &str) -> Option<String> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?;
        if host.is_empty() {
            return None;
        }
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    }

    pub fn matching_rule(&self, domain: &str) -> Option<&SourceRule> {
        self.rules.iter().find(|rule| rule.matches(domain))
    }

    pub fn is_priority(&self, domain: &str) -> bool {
        self.matching_rule(domain).is_some()
    }

    pub fn source_name(&self, domain: &str) -> String {
        if let Some(rule) = self.matching_rule(domain) {
            return rule.label.clone();
        }
        match domain.split('.').next() {
            Some(first) if !first.is_empty() => first.to_uppercase(),
            _ => domain.to_string(),
        }
    }

    /// Whether the host behind `url` is a priority source. Unparseable URLs
    /// are never priority.
    pub fn is_priority_url(&self, url: &str) -> bool {
        Self::domain_name(url)
            .map(|domain| self.is_priority(&domain))
            .unwrap_or(false)
    }
}
