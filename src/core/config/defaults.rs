pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 8000;
pub const DEFAULT_MAX_SNIPPET_LENGTH: usize = 2000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_RESULTS_TO_PROCESS: usize = 3;
pub const DEFAULT_FETCH_MAX_BYTES: usize = 2_000_000;
pub const DEFAULT_MIN_PARTIAL_SEGMENT: usize = 100;
pub const DEFAULT_USER_AGENT: &str = "NutriRagBot/0.1 (+nutrition assistant context fetcher)";
pub const DEFAULT_SEARCH_PROVIDER: &str = "google";

/// Authoritative health and food-safety sources, highest priority first.
///
/// More specific patterns must precede the broader ones they contain
/// (`fsis.usda.gov` before `usda.gov`).
pub fn default_priority_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("fsis.usda.gov", "FSIS"),
        ("usda.gov", "USDA"),
        ("fda.gov", "FDA"),
        ("who.int", "WHO"),
        ("cdc.gov", "CDC"),
        ("nih.gov", "NIH"),
        ("efsa.europa.eu", "EFSA"),
        ("foodsafety.gov", "FoodSafety.gov"),
        ("nhs.uk", "NHS"),
        ("eatright.org", "EatRight"),
        ("mayoclinic.org", "Mayo Clinic"),
        ("harvard.edu", "Harvard"),
    ]
}
