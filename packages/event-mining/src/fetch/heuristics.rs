//! Completeness heuristic for statically fetched markup.
//!
//! Decides whether a lightweight fetch already contains the final rendered
//! content or whether the page needs scripted rendering. Client-side
//! rendered sites typically ship a near-empty shell: an empty application
//! root container, a loading placeholder, or framework bootstrap markers
//! with almost no text.

use std::sync::OnceLock;

use regex::Regex;

/// Bodies at least this large are trusted as complete outright.
const LARGE_CONTENT_LEN: usize = 50_000;

/// Bodies with framework markers below this length are considered shells.
const MIN_FRAMEWORK_CONTENT_LEN: usize = 1_000;

const LOADING_PHRASES: &[&str] = &[
    "loading...",
    "please wait",
    "cargando...",
    "loading events",
    "just a moment",
];

const FRAMEWORK_MARKERS: &[&str] = &[
    "data-reactroot",
    "__next_data__",
    "ng-version",
    "data-v-app",
    "webpack",
    "react",
    "vue",
];

fn empty_root_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)<div[^>]*\bid=["'](?:root|app|__next|app-root)["'][^>]*>\s*</div>|<app-root[^>]*>\s*</app-root>"#,
        )
        .expect("empty root pattern is valid")
    })
}

/// Returns the reason the markup is judged incomplete, or `None` when it is
/// complete enough to use as-is.
pub fn incomplete_reason(html: &str) -> Option<&'static str> {
    // Large bodies are real content no matter what placeholders they contain.
    if html.len() >= LARGE_CONTENT_LEN {
        return None;
    }

    if empty_root_pattern().is_match(html) {
        return Some("empty application root container");
    }

    let lower = html.to_lowercase();

    if LOADING_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Some("loading indicator present");
    }

    if html.len() < MIN_FRAMEWORK_CONTENT_LEN
        && FRAMEWORK_MARKERS.iter().any(|marker| lower.contains(marker))
    {
        return Some("framework markers with minimal content");
    }

    None
}
