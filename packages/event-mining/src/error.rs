//! Typed errors for the fetch and extraction stages.
//!
//! Uses `thiserror` for classified, message-stable errors. Stage operations
//! return these in a `Result` instead of panicking; the orchestrator turns
//! them into failure summaries.

use thiserror::Error;

/// Classified failures of the content acquisition stage.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL format")]
    InvalidUrl,

    #[error("Connection failed - domain not reachable")]
    ConnectionFailed,

    #[error("Static fetch timeout")]
    StaticTimeout,

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Page load timeout")]
    PageLoadTimeout,

    /// Anything else, carrying the underlying message.
    #[error("{0}")]
    Other(String),
}

/// Classified failures of the structured extraction stage.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No response received from extraction service")]
    NoResponse,

    #[error("Failed to parse JSON response from extraction service")]
    MalformedJson,

    #[error("Invalid response structure: missing events array")]
    MissingEvents,

    #[error("Extraction service authentication failed - check API_KEY configuration")]
    Auth,

    #[error("Extraction service quota or rate limit exceeded")]
    Quota,

    #[error("Extraction service request timed out")]
    Timeout,

    #[error("Error from extraction service: {0}")]
    Service(String),
}

impl ExtractError {
    /// Classify an upstream failure by message content.
    ///
    /// The upstream SDK surfaces auth, quota and timeout conditions only as
    /// message text, so the match is on well-known substrings.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if message.contains("API_KEY") || lower.contains("api key") {
            ExtractError::Auth
        } else if lower.contains("quota") || lower.contains("rate") {
            ExtractError::Quota
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ExtractError::Timeout
        } else {
            ExtractError::Service(message.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_known_substrings() {
        assert!(matches!(
            ExtractError::classify("missing API_KEY in environment"),
            ExtractError::Auth
        ));
        assert!(matches!(
            ExtractError::classify("You exceeded your current quota"),
            ExtractError::Quota
        ));
        assert!(matches!(
            ExtractError::classify("429: rate limit reached"),
            ExtractError::Quota
        ));
        assert!(matches!(
            ExtractError::classify("request timed out after 30s"),
            ExtractError::Timeout
        ));
        assert!(matches!(
            ExtractError::classify("upstream exploded"),
            ExtractError::Service(_)
        ));
    }

    #[test]
    fn fetch_errors_render_stable_messages() {
        assert_eq!(FetchError::InvalidUrl.to_string(), "Invalid URL format");
        assert_eq!(
            FetchError::ConnectionFailed.to_string(),
            "Connection failed - domain not reachable"
        );
        assert_eq!(FetchError::StaticTimeout.to_string(), "Static fetch timeout");
        assert_eq!(FetchError::HttpStatus(503).to_string(), "HTTP error: 503");
        assert_eq!(FetchError::PageLoadTimeout.to_string(), "Page load timeout");
    }
}
