//! Structured extraction: content in, candidate event listings out.
//!
//! One call to the provider's structured-output endpoint with a fixed
//! schema, followed by defensive validation of whatever came back. The
//! stage never panics; every failure mode maps to a classified
//! [`ExtractError`].

pub mod schema;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::types::ExtractionCandidate;

use schema::{strict_schema_for, MinedEventsResponse};

/// Content beyond this many characters is truncated before the call.
const MAX_CONTENT_CHARS: usize = 60_000;

const SYSTEM_PROMPT: &str = "\
You extract event listings from web page content for a Mexican city-events \
platform. Identify every discrete upcoming event on the page. Dates must be \
calendar dates in YYYY-MM-DD form and times 24-hour HH:MM, both as printed \
on the page (do not convert timezones). Use the page's own wording for \
titles and descriptions. Set Price to the numeric ticket price, 0 for free \
events, or null when the page does not state one. Set image_url to the \
event's image URL or null. Pick the closest matching city and category \
slug. Do not invent events that are not on the page.";

/// Seam for the extraction stage, mockable in tests.
#[async_trait]
pub trait EventExtractor: Send + Sync {
    async fn extract(
        &self,
        content: &str,
        source_url: &str,
    ) -> Result<Vec<ExtractionCandidate>, ExtractError>;
}

/// Production extractor speaking the OpenAI chat-completions protocol with
/// `response_format: json_schema` strict mode.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Set the model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (Azure, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn request_structured(
        &self,
        content: &str,
        source_url: &str,
    ) -> Result<String, ExtractError> {
        #[derive(Serialize)]
        struct ChatMessage {
            role: &'static str,
            content: String,
        }

        #[derive(Serialize)]
        struct JsonSchemaFormat {
            name: &'static str,
            strict: bool,
            schema: serde_json::Value,
        }

        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            format_type: &'static str,
            json_schema: JsonSchemaFormat,
        }

        #[derive(Serialize)]
        struct StructuredRequest {
            model: String,
            messages: Vec<ChatMessage>,
            temperature: f32,
            response_format: ResponseFormat,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: Option<String>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
        let request = StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Source URL: {source_url}\n\nPage content:\n{truncated}"),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "mined_events",
                    strict: true,
                    schema: strict_schema_for::<MinedEventsResponse>(),
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout
                } else {
                    ExtractError::classify(&e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::classify(&format!("{status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|_| ExtractError::NoResponse)?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ExtractError::NoResponse)
    }
}

/// Validate the raw response text and pull out the candidate list.
///
/// Elements that fail to deserialize are dropped individually so one bad
/// entry cannot void the batch.
fn parse_candidates(text: &str, source_url: &str) -> Result<Vec<ExtractionCandidate>, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::NoResponse);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| ExtractError::MalformedJson)?;

    let events = value
        .get("events")
        .and_then(|e| e.as_array())
        .ok_or(ExtractError::MissingEvents)?;

    let mut candidates = Vec::with_capacity(events.len());
    for element in events {
        match serde_json::from_value::<ExtractionCandidate>(element.clone()) {
            Ok(mut candidate) => {
                if candidate.source_url.is_empty() {
                    candidate.source_url = source_url.to_string();
                }
                candidates.push(candidate);
            }
            Err(e) => {
                warn!(source_url = %source_url, error = %e, "Dropping malformed candidate element");
            }
        }
    }

    Ok(candidates)
}

#[async_trait]
impl EventExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        content: &str,
        source_url: &str,
    ) -> Result<Vec<ExtractionCandidate>, ExtractError> {
        debug!(source_url = %source_url, content_len = content.len(), model = %self.model, "Requesting extraction");

        let text = self.request_structured(content, source_url).await?;
        let candidates = parse_candidates(&text, source_url)?;

        debug!(source_url = %source_url, candidates = candidates.len(), "Extraction response parsed");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_is_classified() {
        assert!(matches!(
            parse_candidates("   ", "https://x.mx").unwrap_err(),
            ExtractError::NoResponse
        ));
    }

    #[test]
    fn unparseable_response_is_classified() {
        assert!(matches!(
            parse_candidates("not json at all", "https://x.mx").unwrap_err(),
            ExtractError::MalformedJson
        ));
    }

    #[test]
    fn missing_events_array_is_classified() {
        assert!(matches!(
            parse_candidates(r#"{"data": []}"#, "https://x.mx").unwrap_err(),
            ExtractError::MissingEvents
        ));
        assert!(matches!(
            parse_candidates(r#"{"events": {}}"#, "https://x.mx").unwrap_err(),
            ExtractError::MissingEvents
        ));
    }

    #[test]
    fn empty_events_array_is_success() {
        let candidates = parse_candidates(r#"{"events": []}"#, "https://x.mx").unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn candidates_are_parsed_and_source_url_backfilled() {
        let text = r#"{"events": [{
            "event_url": "https://x.mx/e/1",
            "title": "Noche de Jazz",
            "description": "Trio en vivo",
            "date": "2026-09-12",
            "time": "21:00",
            "location": "Foro Sol",
            "address": "Av. Viaducto 1",
            "category_slug": "music",
            "city_slug": "mexico-city",
            "Price": null,
            "image_url": null
        }]}"#;
        let candidates = parse_candidates(text, "https://x.mx/cartelera").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_url, "https://x.mx/cartelera");
        assert_eq!(candidates[0].title, "Noche de Jazz");
        assert_eq!(candidates[0].price, None);
    }

    #[test]
    fn malformed_element_is_dropped_not_fatal() {
        let text = r#"{"events": [
            {"title": 42},
            {"title": "Feria del Taco", "date": "2026-05-01"}
        ]}"#;
        let candidates = parse_candidates(text, "https://x.mx").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Feria del Taco");
    }
}
