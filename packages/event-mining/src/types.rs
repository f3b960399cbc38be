//! Shared domain types for the mining pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cities the platform currently lists events for.
///
/// Closed set: the extraction schema constrains the model to these slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CitySlug {
    MexicoCity,
    Guadalajara,
    Monterrey,
    Puebla,
    Merida,
}

impl CitySlug {
    pub const ALL: [CitySlug; 5] = [
        CitySlug::MexicoCity,
        CitySlug::Guadalajara,
        CitySlug::Monterrey,
        CitySlug::Puebla,
        CitySlug::Merida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CitySlug::MexicoCity => "mexico-city",
            CitySlug::Guadalajara => "guadalajara",
            CitySlug::Monterrey => "monterrey",
            CitySlug::Puebla => "puebla",
            CitySlug::Merida => "merida",
        }
    }
}

/// Event categories known to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CategorySlug {
    Music,
    Arts,
    FoodDrink,
    Sports,
    Tech,
    Theatre,
    Nightlife,
    Family,
}

impl CategorySlug {
    pub const ALL: [CategorySlug; 8] = [
        CategorySlug::Music,
        CategorySlug::Arts,
        CategorySlug::FoodDrink,
        CategorySlug::Sports,
        CategorySlug::Tech,
        CategorySlug::Theatre,
        CategorySlug::Nightlife,
        CategorySlug::Family,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySlug::Music => "music",
            CategorySlug::Arts => "arts",
            CategorySlug::FoodDrink => "food-drink",
            CategorySlug::Sports => "sports",
            CategorySlug::Tech => "tech",
            CategorySlug::Theatre => "theatre",
            CategorySlug::Nightlife => "nightlife",
            CategorySlug::Family => "family",
        }
    }
}

/// How a page's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Static,
    Dynamic,
}

/// Characters kept in the short content preview.
pub const PREVIEW_LEN: usize = 500;

/// Successfully acquired page content.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub method: FetchMethod,
    /// Short preview of the content, for logging and diagnostics.
    pub preview: String,
    /// The full retrieved markup.
    pub content: String,
}

impl FetchedContent {
    pub fn new(method: FetchMethod, content: String) -> Self {
        let preview = content.chars().take(PREVIEW_LEN).collect();
        Self {
            method,
            preview,
            content,
        }
    }
}

/// One candidate event as returned by the extraction service.
///
/// Deserialized leniently: every field is defaulted so a sparse or
/// malformed candidate still reaches the processor, which is where
/// mandatory-field validation and skip logging happen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub event_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Civil calendar date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Civil 24h clock time, `HH:MM`.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category_slug: String,
    #[serde(default)]
    pub city_slug: String,
    /// `None` means "unspecified"; `Some(0.0)` means free entry.
    #[serde(default, alias = "Price")]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Optional tag names to associate with the stored event.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Coarse progress states emitted while mining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningStatus {
    Started,
    Progress,
    Completed,
    Failed,
    End,
}

/// A single progress notification pushed to a streaming client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub status: MiningStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_extracted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_stored: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProgressUpdate {
    pub fn started(message: impl Into<String>) -> Self {
        Self::message(MiningStatus::Started, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::message(MiningStatus::Progress, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::message(MiningStatus::Failed, message)
    }

    pub fn end() -> Self {
        Self {
            status: MiningStatus::End,
            message: None,
            events_extracted: None,
            events_stored: None,
            events_failed: None,
            details: None,
        }
    }

    pub fn completed(summary: &MiningSummary) -> Self {
        Self {
            status: MiningStatus::Completed,
            message: None,
            events_extracted: Some(summary.events_extracted),
            events_stored: Some(summary.events_stored),
            events_failed: Some(summary.events_failed),
            details: summary.details.clone(),
        }
    }

    fn message(status: MiningStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            events_extracted: None,
            events_stored: None,
            events_failed: None,
            details: None,
        }
    }
}

/// Outcome of one mining run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningSummary {
    pub success: bool,
    pub events_extracted: usize,
    pub events_stored: usize,
    pub events_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MiningSummary {
    pub fn completed(extracted: usize, stored: usize, details: impl Into<String>) -> Self {
        Self {
            success: true,
            events_extracted: extracted,
            events_stored: stored,
            events_failed: extracted.saturating_sub(stored),
            details: Some(details.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            events_extracted: 0,
            events_stored: 0,
            events_failed: 0,
            details: None,
            error: Some(error.into()),
        }
    }
}
