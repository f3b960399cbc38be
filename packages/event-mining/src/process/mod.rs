//! Candidate validation, normalization and persistence.
//!
//! Candidates are processed independently: every rejection is recorded in
//! a skip log with the candidate's title and reason, and never aborts the
//! rest of the batch.

pub mod time;

use std::sync::Arc;

use anyhow::bail;
use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{EventStore, NewEvent, StoredEvent};
use crate::types::ExtractionCandidate;

/// One rejected candidate and why.
#[derive(Debug, Clone)]
pub struct SkippedCandidate {
    pub title: String,
    pub reason: String,
}

/// Result of a processing batch.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub stored: Vec<StoredEvent>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Case- and diacritic-insensitive comparison key for titles and venues.
pub fn normalize_key(s: &str) -> String {
    let folded: String = s.to_lowercase().chars().map(fold_diacritic).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}

pub struct EventProcessor {
    store: Arc<dyn EventStore>,
}

impl EventProcessor {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Process every candidate, accumulating stored records and a skip log.
    pub async fn process_all(
        &self,
        candidates: &[ExtractionCandidate],
        actor_id: Uuid,
    ) -> ProcessOutcome {
        let today = time::today_in_reference_tz();
        let mut outcome = ProcessOutcome::default();

        for candidate in candidates {
            match self.process_one(candidate, actor_id, today).await {
                Ok(stored) => {
                    info!(event_id = %stored.id, title = %stored.title, "Stored mined event");
                    outcome.stored.push(stored);
                }
                Err(e) => {
                    let title = if candidate.title.is_empty() {
                        "<untitled>"
                    } else {
                        candidate.title.as_str()
                    };
                    warn!(title = %title, reason = %e, "Skipping candidate");
                    outcome.skipped.push(SkippedCandidate {
                        title: title.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    async fn process_one(
        &self,
        candidate: &ExtractionCandidate,
        actor_id: Uuid,
        today: NaiveDate,
    ) -> anyhow::Result<StoredEvent> {
        for (field, value) in [
            ("title", &candidate.title),
            ("date", &candidate.date),
            ("time", &candidate.time),
            ("category_slug", &candidate.category_slug),
            ("city_slug", &candidate.city_slug),
        ] {
            if value.trim().is_empty() {
                bail!("missing mandatory field: {field}");
            }
        }

        let date = match time::parse_civil_date(&candidate.date) {
            Some(d) => d,
            None => bail!("invalid date format: {}", candidate.date),
        };
        // Events earlier today are still listed; only strictly past dates go.
        if date < today {
            bail!("event date {} is in the past", candidate.date);
        }

        let normalized_title = normalize_key(&candidate.title);
        let normalized_venue = normalize_key(&candidate.location);
        match self
            .store
            .find_duplicate(&normalized_title, &normalized_venue)
            .await
        {
            Ok(Some(existing)) => {
                bail!("duplicate of existing event {existing}");
            }
            Ok(None) => {}
            // Fail open: a broken duplicate check must not block ingestion.
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Duplicate check failed, continuing");
            }
        }

        let city = match self.store.city_by_slug(&candidate.city_slug).await? {
            Some(city) => city,
            None => bail!("unknown city slug: {}", candidate.city_slug),
        };
        let category = match self.store.category_by_slug(&candidate.category_slug).await? {
            Some(category) => category,
            None => bail!("unknown category slug: {}", candidate.category_slug),
        };

        let (event_time, defaulted) = time::normalize_time(&candidate.time);
        if defaulted {
            warn!(
                title = %candidate.title,
                time = %candidate.time,
                "Malformed event time, using default"
            );
        }
        let starts_at = time::civil_to_utc(date, event_time);

        let event = NewEvent {
            id: Uuid::new_v4(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            starts_at,
            location: candidate.location.clone(),
            address: candidate.address.clone(),
            price: candidate.price,
            image_url: candidate.image_url.clone(),
            event_url: candidate.event_url.clone(),
            city_id: city.id,
            category_id: category.id,
            published: false,
            created_by: actor_id,
            normalized_title,
            normalized_venue,
        };

        let stored = self.store.insert_event(&event).await?;

        for tag in &candidate.tags {
            let tag_id = self.store.upsert_tag(tag).await?;
            self.store.tag_event(stored.id, tag_id).await?;
        }

        Ok(stored)
    }
}
