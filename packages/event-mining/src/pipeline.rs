//! Mining orchestrator: fetch → extract → process, with progress streaming.
//!
//! One internal pipeline serves both invocation modes; the synchronous
//! path passes a [`NoopSink`]. Progress notifications are emitted in stage
//! order and the stream always terminates with an `end` marker. `mine`
//! itself never fails: every error becomes a failure summary.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use crate::extract::EventExtractor;
use crate::fetch::{ContentFetcher, FetchOptions};
use crate::process::EventProcessor;
use crate::storage::EventStore;
use crate::types::{MiningSummary, ProgressUpdate};

/// Receives progress notifications during a mining run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, update: ProgressUpdate);
}

/// Sink for the synchronous path: discards everything.
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn notify(&self, _update: ProgressUpdate) {}
}

pub struct MiningPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<dyn EventExtractor>,
    processor: EventProcessor,
    fetch_options: FetchOptions,
}

impl MiningPipeline {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn EventExtractor>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            processor: EventProcessor::new(store),
            fetch_options: FetchOptions::default(),
        }
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    /// Mine one URL. Infallible: the caller always receives a well-formed
    /// summary, and a supplied sink always sees a terminal `end` marker.
    pub async fn mine(
        &self,
        url: &str,
        actor_id: Uuid,
        sink: &dyn ProgressSink,
    ) -> MiningSummary {
        info!(url = %url, actor_id = %actor_id, "Mining started");
        sink.notify(ProgressUpdate::started(format!(
            "Starting event mining for {url}"
        )))
        .await;

        let summary = match self.run(url, actor_id, sink).await {
            Ok(summary) => summary,
            // Unexpected failures anywhere in the stages end up here; the
            // caller still gets a summary, never an error.
            Err(e) => {
                error!(url = %url, error = %e, "Mining failed unexpectedly");
                MiningSummary::failed(e.to_string())
            }
        };

        if summary.success {
            info!(
                url = %url,
                extracted = summary.events_extracted,
                stored = summary.events_stored,
                "Mining completed"
            );
            sink.notify(ProgressUpdate::completed(&summary)).await;
        } else {
            let reason = summary
                .error
                .clone()
                .unwrap_or_else(|| "Mining failed".to_string());
            info!(url = %url, error = %reason, "Mining failed");
            sink.notify(ProgressUpdate::failed(reason)).await;
        }
        sink.notify(ProgressUpdate::end()).await;

        summary
    }

    async fn run(
        &self,
        url: &str,
        actor_id: Uuid,
        sink: &dyn ProgressSink,
    ) -> anyhow::Result<MiningSummary> {
        let fetched = match self.fetcher.acquire(url, &self.fetch_options).await {
            Ok(fetched) => fetched,
            Err(e) => {
                return Ok(MiningSummary::failed(stage_reason(
                    e.to_string(),
                    "Failed to fetch page content",
                )));
            }
        };
        sink.notify(ProgressUpdate::progress(format!(
            "Retrieved {} characters of content, extracting events...",
            fetched.content.len()
        )))
        .await;

        let candidates = match self.extractor.extract(&fetched.content, url).await {
            Ok(candidates) => candidates,
            Err(e) => {
                return Ok(MiningSummary::failed(stage_reason(
                    e.to_string(),
                    "Failed to extract events from content",
                )));
            }
        };

        // An empty candidate list is a successful run of an eventless page.
        if candidates.is_empty() {
            return Ok(MiningSummary::completed(
                0,
                0,
                "No event listings found in the page content",
            ));
        }
        sink.notify(ProgressUpdate::progress(format!(
            "Extracted {} candidate events, processing...",
            candidates.len()
        )))
        .await;

        let outcome = self.processor.process_all(&candidates, actor_id).await;
        let details = format!(
            "Stored {} of {} extracted events",
            outcome.stored.len(),
            candidates.len()
        );
        Ok(MiningSummary::completed(
            candidates.len(),
            outcome.stored.len(),
            details,
        ))
    }
}

fn stage_reason(message: String, generic: &str) -> String {
    if message.trim().is_empty() {
        generic.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, FetchError};
    use crate::process::time::today_in_reference_tz;
    use crate::storage::{CategoryRef, CityRef, NewEvent, StoredEvent};
    use crate::types::{
        ExtractionCandidate, FetchMethod, FetchedContent, MiningStatus,
    };
    use anyhow::Result;
    use std::sync::Mutex;

    struct MockFetcher {
        error: Option<FetchError>,
    }

    #[async_trait]
    impl ContentFetcher for MockFetcher {
        async fn acquire(
            &self,
            _url: &str,
            _options: &FetchOptions,
        ) -> std::result::Result<FetchedContent, FetchError> {
            match &self.error {
                Some(FetchError::ConnectionFailed) => Err(FetchError::ConnectionFailed),
                Some(e) => Err(FetchError::Other(e.to_string())),
                None => Ok(FetchedContent::new(
                    FetchMethod::Static,
                    "<html><body>cartelera</body></html>".to_string(),
                )),
            }
        }
    }

    struct MockExtractor {
        result: std::result::Result<Vec<ExtractionCandidate>, ExtractError>,
    }

    #[async_trait]
    impl EventExtractor for MockExtractor {
        async fn extract(
            &self,
            _content: &str,
            _source_url: &str,
        ) -> std::result::Result<Vec<ExtractionCandidate>, ExtractError> {
            match &self.result {
                Ok(candidates) => Ok(candidates.clone()),
                Err(ExtractError::Quota) => Err(ExtractError::Quota),
                Err(e) => Err(ExtractError::Service(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MockStore {
        fail_title: Option<String>,
    }

    #[async_trait]
    impl EventStore for MockStore {
        async fn find_duplicate(&self, _t: &str, _v: &str) -> Result<Option<Uuid>> {
            Ok(None)
        }

        async fn city_by_slug(&self, slug: &str) -> Result<Option<CityRef>> {
            Ok(Some(CityRef {
                id: Uuid::new_v4(),
                slug: slug.to_string(),
                name: slug.to_string(),
            }))
        }

        async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRef>> {
            Ok(Some(CategoryRef {
                id: Uuid::new_v4(),
                slug: slug.to_string(),
                name: slug.to_string(),
            }))
        }

        async fn insert_event(&self, event: &NewEvent) -> Result<StoredEvent> {
            if self.fail_title.as_deref() == Some(event.title.as_str()) {
                anyhow::bail!("storage unavailable");
            }
            Ok(StoredEvent {
                id: event.id,
                title: event.title.clone(),
            })
        }

        async fn upsert_tag(&self, _name: &str) -> Result<Uuid> {
            Ok(Uuid::new_v4())
        }

        async fn tag_event(&self, _event_id: Uuid, _tag_id: Uuid) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn notify(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    fn candidate(title: &str) -> ExtractionCandidate {
        ExtractionCandidate {
            title: title.to_string(),
            date: today_in_reference_tz().format("%Y-%m-%d").to_string(),
            time: "20:00".to_string(),
            location: "Foro".to_string(),
            category_slug: "music".to_string(),
            city_slug: "mexico-city".to_string(),
            ..Default::default()
        }
    }

    fn pipeline(
        fetch_error: Option<FetchError>,
        extract_result: std::result::Result<Vec<ExtractionCandidate>, ExtractError>,
        store: MockStore,
    ) -> MiningPipeline {
        MiningPipeline::new(
            Arc::new(MockFetcher { error: fetch_error }),
            Arc::new(MockExtractor {
                result: extract_result,
            }),
            Arc::new(store),
        )
    }

    #[tokio::test]
    async fn empty_extraction_is_success_with_zero_counts() {
        let pipeline = pipeline(None, Ok(vec![]), MockStore::default());
        let summary = pipeline
            .mine("https://eventos.mx", Uuid::new_v4(), &NoopSink)
            .await;

        assert!(summary.success);
        assert_eq!(summary.events_extracted, 0);
        assert_eq!(summary.events_stored, 0);
        assert_eq!(summary.events_failed, 0);
        assert!(summary.details.is_some());
        assert!(summary.error.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_yields_failed_summary_with_stage_reason() {
        let pipeline = pipeline(
            Some(FetchError::ConnectionFailed),
            Ok(vec![]),
            MockStore::default(),
        );
        let summary = pipeline
            .mine("https://muerto.mx", Uuid::new_v4(), &NoopSink)
            .await;

        assert!(!summary.success);
        assert_eq!(
            summary.error.as_deref(),
            Some("Connection failed - domain not reachable")
        );
        assert_eq!(summary.events_extracted, 0);
        assert_eq!(summary.events_stored, 0);
        assert_eq!(summary.events_failed, 0);
    }

    #[tokio::test]
    async fn fetch_failure_streams_started_failed_end_only() {
        let pipeline = pipeline(
            Some(FetchError::ConnectionFailed),
            Ok(vec![]),
            MockStore::default(),
        );
        let sink = RecordingSink::default();
        pipeline.mine("https://muerto.mx", Uuid::new_v4(), &sink).await;

        let statuses: Vec<MiningStatus> = sink
            .updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.status)
            .collect();
        assert_eq!(
            statuses,
            vec![MiningStatus::Started, MiningStatus::Failed, MiningStatus::End]
        );
    }

    #[tokio::test]
    async fn extraction_failure_yields_failed_summary() {
        let pipeline = pipeline(None, Err(ExtractError::Quota), MockStore::default());
        let summary = pipeline
            .mine("https://eventos.mx", Uuid::new_v4(), &NoopSink)
            .await;

        assert!(!summary.success);
        assert_eq!(
            summary.error.as_deref(),
            Some("Extraction service quota or rate limit exceeded")
        );
    }

    #[tokio::test]
    async fn partial_storage_is_success_with_failed_count() {
        let pipeline = pipeline(
            None,
            Ok(vec![candidate("Uno"), candidate("Dos"), candidate("Tres")]),
            MockStore {
                fail_title: Some("Dos".to_string()),
            },
        );
        let summary = pipeline
            .mine("https://eventos.mx", Uuid::new_v4(), &NoopSink)
            .await;

        assert!(summary.success);
        assert_eq!(summary.events_extracted, 3);
        assert_eq!(summary.events_stored, 2);
        assert_eq!(summary.events_failed, 1);
    }

    #[tokio::test]
    async fn successful_run_streams_in_stage_order() {
        let pipeline = pipeline(None, Ok(vec![candidate("Uno")]), MockStore::default());
        let sink = RecordingSink::default();
        pipeline.mine("https://eventos.mx", Uuid::new_v4(), &sink).await;

        let statuses: Vec<MiningStatus> = sink
            .updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                MiningStatus::Started,
                MiningStatus::Progress,
                MiningStatus::Progress,
                MiningStatus::Completed,
                MiningStatus::End,
            ]
        );
    }

    #[tokio::test]
    async fn completed_notification_carries_counts() {
        let pipeline = pipeline(None, Ok(vec![candidate("Uno")]), MockStore::default());
        let sink = RecordingSink::default();
        pipeline.mine("https://eventos.mx", Uuid::new_v4(), &sink).await;

        let updates = sink.updates.lock().unwrap();
        let completed = updates
            .iter()
            .find(|u| u.status == MiningStatus::Completed)
            .unwrap();
        assert_eq!(completed.events_extracted, Some(1));
        assert_eq!(completed.events_stored, Some(1));
        assert_eq!(completed.events_failed, Some(0));
    }
}
