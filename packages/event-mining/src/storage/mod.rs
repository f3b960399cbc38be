//! Datastore seam for the processing stage.

pub mod postgres;

pub use postgres::PostgresEventStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Resolved city reference.
#[derive(Debug, Clone)]
pub struct CityRef {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// Resolved category reference.
#[derive(Debug, Clone)]
pub struct CategoryRef {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// A normalized, persistence-ready event row. Mined records are always
/// written unpublished and attributed to the triggering admin.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub address: String,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub event_url: String,
    pub city_id: Uuid,
    pub category_id: Uuid,
    pub published: bool,
    pub created_by: Uuid,
    /// Case/diacritic-folded title, kept for indexed duplicate lookups.
    pub normalized_title: String,
    /// Case/diacritic-folded venue, kept for indexed duplicate lookups.
    pub normalized_venue: String,
}

/// Minimal view of a stored event returned from inserts.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: Uuid,
    pub title: String,
}

/// Storage operations the processor needs.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up an existing event with the same normalized title and venue.
    async fn find_duplicate(
        &self,
        normalized_title: &str,
        normalized_venue: &str,
    ) -> Result<Option<Uuid>>;

    async fn city_by_slug(&self, slug: &str) -> Result<Option<CityRef>>;

    async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRef>>;

    async fn insert_event(&self, event: &NewEvent) -> Result<StoredEvent>;

    /// Create the tag if it does not exist; returns its id either way.
    async fn upsert_tag(&self, name: &str) -> Result<Uuid>;

    async fn tag_event(&self, event_id: Uuid, tag_id: Uuid) -> Result<()>;
}
