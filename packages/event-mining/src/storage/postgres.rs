use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{CategoryRef, CityRef, EventStore, NewEvent, StoredEvent};

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn find_duplicate(
        &self,
        normalized_title: &str,
        normalized_venue: &str,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            SELECT id
            FROM events
            WHERE normalized_title = $1 AND normalized_venue = $2
            LIMIT 1
            "#,
        )
        .bind(normalized_title)
        .bind(normalized_venue)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check for duplicate event")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn city_by_slug(&self, slug: &str) -> Result<Option<CityRef>> {
        let row = sqlx::query("SELECT id, slug, name FROM cities WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up city by slug")?;

        Ok(row.map(|r| CityRef {
            id: r.get("id"),
            slug: r.get("slug"),
            name: r.get("name"),
        }))
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRef>> {
        let row = sqlx::query("SELECT id, slug, name FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up category by slug")?;

        Ok(row.map(|r| CategoryRef {
            id: r.get("id"),
            slug: r.get("slug"),
            name: r.get("name"),
        }))
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<StoredEvent> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, title, description, starts_at, location, address,
                price, image_url, event_url, city_id, category_id,
                published, created_by, normalized_title, normalized_venue
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(&event.location)
        .bind(&event.address)
        .bind(event.price)
        .bind(&event.image_url)
        .bind(&event.event_url)
        .bind(event.city_id)
        .bind(event.category_id)
        .bind(event.published)
        .bind(event.created_by)
        .bind(&event.normalized_title)
        .bind(&event.normalized_venue)
        .execute(&self.pool)
        .await
        .context("Failed to insert event")?;

        Ok(StoredEvent {
            id: event.id,
            title: event.title.clone(),
        })
    }

    async fn upsert_tag(&self, name: &str) -> Result<Uuid> {
        // The no-op update makes RETURNING yield the id on conflict too.
        let row = sqlx::query(
            r#"
            INSERT INTO tags (id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert tag")?;

        Ok(row.get("id"))
    }

    async fn tag_event(&self, event_id: Uuid, tag_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_tags (event_id, tag_id) VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .context("Failed to associate tag with event")?;

        Ok(())
    }
}
