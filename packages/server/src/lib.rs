//! HTTP surface for the Vívelo mining backend.
//!
//! Only the mining endpoint lives here; event CRUD and moderation are
//! served elsewhere.

pub mod config;
pub mod routes;

pub use config::Config;

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;

use event_mining::{
    MiningConfig, MiningPipeline, OpenAiExtractor, PostgresEventStore, WebContentFetcher,
};

/// Shared state for the mining routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MiningPipeline>,
}

/// Assemble the application router with the production pipeline.
pub fn build_app(pool: PgPool, config: &Config) -> anyhow::Result<Router> {
    let fetcher = WebContentFetcher::new(MiningConfig::from_env())?;
    let extractor =
        OpenAiExtractor::new(config.openai_api_key.clone()).with_model(config.openai_model.clone());
    let store = PostgresEventStore::new(pool);

    let pipeline = MiningPipeline::new(Arc::new(fetcher), Arc::new(extractor), Arc::new(store));

    Ok(routes::router(AppState {
        pipeline: Arc::new(pipeline),
    }))
}
