// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod generate;
pub mod jobs;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod profiles;
pub mod rank;
pub mod search;
pub mod store;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::PipelineError;
pub use crate::model::{AuditedReport, EvidenceClaim, SearchResult, UserProfile};
pub use crate::pipeline::Pipeline;

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::config::ai::AiConfig;
use crate::config::EngineConfig;
use crate::generate::build_generator;
use crate::pipeline::HttpFetcherSource;
use crate::search::providers::{mock::MockSearchProvider, tavily::TavilyProvider};
use crate::search::types::SearchProvider;
use crate::store::MemoryStore;

/// Log filter used when `RUST_LOG` is unset: component targets at info, the rest at warn.
pub const DEFAULT_LOG_FILTER: &str =
    "search=info,fetch=info,audit=info,extract=info,pipeline=info,jobs=info,api=info,warn";

fn mock_mode() -> bool {
    std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
}

/// Pipeline wired from config files and environment.
///
/// With `AI_TEST_MODE=mock` the search provider is an empty in-memory mock, so the
/// service runs without any external API keys.
pub fn pipeline_from_env() -> anyhow::Result<Pipeline> {
    let cfg = EngineConfig::load()?;
    let provider: Arc<dyn SearchProvider> = if mock_mode() {
        Arc::new(MockSearchProvider::new())
    } else {
        Arc::new(TavilyProvider::from_env(cfg.search.timeout())?)
    };
    let generator = build_generator(&AiConfig::load_or_default());
    let fetchers = Arc::new(HttpFetcherSource::new(cfg.fetch.clone()));
    info!(
        target: "api",
        provider = provider.name(),
        generator = generator.provider_name(),
        allow_list = cfg.allow_list.len(),
        "pipeline configured"
    );
    Ok(Pipeline::new(cfg, provider, generator, fetchers))
}

/// Full application router: API routes plus `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let metrics = crate::metrics::Metrics::global()?;
    let pipeline = Arc::new(pipeline_from_env()?);
    let state = AppState::new(pipeline, Arc::new(MemoryStore::new()));
    Ok(router(state).merge(metrics.router()))
}
