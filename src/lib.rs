use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use moka::notification::RemovalCause;
use moka::sync::Cache;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use services::insights::{InsightGenerator, TextGenerator};
use services::llm_agent::OpenAiGenerator;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub config: config::Config,
    pub insights: InsightGenerator,
    /// Dashboard id to the generated HTML file.
    pub dashboards: Cache<String, PathBuf>,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        let insights = insight_generator(&config);
        Self::with_insights(config, insights)
    }

    pub fn with_insights(config: config::Config, insights: InsightGenerator) -> Self {
        Self {
            dashboards: dashboard_cache(config.max_dashboards, config.dashboard_ttl),
            config,
            insights,
        }
    }
}

/// Id to HTML file. A dashboard leaving the cache takes its file with it.
pub fn dashboard_cache(max_dashboards: u64, ttl: Option<Duration>) -> Cache<String, PathBuf> {
    let mut builder = Cache::builder()
        .max_capacity(max_dashboards)
        .eviction_listener(|id: Arc<String>, path: PathBuf, cause: RemovalCause| {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Deleted dashboard {} ({:?})", id, cause),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
            }
        });
    if let Some(ttl) = ttl {
        builder = builder.time_to_live(ttl);
    }
    builder.build()
}

/// Narrative insights are only enabled when an API key is configured.
pub fn insight_generator(config: &config::Config) -> InsightGenerator {
    let provider = config.openai_key.as_deref().map(|key| {
        tracing::info!("Narrative insights enabled with {}", config.openai_model);
        Arc::new(OpenAiGenerator::new(key, &config.openai_model)) as Arc<dyn TextGenerator>
    });
    InsightGenerator::new(provider)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .merge(routes::routes())
        .merge(routes::dashboard::routes(&state.config.cors_origin))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
