//! On-Demand Feature Server
//!
//! REST surface over the spec registry and the derivation engine.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use derivation_engine::{DerivationEngine, TransformCache};
use feature_model::TransformRegistry;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use registry_adapter::{InMemoryStore, RegistryStore, SpecRegistry};
use schema_validator::{ValidationConfig, Validator};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod config;
mod error;
mod routes;

pub use config::ServerConfig;
pub use error::ServerError;

/// Application state shared across handlers
pub struct AppState {
    pub registry: SpecRegistry,
    pub engine: DerivationEngine,
    pub config: ServerConfig,
    /// Prometheus handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    /// Create state over an in-memory registry store
    pub fn new(config: ServerConfig, transforms: TransformRegistry) -> Self {
        Self::with_store(config, transforms, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(
        config: ServerConfig,
        transforms: TransformRegistry,
        store: Arc<dyn RegistryStore>,
    ) -> Self {
        let validator = Validator::new(ValidationConfig::default(), Arc::new(transforms));
        let cache = Arc::new(TransformCache::new());

        Self {
            registry: SpecRegistry::new(store, validator.clone(), cache.clone()),
            engine: DerivationEngine::new(config.engine_config(), validator, cache),
            config,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cached_transforms: usize,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let views = "/api/v1/projects/:project/on-demand-feature-views";
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(views, get(routes::views::list_views))
        .route(
            &format!("{views}/:name"),
            get(routes::views::get_view)
                .put(routes::views::apply_view)
                .delete(routes::views::delete_view),
        )
        .route(&format!("{views}/:name/schema"), get(routes::views::get_schema))
        .route(&format!("{views}/:name/derive"), post(routes::derive::derive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cached_transforms: state.engine.cache().len(),
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<SharedState>) -> Result<String, ServerError> {
    let state = state.read().await;
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ServerError::MetricsDisabled)
}

/// Initialize logging
pub fn init_logging(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("Failed to set tracing subscriber")
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Run the server
pub async fn run_server(config: ServerConfig, transforms: TransformRegistry) -> anyhow::Result<()> {
    let mut state = AppState::new(config.clone(), transforms);
    if config.metrics_enabled {
        state = state.with_metrics(init_metrics()?);
    }
    let app = create_router(Arc::new(RwLock::new(state)));

    info!("Starting feature server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
