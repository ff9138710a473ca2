//! cvp-enhance library interface
//!
//! Speech enhancement pipeline service: resolves an input audio source,
//! runs it through an ordered list of model steps and returns the result.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod packager;
pub mod pipeline;
pub mod source;

pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use cvp_common::ModelRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::model::EnhancementModel;
use crate::pipeline::PipelineRunner;
use crate::source::{SourceError, SourceResolver};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service settings
    pub config: Arc<ServiceConfig>,
    /// Pipeline runner (registry + model)
    pub runner: PipelineRunner,
    /// Input source resolver
    pub resolver: Arc<SourceResolver>,
    /// Cancelled on shutdown; each request runs under a child token
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last request error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        registry: ModelRegistry,
        model: Arc<dyn EnhancementModel>,
    ) -> Result<Self, SourceError> {
        let resolver = SourceResolver::new(
            config.input_dir.clone(),
            config.download_timeout,
            config.max_download_bytes,
        )?;

        Ok(Self {
            config: Arc::new(config),
            runner: PipelineRunner::new(Arc::new(registry), model),
            resolver: Arc::new(resolver),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.runner.registry()
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let outputs = ServeDir::new(state.config.output_dir.clone());
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .merge(api::enhance_routes())
        .merge(api::model_routes())
        .merge(api::health_routes())
        .nest_service(config::OUTPUTS_ROUTE, outputs)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
