//! Model registry listing

use axum::{extract::State, routing::get, Json, Router};
use cvp_common::{default_pipeline, ModelSpec, Pipeline};
use serde::Serialize;

use crate::AppState;

/// GET /models response
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelSpec>,
    pub default_pipeline: Pipeline,
}

/// GET /models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.registry().iter().cloned().collect(),
        default_pipeline: default_pipeline(),
    })
}

pub fn model_routes() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}
