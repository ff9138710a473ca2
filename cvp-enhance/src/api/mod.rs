//! HTTP API handlers for cvp-enhance
//!
//! - `POST /enhance` run a pipeline on one input
//! - `GET /models` list the model registry and the default pipeline
//! - `GET /health` liveness and diagnostics

pub mod enhance;
pub mod health;
pub mod models;

pub use enhance::enhance_routes;
pub use health::health_routes;
pub use models::model_routes;
