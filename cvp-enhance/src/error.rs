//! Error types for cvp-enhance
//!
//! Every failure of a request is converted here into one JSON error
//! response; nothing propagates past the handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::packager::PackagingError;
use crate::pipeline::PipelineError;
use crate::source::SourceError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input could not be resolved (400)
    #[error(transparent)]
    BadInput(#[from] SourceError),

    /// Pipeline rejected or failed (422 / 500 / 503)
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Final artifact could not be packaged (500)
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// Request body rejected before reaching the handler (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadInput(_) => (StatusCode::BAD_REQUEST, "BAD_INPUT"),
            ApiError::Pipeline(PipelineError::InvalidStep { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PIPELINE")
            }
            ApiError::Pipeline(PipelineError::Cancelled { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED")
            }
            ApiError::Pipeline(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PIPELINE_FAILED"),
            ApiError::Packaging(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PACKAGING_FAILED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Messages of the underlying causes, outermost first
    pub fn trace(&self) -> Vec<String> {
        let mut trace = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            trace.push(err.to_string());
            source = err.source();
        }
        trace
    }

    /// Build the error response, with the cause chain when `verbose`
    pub fn to_response(&self, verbose: bool) -> Response {
        let (status, code) = self.status_and_code();

        let mut error = json!({
            "code": code,
            "message": self.to_string(),
        });
        if verbose {
            error["trace"] = json!(self.trace());
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
