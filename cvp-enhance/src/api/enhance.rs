//! Enhance endpoint
//!
//! POST /enhance: resolve the input, run the pipeline, package the result.
//! All-or-nothing: a failed request returns only an error and leaves no
//! output file behind.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use cvp_common::{default_pipeline, OutputMode, Pipeline};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::OUTPUTS_ROUTE;
use crate::error::{ApiError, ApiResult};
use crate::packager::{self, PackagedOutput};
use crate::pipeline::{RunOptions, ScratchArea};
use crate::source::AudioSource;
use crate::AppState;

/// POST /enhance request
///
/// Exactly one of `file`, `input_url`, `input_data` must be set.
#[derive(Debug, Default, Deserialize)]
pub struct EnhanceRequest {
    /// Path on this host (relative to the input directory)
    #[serde(default)]
    pub file: Option<String>,
    /// http(s) URL to download
    #[serde(default)]
    pub input_url: Option<String>,
    /// Base64 audio payload
    #[serde(default)]
    pub input_data: Option<String>,
    /// Steps to run; the default pipeline when omitted
    #[serde(default)]
    pub model_pipeline: Option<Pipeline>,
    /// Response shape; the configured default when omitted
    #[serde(default)]
    pub output_mode: Option<OutputMode>,
    /// Keep the scratch area and copy (not move) the final artifact
    #[serde(default)]
    pub retain_intermediates: Option<bool>,
}

/// Input as seen by the pipeline
#[derive(Debug, Serialize)]
pub struct InputSummary {
    pub source: &'static str,
    pub transcoded: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
}

/// Successful enhance result
#[derive(Debug, Serialize)]
pub struct EnhanceOutput {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub packaged: PackagedOutput,
    pub models_used: Vec<String>,
    pub steps: Pipeline,
    pub input: InputSummary,
    pub elapsed_ms: u64,
}

/// POST /enhance response
#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    pub output: EnhanceOutput,
}

/// POST /enhance
///
/// Body rejections (bad JSON, unknown task, wrong field type) are reported
/// through [`ApiError`] like every other failure.
pub async fn enhance(
    State(state): State<AppState>,
    payload: Result<Json<EnhanceRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();

    let result = match payload {
        Ok(Json(request)) => process(&state, request_id, request).await,
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Enhance request failed");
            state.record_error(e.to_string()).await;
            e.to_response(state.config.verbose_errors)
        }
    }
}

async fn process(
    state: &AppState,
    request_id: Uuid,
    request: EnhanceRequest,
) -> ApiResult<EnhanceResponse> {
    let source = AudioSource::from_fields(request.file, request.input_url, request.input_data)?;
    let steps = request.model_pipeline.unwrap_or_else(default_pipeline);
    state.runner.validate(&steps)?;

    let retain = request
        .retain_intermediates
        .unwrap_or(state.config.retain_intermediates);
    let mode = request
        .output_mode
        .unwrap_or(state.config.default_output_mode);

    tracing::info!(
        request_id = %request_id,
        source = source.kind(),
        steps = steps.len(),
        mode = ?mode,
        retain,
        "Enhance request accepted"
    );

    let scratch = ScratchArea::create(&state.config.scratch_dir, request_id, retain)
        .map_err(|e| ApiError::Internal(format!("Failed to create scratch area: {}", e)))?;
    let resolved = state
        .resolver
        .resolve(&source, &scratch.path().join("input"))
        .await?;

    // Declared before the cancel guard so the token is cancelled first on drop
    let mut output = OutputFile {
        request_id,
        path: state
            .config
            .output_dir
            .join(format!("output_{}.wav", request_id)),
        keep: false,
    };

    // Stops the pipeline at the next step boundary if this request is dropped
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let outcome = {
        let runner = state.runner.clone();
        let input = resolved.path.clone();
        let steps = steps.clone();
        let work_dir = scratch.path().join("steps");
        let output = output.path.clone();
        let options = RunOptions {
            retain_intermediates: retain,
        };
        tokio::task::spawn_blocking(move || {
            runner.run(&input, &steps, &work_dir, &output, &options, &cancel)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {}", e)))??
    };

    let artifact = outcome.output.clone();
    let packaged = tokio::task::spawn_blocking(move || {
        packager::package(&artifact, mode, OUTPUTS_ROUTE)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Packaging task failed: {}", e)))??;

    // Inline-only results are not kept unless the caller asked to retain
    output.keep = mode.includes_reference() || retain;

    let elapsed_ms = outcome.elapsed.as_millis() as u64;
    tracing::info!(
        request_id = %request_id,
        elapsed_ms,
        output = %outcome.output.display(),
        kept = output.keep,
        "Enhance request complete"
    );

    Ok(EnhanceResponse {
        output: EnhanceOutput {
            request_id,
            packaged,
            models_used: steps.iter().map(|s| s.model_name.clone()).collect(),
            steps,
            input: InputSummary {
                source: resolved.source_kind,
                transcoded: resolved.transcoded,
                sample_rate: resolved.info.sample_rate,
                channels: resolved.info.channels,
                duration_secs: resolved.info.duration_secs(),
            },
            elapsed_ms,
        },
    })
}

/// Request output file, removed on drop unless `keep` is set
///
/// Covers every early return as well as a dropped request future.
struct OutputFile {
    request_id: Uuid,
    path: PathBuf,
    keep: bool,
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(
                request_id = %self.request_id,
                path = %self.path.display(),
                "Removed output file"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                error = %e,
                "Failed to remove output file"
            ),
        }
    }
}

/// Build enhance routes
pub fn enhance_routes() -> Router<AppState> {
    Router::new().route("/enhance", post(enhance))
}
