//! Enhancement model seam
//!
//! The pipeline runner only knows this trait: one synchronous call that turns
//! an input audio file into an output audio file for a `(task, model)` pair.
//! Inference, device placement and latency are entirely the implementation's
//! concern. The production implementation drives the Python `clearvoice`
//! package in a subprocess ([`ClearVoiceCli`]).

pub mod clearvoice;

pub use clearvoice::ClearVoiceCli;

use cvp_common::Task;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model invocation errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Runtime (interpreter, library) could not be started
    #[error("Model runtime unavailable: {0}")]
    Unavailable(String),

    /// Model ran and reported failure
    #[error("Model invocation failed ({status}): {stderr}")]
    Failed {
        /// Exit status as reported by the OS
        status: String,
        /// Tail of the model's stderr
        stderr: String,
    },

    /// Model reported success but wrote nothing
    #[error("Model produced no output at {}", .0.display())]
    NoOutput(PathBuf),

    /// Model refused the input (malformed audio, unsupported codec)
    #[error("Model rejected input: {0}")]
    Rejected(String),

    /// I/O error around the invocation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque enhancement function
///
/// Implementations must write exactly one file at `output` on success and
/// must not modify `input`.
pub trait EnhancementModel: Send + Sync {
    fn apply(
        &self,
        task: Task,
        model_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<(), ModelError>;
}
