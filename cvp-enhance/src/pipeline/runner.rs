//! Pipeline Runner
//!
//! Threads one audio file through an ordered list of `(task, model)` steps.
//!
//! # Flow
//! - **Validation**: every step is checked against the model registry before
//!   any file is read or written
//! - **Execution**: step `i` reads the artifact produced by step `i - 1` (the
//!   input for step 0) and writes a new artifact into the scratch directory
//! - **Relocation**: the last artifact is copied or moved to the output path
//!
//! # Error Handling
//! - The first failing step aborts the run; there is no retry and no partial
//!   recovery
//! - Errors carry the step index, task and model name
//! - The output path is only written after every step succeeded, via a
//!   `.partial` sibling renamed into place
//!
//! # Example
//! ```rust,ignore
//! let runner = PipelineRunner::new(registry, model);
//! let outcome = runner.run(&input, &steps, scratch.path(), &output, &options, &cancel)?;
//! ```

use crate::model::{EnhancementModel, ModelError};
use cvp_common::registry::StepRejection;
use cvp_common::{ModelRegistry, PipelineStep, Task};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline errors
///
/// Step numbers in messages are 1-based; the `index` fields are 0-based.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Step rejected by the registry (nothing was executed)
    #[error("step {} of {total} ({}, {}) rejected: {reason}", .index + 1, .step.task, .step.model_name)]
    InvalidStep {
        index: usize,
        total: usize,
        step: PipelineStep,
        #[source]
        reason: StepRejection,
    },

    /// Input artifact missing or not a file
    #[error("Input audio not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Scratch directory could not be created
    #[error("Failed to prepare scratch directory {}: {source}", .path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model invocation failed
    #[error("step {} of {total} ({task}, {model_name}) failed: {source}", .index + 1)]
    StepFailed {
        index: usize,
        total: usize,
        task: Task,
        model_name: String,
        #[source]
        source: ModelError,
    },

    /// Cancellation observed at a step boundary
    #[error("pipeline cancelled after {completed} of {total} steps")]
    Cancelled { completed: usize, total: usize },

    /// Final artifact could not be placed at the output path
    #[error("Failed to write output {}: {source}", .to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// 0-based index of the offending step, if the error is tied to one
    pub fn step_index(&self) -> Option<usize> {
        match self {
            PipelineError::InvalidStep { index, .. } | PipelineError::StepFailed { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// True when the pipeline was rejected before anything ran
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::InvalidStep { .. })
    }
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Copy the final artifact out of the scratch area instead of moving it
    pub retain_intermediates: bool,
}

/// Successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final artifact (the output path)
    pub output: PathBuf,
    /// Artifacts written by each step, in step order. When intermediates are
    /// not retained the last one has been moved to `output`.
    pub intermediates: Vec<PathBuf>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Sequential multi-model pipeline runner
#[derive(Clone)]
pub struct PipelineRunner {
    registry: Arc<ModelRegistry>,
    model: Arc<dyn EnhancementModel>,
}

impl PipelineRunner {
    pub fn new(registry: Arc<ModelRegistry>, model: Arc<dyn EnhancementModel>) -> Self {
        Self { registry, model }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Check every step against the registry
    pub fn validate(&self, steps: &[PipelineStep]) -> Result<(), PipelineError> {
        let total = steps.len();
        for (index, step) in steps.iter().enumerate() {
            self.registry
                .check_step(step)
                .map_err(|reason| PipelineError::InvalidStep {
                    index,
                    total,
                    step: step.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Run `steps` on `input`, leaving the result at `output`
    ///
    /// Intermediate files are written to `scratch_dir` (created if absent)
    /// and are not cleaned up here; the scratch area owner does that.
    /// `cancel` is checked before each step and before relocation, never
    /// during a model call.
    pub fn run(
        &self,
        input: &Path,
        steps: &[PipelineStep],
        scratch_dir: &Path,
        output: &Path,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let total = steps.len();

        self.validate(steps)?;

        if !input.is_file() {
            return Err(PipelineError::MissingInput(input.to_path_buf()));
        }

        std::fs::create_dir_all(scratch_dir).map_err(|source| PipelineError::Scratch {
            path: scratch_dir.to_path_buf(),
            source,
        })?;

        // Distinguishes this run's files from leftovers of earlier runs
        let run_id = Uuid::new_v4().simple().to_string();
        let run_tag = &run_id[..8];

        info!(
            input = %input.display(),
            steps = total,
            run = run_tag,
            "Pipeline started"
        );

        let mut current = input.to_path_buf();
        let mut intermediates = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(completed = index, total, "Pipeline cancelled");
                return Err(PipelineError::Cancelled {
                    completed: index,
                    total,
                });
            }

            let artifact = scratch_dir.join(intermediate_name(index, &step.model_name, run_tag));

            info!(
                step = index + 1,
                total,
                task = %step.task,
                model = %step.model_name,
                "Running pipeline step"
            );

            let step_started = Instant::now();
            self.model
                .apply(step.task, &step.model_name, &current, &artifact)
                .and_then(|()| {
                    if artifact.is_file() {
                        Ok(())
                    } else {
                        Err(ModelError::NoOutput(artifact.clone()))
                    }
                })
                .map_err(|source| PipelineError::StepFailed {
                    index,
                    total,
                    task: step.task,
                    model_name: step.model_name.clone(),
                    source,
                })?;

            debug!(
                step = index + 1,
                artifact = %artifact.display(),
                elapsed_ms = step_started.elapsed().as_millis() as u64,
                "Pipeline step complete"
            );

            intermediates.push(artifact.clone());
            current = artifact;
        }

        if cancel.is_cancelled() {
            warn!(completed = total, total, "Pipeline cancelled before output was written");
            return Err(PipelineError::Cancelled {
                completed: total,
                total,
            });
        }

        let placed = if total == 0 {
            if same_file(input, output) {
                false
            } else {
                place_output(input, output, true)?;
                true
            }
        } else {
            place_output(&current, output, options.retain_intermediates)?;
            true
        };

        // A requester that went away during relocation would never collect it
        if cancel.is_cancelled() {
            warn!(output = %output.display(), "Pipeline cancelled while placing output");
            if placed {
                if let Err(e) = std::fs::remove_file(output) {
                    warn!(output = %output.display(), error = %e, "Failed to remove output");
                }
            }
            return Err(PipelineError::Cancelled {
                completed: total,
                total,
            });
        }

        let elapsed = started.elapsed();
        info!(
            output = %output.display(),
            steps = total,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline complete"
        );

        Ok(RunOutcome {
            output: output.to_path_buf(),
            intermediates,
            elapsed,
        })
    }
}

/// `step_{index}_{model}_{run}.wav`, unique per run, step and model
fn intermediate_name(index: usize, model_name: &str, run_tag: &str) -> String {
    let model: String = model_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("step_{:02}_{}_{}.wav", index, model, run_tag)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy or move `from` to `to` through a `.partial` sibling
fn place_output(from: &Path, to: &Path, copy: bool) -> Result<(), PipelineError> {
    let relocate_err = |source| PipelineError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(relocate_err)?;
    }

    let mut partial = to.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let staged = if copy {
        std::fs::copy(from, &partial).map(|_| ())
    } else {
        // rename fails across filesystems; fall back to copy + delete
        std::fs::rename(from, &partial).or_else(|_| {
            std::fs::copy(from, &partial)?;
            std::fs::remove_file(from)
        })
    };

    if let Err(e) = staged.and_then(|()| std::fs::rename(&partial, to)) {
        let _ = std::fs::remove_file(&partial);
        return Err(relocate_err(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intermediate_name_sanitizes_model() {
        assert_eq!(
            intermediate_name(1, "MossFormer2_SR_48K", "abcd1234"),
            "step_01_MossFormer2_SR_48K_abcd1234.wav"
        );
        assert_eq!(
            intermediate_name(12, "org/model v2", "abcd1234"),
            "step_12_org_model_v2_abcd1234.wav"
        );
    }

    #[test]
    fn test_place_output_copy_keeps_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("a.wav");
        let to = dir.path().join("out").join("b.wav");
        std::fs::write(&from, b"RIFF").unwrap();

        place_output(&from, &to, true).unwrap();

        assert!(from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"RIFF");
        assert!(!dir.path().join("out").join("b.wav.partial").exists());
    }

    #[test]
    fn test_place_output_move_removes_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("a.wav");
        let to = dir.path().join("b.wav");
        std::fs::write(&from, b"RIFF").unwrap();

        place_output(&from, &to, false).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"RIFF");
    }

    #[test]
    fn test_place_output_missing_source_leaves_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let to = dir.path().join("b.wav");

        let err = place_output(&dir.path().join("missing.wav"), &to, true).unwrap_err();

        assert!(matches!(err, PipelineError::Relocate { .. }));
        assert!(!to.exists());
        assert!(!dir.path().join("b.wav.partial").exists());
    }

    #[test]
    fn test_same_file_detects_equivalent_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.wav");
        std::fs::write(&file, b"x").unwrap();
        let dotted = dir.path().join(".").join("a.wav");

        assert!(same_file(&file, &dotted));
        assert!(!same_file(&file, &dir.path().join("b.wav")));
    }
}
