//! Sequential multi-model pipeline
//!
//! Each request runs its steps strictly in order (step `i + 1` consumes the
//! output of step `i`) inside its own [`ScratchArea`], so concurrent
//! requests share no mutable state.

pub mod runner;
pub mod scratch;

pub use runner::{PipelineError, PipelineRunner, RunOptions, RunOutcome};
pub use scratch::ScratchArea;
