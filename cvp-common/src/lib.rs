//! # cvp Common Library
//!
//! Shared code for the cvp speech enhancement service and tools:
//! - Pipeline step types and the canonical default pipeline
//! - Model registry (known models, their task and sample rate)
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod registry;
pub mod steps;

pub use config::{OutputMode, TomlConfig};
pub use error::{Error, Result};
pub use registry::{ModelRegistry, ModelSpec};
pub use steps::{default_pipeline, Pipeline, PipelineStep, Task, DEFAULT_PIPELINE};
