//! Model registry
//!
//! Known models with the task they implement and their native sample rate.
//! Pipelines are checked against the registry before any file is touched, so
//! a typo in a model name fails the request up front instead of deep inside
//! the model library.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::steps::{PipelineStep, Task};

/// Registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Identifier passed to the model library (e.g. "MossFormer2_SE_48K")
    pub name: String,
    /// Task the model implements
    pub task: Task,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, task: Task, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            task,
            sample_rate,
        }
    }
}

/// Why a step was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepRejection {
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("model '{model}' implements {actual}, not {requested}")]
    TaskMismatch {
        model: String,
        requested: Task,
        actual: Task,
    },

    #[error("task {0} produces more than one output and cannot be chained")]
    UnsupportedTask(Task),
}

/// Lookup table of known models, keyed by name
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Models shipped with the ClearVoice library
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for spec in [
            ModelSpec::new("FRCRN_SE_16K", Task::SpeechEnhancement, 16_000),
            ModelSpec::new("MossFormerGAN_SE_16K", Task::SpeechEnhancement, 16_000),
            ModelSpec::new("MossFormer2_SE_48K", Task::SpeechEnhancement, 48_000),
            ModelSpec::new("MossFormer2_SR_48K", Task::SpeechSuperResolution, 48_000),
            ModelSpec::new("MossFormer2_SS_16K", Task::SpeechSeparation, 16_000),
            ModelSpec::new("AV_MossFormer2_TSE_16K", Task::TargetSpeakerExtraction, 16_000),
        ] {
            registry.register(spec);
        }
        registry
    }

    /// Add or replace a model
    pub fn register(&mut self, spec: ModelSpec) {
        if let Some(previous) = self.models.insert(spec.name.clone(), spec) {
            tracing::debug!(model = %previous.name, "Replaced model registry entry");
        }
    }

    /// Builtin models plus `extra` (extra entries win on name clashes)
    pub fn with_extra(extra: impl IntoIterator<Item = ModelSpec>) -> Self {
        let mut registry = Self::builtin();
        for spec in extra {
            registry.register(spec);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All models, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// Check that one step can run as part of a chain
    pub fn check_step(&self, step: &PipelineStep) -> Result<&ModelSpec, StepRejection> {
        if !step.task.is_chainable() {
            return Err(StepRejection::UnsupportedTask(step.task));
        }

        let spec = self
            .get(&step.model_name)
            .ok_or_else(|| StepRejection::UnknownModel(step.model_name.clone()))?;

        if spec.task != step.task {
            return Err(StepRejection::TaskMismatch {
                model: spec.name.clone(),
                requested: step.task,
                actual: spec.task,
            });
        }

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::default_pipeline;

    #[test]
    fn test_default_pipeline_is_registered() {
        let registry = ModelRegistry::builtin();
        for step in default_pipeline() {
            let spec = registry.check_step(&step).unwrap();
            assert_eq!(spec.sample_rate, 48_000);
        }
    }

    #[test]
    fn test_unknown_model_rejected() {
        let registry = ModelRegistry::builtin();
        let step = PipelineStep::new(Task::SpeechEnhancement, "NoSuchModel");
        assert_eq!(
            registry.check_step(&step),
            Err(StepRejection::UnknownModel("NoSuchModel".to_string()))
        );
    }

    #[test]
    fn test_task_mismatch_rejected() {
        let registry = ModelRegistry::builtin();
        let step = PipelineStep::new(Task::SpeechEnhancement, "MossFormer2_SR_48K");
        let err = registry.check_step(&step).unwrap_err();
        assert!(matches!(
            err,
            StepRejection::TaskMismatch {
                actual: Task::SpeechSuperResolution,
                ..
            }
        ));
    }

    #[test]
    fn test_separation_not_chainable() {
        let registry = ModelRegistry::builtin();
        let step = PipelineStep::new(Task::SpeechSeparation, "MossFormer2_SS_16K");
        assert_eq!(
            registry.check_step(&step),
            Err(StepRejection::UnsupportedTask(Task::SpeechSeparation))
        );
    }

    #[test]
    fn test_extra_models_override_builtin() {
        let registry = ModelRegistry::with_extra([
            ModelSpec::new("Custom_SE_24K", Task::SpeechEnhancement, 24_000),
            ModelSpec::new("FRCRN_SE_16K", Task::SpeechEnhancement, 22_050),
        ]);
        assert_eq!(registry.len(), ModelRegistry::builtin().len() + 1);
        assert_eq!(registry.get("Custom_SE_24K").unwrap().sample_rate, 24_000);
        assert_eq!(registry.get("FRCRN_SE_16K").unwrap().sample_rate, 22_050);
    }
}
