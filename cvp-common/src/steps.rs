//! Pipeline step types
//!
//! A pipeline is an ordered list of `(task, model)` steps. The output of step
//! `i` is the input of step `i + 1`, so order is significant. An empty
//! pipeline is valid and leaves the input unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Enhancement task understood by the model library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Denoise / dereverberate speech
    SpeechEnhancement,
    /// Reconstruct high-band content (bandwidth extension)
    SpeechSuperResolution,
    /// Split a mixture into one file per speaker
    SpeechSeparation,
    /// Extract a target speaker (requires a reference video stream)
    TargetSpeakerExtraction,
}

impl Task {
    /// Wire name as passed to the model library
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::SpeechEnhancement => "speech_enhancement",
            Task::SpeechSuperResolution => "speech_super_resolution",
            Task::SpeechSeparation => "speech_separation",
            Task::TargetSpeakerExtraction => "target_speaker_extraction",
        }
    }

    /// Whether one invocation turns one audio file into exactly one audio file.
    ///
    /// Only such tasks can be chained; separation yields several outputs and
    /// target speaker extraction needs a visual reference.
    pub fn is_chainable(&self) -> bool {
        matches!(self, Task::SpeechEnhancement | Task::SpeechSuperResolution)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "speech_enhancement" => Ok(Task::SpeechEnhancement),
            "speech_super_resolution" => Ok(Task::SpeechSuperResolution),
            "speech_separation" => Ok(Task::SpeechSeparation),
            "target_speaker_extraction" => Ok(Task::TargetSpeakerExtraction),
            other => Err(Error::InvalidInput(format!("Unknown task: {}", other))),
        }
    }
}

/// One enhancement operation: run `model_name` for `task`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub task: Task,
    pub model_name: String,
}

impl PipelineStep {
    pub fn new(task: Task, model_name: impl Into<String>) -> Self {
        Self {
            task,
            model_name: model_name.into(),
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task, self.model_name)
    }
}

/// Parses the `task:model` form used on the command line
impl FromStr for PipelineStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (task, model) = s.split_once(':').ok_or_else(|| {
            Error::InvalidInput(format!("Expected <task>:<model>, got '{}'", s))
        })?;

        let model = model.trim();
        if model.is_empty() {
            return Err(Error::InvalidInput(format!("Missing model name in '{}'", s)));
        }

        Ok(PipelineStep::new(task.parse()?, model))
    }
}

/// Ordered sequence of steps
pub type Pipeline = Vec<PipelineStep>;

/// Canonical default pipeline: enhance, super-resolve, enhance again
pub const DEFAULT_PIPELINE: [(Task, &str); 3] = [
    (Task::SpeechEnhancement, "MossFormer2_SE_48K"),
    (Task::SpeechSuperResolution, "MossFormer2_SR_48K"),
    (Task::SpeechEnhancement, "MossFormer2_SE_48K"),
];

/// Owned copy of [`DEFAULT_PIPELINE`]
pub fn default_pipeline() -> Pipeline {
    DEFAULT_PIPELINE
        .iter()
        .map(|(task, model)| PipelineStep::new(*task, *model))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_serde_uses_snake_case() {
        let step: PipelineStep = serde_json::from_str(
            r#"{"task": "speech_super_resolution", "model_name": "MossFormer2_SR_48K"}"#,
        )
        .unwrap();
        assert_eq!(step.task, Task::SpeechSuperResolution);
        assert_eq!(step.model_name, "MossFormer2_SR_48K");

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["task"], "speech_super_resolution");
    }

    #[test]
    fn test_unknown_task_rejected_by_serde() {
        let result: Result<PipelineStep, _> =
            serde_json::from_str(r#"{"task": "karaoke", "model_name": "X"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cli_step() {
        let step: PipelineStep = "speech_enhancement:FRCRN_SE_16K".parse().unwrap();
        assert_eq!(step, PipelineStep::new(Task::SpeechEnhancement, "FRCRN_SE_16K"));
        assert_eq!(step.to_string(), "speech_enhancement:FRCRN_SE_16K");

        assert!("speech_enhancement".parse::<PipelineStep>().is_err());
        assert!("speech_enhancement:".parse::<PipelineStep>().is_err());
        assert!("denoise:FRCRN_SE_16K".parse::<PipelineStep>().is_err());
    }

    #[test]
    fn test_default_pipeline_order() {
        let pipeline = default_pipeline();
        let names: Vec<_> = pipeline.iter().map(|s| s.model_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["MossFormer2_SE_48K", "MossFormer2_SR_48K", "MossFormer2_SE_48K"]
        );
        assert_eq!(pipeline[1].task, Task::SpeechSuperResolution);
    }

    #[test]
    fn test_chainable_tasks() {
        assert!(Task::SpeechEnhancement.is_chainable());
        assert!(Task::SpeechSuperResolution.is_chainable());
        assert!(!Task::SpeechSeparation.is_chainable());
        assert!(!Task::TargetSpeakerExtraction.is_chainable());
    }
}
