//! Test doubles for the enhancement model seam

use cvp_common::Task;
use cvp_enhance::model::{EnhancementModel, ModelError};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One recorded model invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub task: Task,
    pub model_name: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Deterministic model: halves every sample and writes a WAV with the
/// model's target sample rate (`*_48K` → 48 kHz, `*_16K` → 16 kHz, otherwise
/// the input rate), keeping duration. Fails for models listed in `fail_on`.
#[derive(Default)]
pub struct MockModel {
    calls: Mutex<Vec<Call>>,
    fail_on: Vec<String>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(models: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: models.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn target_rate(model_name: &str, input_rate: u32) -> u32 {
    if model_name.ends_with("_48K") {
        48_000
    } else if model_name.ends_with("_16K") {
        16_000
    } else {
        input_rate
    }
}

impl EnhancementModel for MockModel {
    fn apply(
        &self,
        task: Task,
        model_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<(), ModelError> {
        self.calls.lock().unwrap().push(Call {
            task,
            model_name: model_name.to_string(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });

        if self.fail_on.iter().any(|m| m == model_name) {
            return Err(ModelError::Rejected(format!("{} refused input", model_name)));
        }

        let mut reader = hound::WavReader::open(input)
            .map_err(|e| ModelError::Rejected(e.to_string()))?;
        let in_spec = reader.spec();
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| ModelError::Rejected(e.to_string()))?;

        let rate = target_rate(model_name, in_spec.sample_rate);
        let channels = in_spec.channels as usize;
        let in_frames = samples.len() / channels.max(1);
        let out_frames = (in_frames as u64 * rate as u64 / in_spec.sample_rate as u64) as usize;

        let spec = hound::WavSpec {
            channels: in_spec.channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec)
            .map_err(|e| ModelError::Rejected(e.to_string()))?;
        for frame in 0..out_frames {
            // nearest-neighbour resample
            let src_frame = (frame as u64 * in_spec.sample_rate as u64 / rate as u64) as usize;
            for ch in 0..channels {
                let value = samples[src_frame * channels + ch] / 2;
                writer
                    .write_sample(value)
                    .map_err(|e| ModelError::Rejected(e.to_string()))?;
            }
        }
        writer
            .finalize()
            .map_err(|e| ModelError::Rejected(e.to_string()))?;
        Ok(())
    }
}

/// Model that reports success without writing anything
pub struct SilentFailureModel;

impl EnhancementModel for SilentFailureModel {
    fn apply(&self, _: Task, _: &str, _: &Path, _: &Path) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Delegates to [`MockModel`] and cancels `token` once `after` calls finished
pub struct CancellingModel {
    pub inner: MockModel,
    pub token: tokio_util::sync::CancellationToken,
    pub after: usize,
}

impl EnhancementModel for CancellingModel {
    fn apply(
        &self,
        task: Task,
        model_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<(), ModelError> {
        let result = self.inner.apply(task, model_name, input, output);
        if self.inner.call_count() >= self.after {
            self.token.cancel();
        }
        result
    }
}
