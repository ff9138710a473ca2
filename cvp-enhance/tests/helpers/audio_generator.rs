//! Audio Test Fixture Generator
//!
//! Utilities for generating test WAV files

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Tone frequency in Hz; `None` generates silence
    pub tone_hz: Option<f32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 2.0,
            sample_rate: 16_000,
            channels: 1,
            tone_hz: None,
        }
    }
}

/// Generate a 16-bit PCM WAV file
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_frames = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_frames {
        let sample = match config.tone_hz {
            Some(freq) => {
                let t = i as f32 / config.sample_rate as f32;
                (0.3 * (2.0 * std::f32::consts::PI * freq * t).sin() * i16::MAX as f32) as i16
            }
            None => 0,
        };
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// 2-second 16 kHz mono silence
pub fn generate_silence(path: &Path) -> anyhow::Result<PathBuf> {
    generate_test_wav(path, &AudioConfig::default())
}

/// Duration in seconds of a PCM WAV file
pub fn wav_duration(path: &Path) -> f64 {
    let reader = hound::WavReader::open(path).expect("valid WAV");
    reader.duration() as f64 / reader.spec().sample_rate as f64
}
