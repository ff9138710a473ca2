//! Canonical WAV normalization
//!
//! The model library reads PCM WAV. Integer PCM WAV files are used as they
//! are; everything else symphonia can decode (MP3, FLAC, OGG, AAC, float
//! WAV, ...) is rewritten as 16-bit PCM WAV at its native sample rate and
//! channel count.

use super::SourceError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// File name of the transcoded input inside the destination directory
pub const CANONICAL_NAME: &str = "input.wav";

/// Shape of a canonical WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Sample frames (samples per channel)
    pub frames: u64,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Result of [`normalize`]
#[derive(Debug, Clone)]
pub struct Normalized {
    pub path: PathBuf,
    pub info: WavInfo,
    pub transcoded: bool,
}

/// Header info if `path` is integer PCM WAV, `None` otherwise
pub fn canonical_wav_info(path: &Path) -> Option<WavInfo> {
    let reader = WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return None;
    }
    Some(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration() as u64,
    })
}

/// Return `src` if already canonical, else transcode into `dest_dir`
pub fn normalize(src: &Path, dest_dir: &Path) -> Result<Normalized, SourceError> {
    if let Some(info) = canonical_wav_info(src) {
        debug!(path = %src.display(), ?info, "Input is canonical PCM WAV");
        return Ok(Normalized {
            path: src.to_path_buf(),
            info,
            transcoded: false,
        });
    }

    std::fs::create_dir_all(dest_dir)?;
    let dst = dest_dir.join(CANONICAL_NAME);
    let info = transcode_to_wav(src, &dst)?;
    Ok(Normalized {
        path: dst,
        info,
        transcoded: true,
    })
}

/// Decode `src` with symphonia and write 16-bit PCM WAV to `dst`
pub fn transcode_to_wav(src: &Path, dst: &Path) -> Result<WavInfo, SourceError> {
    let sniffed = infer::get_from_path(src).ok().flatten();
    debug!(
        src = %src.display(),
        mime = sniffed.map(|t| t.mime_type()).unwrap_or("unknown"),
        "Transcoding input to PCM WAV"
    );

    let file = std::fs::File::open(src)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(kind) = sniffed {
        hint.with_extension(kind.extension());
    } else if let Some(ext) = src.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SourceError::Undecodable(format!("unrecognized container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SourceError::Undecodable("no audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SourceError::Undecodable(format!("unsupported codec: {}", e)))?;

    let mut writer: Option<WavWriter<std::io::BufWriter<std::fs::File>>> = None;
    let mut info: Option<WavInfo> = None;
    let mut frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SourceError::Undecodable(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = %e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(SourceError::Undecodable(e.to_string())),
        };

        let spec = *decoded.spec();
        let packet_frames = decoded.frames() as u64;
        if packet_frames == 0 {
            continue;
        }

        if writer.is_none() {
            let channels = spec.channels.count() as u16;
            let wav_spec = WavSpec {
                channels,
                sample_rate: spec.rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            writer = Some(WavWriter::create(dst, wav_spec).map_err(transcode_err)?);
            info = Some(WavInfo {
                sample_rate: spec.rate,
                channels,
                bits_per_sample: 16,
                frames: 0,
            });
        } else if let Some(expected) = info.as_ref() {
            ensure_same_layout(expected, &spec)?;
        }

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        if let Some(w) = writer.as_mut() {
            for sample in buffer.samples() {
                w.write_sample(*sample).map_err(transcode_err)?;
            }
        }
        frames += packet_frames;
    }

    let (writer, info) = match (writer, info) {
        (Some(writer), Some(info)) => (writer, info),
        _ => {
            return Err(SourceError::Undecodable(
                "no audio frames could be decoded".to_string(),
            ))
        }
    };
    writer.finalize().map_err(transcode_err)?;

    let info = WavInfo { frames, ..info };
    debug!(dst = %dst.display(), ?info, "Transcode complete");
    Ok(info)
}

/// Reject packets whose rate or channel count differs from the first one
///
/// Chained streams can switch layout mid-file; a single WAV cannot.
fn ensure_same_layout(expected: &WavInfo, spec: &SignalSpec) -> Result<(), SourceError> {
    let channels = spec.channels.count() as u16;
    if spec.rate != expected.sample_rate || channels != expected.channels {
        return Err(SourceError::Undecodable(format!(
            "stream changes format mid-file ({} Hz x{} -> {} Hz x{})",
            expected.sample_rate, expected.channels, spec.rate, channels
        )));
    }
    Ok(())
}

fn transcode_err(e: hound::Error) -> SourceError {
    SourceError::Transcode(e.to_string())
}
