//! Audio Source Resolver
//!
//! Turns the caller's audio source into a local canonical PCM WAV file:
//! - `file`: a path on this host (relative paths resolve against the input
//!   directory)
//! - `input_url`: downloaded over http/https
//! - `input_data`: base64 payload (a `data:` URI prefix is accepted)
//!
//! Every failure here is a "bad input" condition, reported before any
//! pipeline step runs.

pub mod fetch;
pub mod transcode;

pub use transcode::WavInfo;

use base64::Engine;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Input resolution errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No input audio provided. Please provide 'file', 'input_url', or 'input_data'")]
    Missing,

    #[error("Provide exactly one of 'file', 'input_url', or 'input_data' (got {})", .0.join(", "))]
    Ambiguous(Vec<&'static str>),

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download of {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Input exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Invalid base64 audio data: {0}")]
    InvalidBase64(String),

    #[error("Empty audio payload from '{0}'")]
    Empty(&'static str),

    #[error("Unsupported or corrupt audio: {0}")]
    Undecodable(String),

    #[error("Failed to write canonical WAV: {0}")]
    Transcode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the input audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    File(PathBuf),
    Url(String),
    Inline(String),
}

impl AudioSource {
    /// Build from the three mutually exclusive request fields
    ///
    /// Blank strings count as absent.
    pub fn from_fields(
        file: Option<String>,
        input_url: Option<String>,
        input_data: Option<String>,
    ) -> Result<Self, SourceError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let file = present(file);
        let input_url = present(input_url);
        let input_data = present(input_data);

        let provided: Vec<&'static str> = [
            ("file", file.is_some()),
            ("input_url", input_url.is_some()),
            ("input_data", input_data.is_some()),
        ]
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect();

        if provided.len() > 1 {
            return Err(SourceError::Ambiguous(provided));
        }

        match (file, input_url, input_data) {
            (Some(file), None, None) => Ok(AudioSource::File(PathBuf::from(file))),
            (None, Some(url), None) => Ok(AudioSource::Url(url.trim().to_string())),
            (None, None, Some(data)) => Ok(AudioSource::Inline(data)),
            _ => Err(SourceError::Missing),
        }
    }

    /// Request field name of this source
    pub fn kind(&self) -> &'static str {
        match self {
            AudioSource::File(_) => "file",
            AudioSource::Url(_) => "input_url",
            AudioSource::Inline(_) => "input_data",
        }
    }
}

/// Local canonical input ready for the pipeline
#[derive(Debug, Clone)]
pub struct ResolvedAudio {
    pub path: PathBuf,
    pub source_kind: &'static str,
    pub transcoded: bool,
    pub info: WavInfo,
}

/// Resolves [`AudioSource`]s to local canonical WAV files
#[derive(Debug, Clone)]
pub struct SourceResolver {
    http: reqwest::Client,
    input_dir: PathBuf,
    max_download_bytes: u64,
    confine_to_input_dir: bool,
}

impl SourceResolver {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        download_timeout: Duration,
        max_download_bytes: u64,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http: fetch::build_client(download_timeout)?,
            input_dir: input_dir.into(),
            max_download_bytes,
            confine_to_input_dir: true,
        })
    }

    /// Accept `file` sources anywhere on disk, not only under the input
    /// directory. For local tools where the caller already owns the files.
    pub fn allow_any_path(mut self) -> Self {
        self.confine_to_input_dir = false;
        self
    }

    /// Fetch/decode the source into `dest_dir` and normalize it
    ///
    /// A local file that is already canonical is used in place, never copied
    /// or modified.
    pub async fn resolve(
        &self,
        source: &AudioSource,
        dest_dir: &Path,
    ) -> Result<ResolvedAudio, SourceError> {
        let raw = match source {
            AudioSource::File(path) => self.local_path(path)?,
            AudioSource::Url(url) => {
                let bytes = fetch::download(&self.http, url, self.max_download_bytes).await?;
                write_source(dest_dir, &bytes).await?
            }
            AudioSource::Inline(data) => {
                let bytes = decode_inline(data)?;
                write_source(dest_dir, &bytes).await?
            }
        };

        let dest = dest_dir.to_path_buf();
        let normalized = tokio::task::spawn_blocking(move || transcode::normalize(&raw, &dest))
            .await
            .map_err(|e| SourceError::Transcode(e.to_string()))??;

        info!(
            source = source.kind(),
            path = %normalized.path.display(),
            transcoded = normalized.transcoded,
            sample_rate = normalized.info.sample_rate,
            channels = normalized.info.channels,
            duration_secs = normalized.info.duration_secs(),
            "Input audio resolved"
        );

        Ok(ResolvedAudio {
            path: normalized.path,
            source_kind: source.kind(),
            transcoded: normalized.transcoded,
            info: normalized.info,
        })
    }

    /// Resolve a `file` source against the input directory
    ///
    /// When confined, anything that does not canonicalize to a regular file
    /// under the input directory is reported as not found, so the response
    /// does not reveal whether paths elsewhere exist.
    fn local_path(&self, path: &Path) -> Result<PathBuf, SourceError> {
        let joined = if path.is_relative() {
            self.input_dir.join(path)
        } else {
            path.to_path_buf()
        };

        if self.confine_to_input_dir {
            let not_found = || SourceError::FileNotFound(path.to_path_buf());
            let root = self.input_dir.canonicalize().map_err(|_| not_found())?;
            let resolved = joined.canonicalize().map_err(|_| not_found())?;
            if !resolved.starts_with(&root) {
                warn!(
                    requested = %path.display(),
                    "Rejected file source outside the input directory"
                );
                return Err(not_found());
            }
            if !resolved.is_file() {
                return Err(not_found());
            }
            return Ok(resolved);
        }

        if !joined.is_file() {
            return Err(SourceError::FileNotFound(joined));
        }
        Ok(joined)
    }
}

/// Decode a base64 payload, tolerating a `data:` URI prefix and whitespace
pub fn decode_inline(data: &str) -> Result<Vec<u8>, SourceError> {
    let payload = match data.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| SourceError::InvalidBase64("malformed data URI".to_string()))?,
        None => data,
    };

    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SourceError::InvalidBase64(e.to_string()))?;

    if bytes.is_empty() {
        return Err(SourceError::Empty("input_data"));
    }
    Ok(bytes)
}

/// Store fetched bytes as `source.<sniffed ext>` in `dest_dir`
async fn write_source(dest_dir: &Path, bytes: &[u8]) -> Result<PathBuf, SourceError> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let ext = infer::get(bytes).map(|t| t.extension()).unwrap_or("bin");
    let path = dest_dir.join(format!("source.{}", ext));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_source_selected() {
        let source = AudioSource::from_fields(None, Some(" https://x/a.wav ".into()), None).unwrap();
        assert_eq!(source, AudioSource::Url("https://x/a.wav".to_string()));
        assert_eq!(source.kind(), "input_url");

        let source = AudioSource::from_fields(Some("a.wav".into()), Some("".into()), None).unwrap();
        assert_eq!(source, AudioSource::File(PathBuf::from("a.wav")));
    }

    #[test]
    fn test_missing_source() {
        let err = AudioSource::from_fields(None, Some("  ".into()), None).unwrap_err();
        assert!(matches!(err, SourceError::Missing));
        assert!(err.to_string().contains("'file', 'input_url', or 'input_data'"));
    }

    #[test]
    fn test_multiple_sources_rejected() {
        let err = AudioSource::from_fields(Some("a.wav".into()), None, Some("AAAA".into()))
            .unwrap_err();
        match err {
            SourceError::Ambiguous(names) => assert_eq!(names, vec!["file", "input_data"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_inline_variants() {
        assert_eq!(decode_inline("UklGRg==").unwrap(), b"RIFF");
        assert_eq!(decode_inline("UklG\nRg==\n").unwrap(), b"RIFF");
        assert_eq!(decode_inline("data:audio/wav;base64,UklGRg==").unwrap(), b"RIFF");
    }

    #[test]
    fn test_decode_inline_errors() {
        assert!(matches!(
            decode_inline("not base64!!"),
            Err(SourceError::InvalidBase64(_))
        ));
        assert!(matches!(decode_inline(""), Err(SourceError::Empty("input_data"))));
        assert!(matches!(
            decode_inline("data:audio/wav;base64"),
            Err(SourceError::InvalidBase64(_))
        ));
    }
}
