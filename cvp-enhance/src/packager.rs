//! Response Packager
//!
//! Serializes the final artifact for the response: inline (base64 bytes),
//! reference (file path plus retrieval URL), or both.

use base64::Engine;
use cvp_common::OutputMode;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Packaging errors
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Failed to read output {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Packaged artifact
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PackagedOutput {
    /// Base64-encoded audio (inline mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    /// Server-local file path (reference mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Retrieval URL relative to the service root (reference mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Package `artifact` according to `mode`
///
/// `url_prefix` is the route the output directory is served under.
pub fn package(
    artifact: &Path,
    mode: OutputMode,
    url_prefix: &str,
) -> Result<PackagedOutput, PackagingError> {
    let mut packaged = PackagedOutput::default();

    if mode.includes_payload() {
        let bytes = std::fs::read(artifact).map_err(|source| PackagingError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        packaged.audio_data = Some(base64::engine::general_purpose::STANDARD.encode(bytes));
    }

    if mode.includes_reference() {
        if !artifact.is_file() {
            return Err(PackagingError::Read {
                path: artifact.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "output missing"),
            });
        }
        let name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PackagingError::InvalidPath(artifact.to_path_buf()))?;
        packaged.file_path = Some(artifact.display().to_string());
        packaged.url = Some(format!("{}/{}", url_prefix.trim_end_matches('/'), name));
    }

    Ok(packaged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inline_encodes_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output_1.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let packaged = package(&path, OutputMode::Inline, "/outputs").unwrap();

        assert_eq!(packaged.audio_data.as_deref(), Some("UklGRg=="));
        assert!(packaged.file_path.is_none());
        assert!(packaged.url.is_none());
    }

    #[test]
    fn test_reference_returns_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output_1.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let packaged = package(&path, OutputMode::Reference, "/outputs/").unwrap();

        assert!(packaged.audio_data.is_none());
        assert_eq!(packaged.file_path, Some(path.display().to_string()));
        assert_eq!(packaged.url.as_deref(), Some("/outputs/output_1.wav"));
    }

    #[test]
    fn test_both_modes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("o.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let packaged = package(&path, OutputMode::Both, "/outputs").unwrap();
        assert!(packaged.audio_data.is_some());
        assert!(packaged.url.is_some());
    }

    #[test]
    fn test_missing_artifact_is_packaging_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.wav");

        for mode in [OutputMode::Inline, OutputMode::Reference] {
            let err = package(&path, mode, "/outputs").unwrap_err();
            assert!(matches!(err, PackagingError::Read { .. }));
        }
    }
}
