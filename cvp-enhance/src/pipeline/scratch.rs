//! Per-request scratch area
//!
//! Acquired when a request starts and deleted when dropped, on success and
//! on every error path. A retained area is left on disk for inspection.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Scratch directory owned by one request
#[derive(Debug)]
pub struct ScratchArea {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl ScratchArea {
    /// Create a fresh directory under `root` (created if absent)
    pub fn create(root: &Path, request_id: Uuid, retain: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("req-{}-", request_id))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        tracing::debug!(
            request_id = %request_id,
            scratch = %path.display(),
            retain,
            "Scratch area created"
        );

        Ok(Self {
            dir: Some(dir),
            path,
            retain,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_retained(&self) -> bool {
        self.retain
    }

    /// Keep the directory on disk after drop
    pub fn retain(&mut self) {
        self.retain = true;
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.retain {
            let path = dir.keep();
            tracing::info!(scratch = %path.display(), "Scratch area retained");
            return;
        }

        if let Err(e) = dir.close() {
            tracing::warn!(
                scratch = %self.path.display(),
                error = %e,
                "Failed to remove scratch area"
            );
        }
    }
}
