//! Local audio clip storage — atomic file writes under the media directory.

use crate::error::UploadError;
use std::path::PathBuf;

/// Stores uploaded clips under `<root>/audio/` and hands back the reference
/// path they are served from.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write a clip atomically (write to a `.tmp` sibling, then rename) and
    /// return the serve path. Empty clips are rejected.
    pub fn store_clip(&self, dispatch_id: &str, data: &[u8]) -> Result<String, UploadError> {
        if data.is_empty() {
            return Err(UploadError::EmptyClip);
        }

        let dir = self.root.join("audio");
        std::fs::create_dir_all(&dir).map_err(|e| UploadError::Write(e.to_string()))?;

        let file = dir.join(format!("{dispatch_id}.wav"));
        let tmp = file.with_extension("tmp");
        std::fs::write(&tmp, data).map_err(|e| UploadError::Write(e.to_string()))?;
        std::fs::rename(&tmp, &file).map_err(|e| UploadError::Write(e.to_string()))?;

        Ok(format!("/media/audio/{dispatch_id}.wav"))
    }

    /// Directory the gateway serves read-only under `/media`.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}
