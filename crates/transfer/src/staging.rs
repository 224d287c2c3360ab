//! Temporary copy of a media file taken before upload.
//!
//! Capture and picker paths can be moved or rewritten while an upload is in
//! flight. Staging copies the file into a private directory, verifies the
//! copy against the source digest, and removes it when dropped.

use std::path::Path;

use tracing::{debug, warn};

use crate::TransferError;
use crate::chunked::calculate_file_checksum;
use crate::types::LocalMediaHandle;

/// A verified private copy of a media file. Deleted on drop.
#[derive(Debug)]
pub struct StagedMedia {
    handle: LocalMediaHandle,
    checksum: String,
}

impl StagedMedia {
    /// Copies `source` into `dir` and verifies the copy.
    pub fn stage(source: &LocalMediaHandle, dir: &Path) -> Result<Self, TransferError> {
        std::fs::create_dir_all(dir)?;

        let ext = source
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let staged_path = dir.join(format!("{}{ext}", uuid::Uuid::new_v4()));

        std::fs::copy(source.path(), &staged_path)?;

        let verify = || -> Result<(LocalMediaHandle, String), TransferError> {
            let expected = calculate_file_checksum(source.path())?;
            let actual = calculate_file_checksum(&staged_path)?;
            if expected != actual {
                return Err(TransferError::ChecksumMismatch);
            }
            let handle = LocalMediaHandle::open(&staged_path)?;
            if handle.size_bytes() != source.size_bytes() {
                return Err(TransferError::ChecksumMismatch);
            }
            Ok((handle, actual))
        };

        match verify() {
            Ok((handle, checksum)) => {
                debug!(
                    source = %source.uri(),
                    staged = %handle.uri(),
                    bytes = handle.size_bytes(),
                    "media staged"
                );
                Ok(Self { handle, checksum })
            }
            Err(e) => {
                let _ = std::fs::remove_file(&staged_path);
                Err(e)
            }
        }
    }

    /// Handle on the staged copy.
    pub fn handle(&self) -> &LocalMediaHandle {
        &self.handle
    }

    /// SHA-256 of the staged copy (hex).
    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

impl Drop for StagedMedia {
    fn drop(&mut self) {
        match std::fs::remove_file(self.handle.path()) {
            Ok(()) => debug!(staged = %self.handle.uri(), "staged media released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(staged = %self.handle.uri(), error = %e, "failed to remove staged media"),
        }
    }
}
