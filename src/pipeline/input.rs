//! Selected files: the unit the user submits.
//!
//! A [`SelectedFile`] pairs the payload with the metadata the validation
//! gate needs (declared media type and byte size). The payload is either
//! held in memory or left on disk and read each time it is transcoded, the
//! way a browser `File` handle is re-read on every `FileReader` call.

use crate::error::SubmissionError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Media type used when the extension does not map to a known format.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Where the bytes of a [`SelectedFile`] live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Bytes already in memory, shared between clones.
    Memory(Arc<[u8]>),
    /// File on disk; read lazily by the transcoder.
    Disk(PathBuf),
}

/// A file chosen by the user. Immutable once created; re-selection replaces
/// it wholesale.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    size: u64,
    source: FileSource,
}

impl SelectedFile {
    /// Build a file from in-memory bytes. `size` is taken from the buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Reference a file on disk. The media type is declared from the file
    /// extension and the size from its metadata; the content is not read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref().to_path_buf();

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| SubmissionError::FileNotFound { path: path.clone() })?;
        if !meta.is_file() {
            return Err(SubmissionError::FileNotFound { path });
        }

        let media_type = media_type_for_path(&path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            "Selected {} ({}, {} bytes)",
            path.display(),
            media_type,
            meta.len()
        );

        Ok(Self {
            name,
            media_type,
            size: meta.len(),
            source: FileSource::Disk(path),
        })
    }

    /// Display name (file name without directories).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}

/// Declare a media type from the path's extension.
pub fn media_type_for_path(path: &Path) -> String {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| UNKNOWN_MEDIA_TYPE.to_string())
}
