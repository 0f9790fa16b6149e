//! Transcoding: file bytes → base64 data URI, and back.
//!
//! The same data URI serves as the preview image and as the `image` field of
//! the request body. Encoding runs on the blocking pool because a 10 MiB
//! payload is ~13 MiB of base64 and would otherwise stall the executor.

use crate::error::SubmissionError;
use crate::pipeline::input::{FileSource, SelectedFile};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// `data:<media-type>[;params];base64,<payload>`
static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[^;,]*)(?P<params>(?:;[^;,]*)*?);base64,(?P<payload>.*)$").unwrap()
});

/// Servers do not always pad their base64 output.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A data URI decoded back into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Wrap raw bytes in a base64 data URI.
pub fn to_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Read the file's content and encode it as a data URI.
///
/// Each call reads the source afresh; nothing is cached between the preview
/// and the processing payload. A disk file whose length no longer matches the
/// size it was validated with fails as [`SubmissionError::TranscodingFailed`].
pub async fn transcode(file: &SelectedFile) -> Result<String, SubmissionError> {
    let bytes: std::sync::Arc<[u8]> = match file.source() {
        FileSource::Memory(bytes) => bytes.clone(),
        FileSource::Disk(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                warn!("Failed to read {}: {}", path.display(), e);
                SubmissionError::TranscodingFailed {
                    detail: format!("{}: {}", path.display(), e),
                }
            })?;
            if bytes.len() as u64 != file.size() {
                warn!(
                    "{} changed since selection ({} → {} bytes)",
                    path.display(),
                    file.size(),
                    bytes.len()
                );
                return Err(SubmissionError::TranscodingFailed {
                    detail: "file changed since selection".into(),
                });
            }
            bytes.into()
        }
    };

    let media_type = file.media_type().to_string();
    let uri = tokio::task::spawn_blocking(move || to_data_uri(&media_type, &bytes))
        .await
        .map_err(|e| SubmissionError::TranscodingFailed {
            detail: format!("encode task panicked: {}", e),
        })?;

    debug!("Encoded {} → {} bytes data URI", file.name(), uri.len());
    Ok(uri)
}

/// Split a base64 data URI into its media type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, SubmissionError> {
    let caps = DATA_URI_RE
        .captures(uri.trim())
        .ok_or_else(|| SubmissionError::InvalidDataUri {
            reason: "expected 'data:<type>;base64,<payload>'".into(),
        })?;

    let media_type = match &caps["mime"] {
        "" => "text/plain".to_string(),
        m => m.to_string(),
    };
    let bytes = LENIENT
        .decode(&caps["payload"])
        .map_err(|e| SubmissionError::InvalidDataUri {
            reason: e.to_string(),
        })?;

    Ok(DecodedImage { media_type, bytes })
}
