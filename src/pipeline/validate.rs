//! Validation gate: accept or reject a candidate file before any work is done.
//!
//! Rules run in order and the first failure wins:
//!
//! 1. the declared media type must start with `image/`
//! 2. the size must not exceed the configured limit (the limit itself passes)

use crate::error::SubmissionError;
use crate::pipeline::input::SelectedFile;
use tracing::debug;

const IMAGE_PREFIX: &str = "image/";

/// Check a file against the type and size rules.
pub fn validate(file: &SelectedFile, max_bytes: u64) -> Result<(), SubmissionError> {
    if !file.media_type().starts_with(IMAGE_PREFIX) {
        debug!("Rejected {}: media type {}", file.name(), file.media_type());
        return Err(SubmissionError::InvalidType {
            media_type: file.media_type().to_string(),
        });
    }

    if file.size() > max_bytes {
        debug!(
            "Rejected {}: {} bytes exceeds {}",
            file.name(),
            file.size(),
            max_bytes
        );
        return Err(SubmissionError::TooLarge {
            size: file.size(),
            limit: max_bytes,
        });
    }

    Ok(())
}
