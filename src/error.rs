//! Error types for the phasesim library.
//!
//! A single enum, [`SubmissionError`], covers every way a submission attempt
//! can fail. Each error is terminal for the attempt that raised it only: the
//! orchestrator stores it as the current error state and the user retries by
//! selecting another file or triggering processing again.
//!
//! The type is `Clone` because the state machine keeps the last error around
//! and hands copies of it to observers and snapshots.
//!
//! [`ErrorCategory`] groups the variants the way the presentation layer
//! cares about them:
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | `InvalidType`, `TooLarge`, `NoFileSelected`, `FileNotFound` |
//! | Transcoding | `TranscodingFailed`, `InvalidDataUri` |
//! | Network | `NetworkError` |
//! | RemoteFailure | `RemoteProcessingFailed` |
//! | Configuration | `InvalidConfig` |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the phasesim library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Declared media type does not start with `image/`.
    #[error("Please select a valid image file (JPG, PNG, etc.)")]
    InvalidType { media_type: String },

    /// File is larger than the configured limit.
    #[error("Image file size must be less than {}", size_label(.limit))]
    TooLarge { size: u64, limit: u64 },

    /// Processing was triggered before any file was selected.
    #[error("Please select an image first")]
    NoFileSelected,

    /// A file path given to [`crate::SelectedFile::from_path`] does not exist
    /// or could not be inspected.
    #[error("Image file not found: '{}'", .path.display())]
    FileNotFound { path: PathBuf },

    // ── Transcoding errors ────────────────────────────────────────────────
    /// The file content could not be read while building the data URI.
    ///
    /// The user-facing message is generic; `detail` goes to the logs.
    #[error("An error occurred while reading the image")]
    TranscodingFailed { detail: String },

    /// A string that should have been a base64 data URI was not one.
    #[error("Invalid data URI: {reason}")]
    InvalidDataUri { reason: String },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The service answered but declared the processing unsuccessful.
    #[error("Failed to process image")]
    RemoteProcessingFailed,

    /// Transport failure, timeout, or non-success HTTP status.
    ///
    /// `message` is the server-provided `error` field when present,
    /// otherwise the transport error text.
    #[error("Failed to process image: {message}")]
    NetworkError { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Render a byte limit in the largest whole unit: `10MB`, `512KB`, `100 bytes`.
fn size_label(bytes: &u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    match *bytes {
        b if b >= MIB && b % MIB == 0 => format!("{}MB", b / MIB),
        b if b >= KIB && b % KIB == 0 => format!("{}KB", b / KIB),
        b => format!("{} bytes", b),
    }
}

/// Coarse grouping of [`SubmissionError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Transcoding,
    Network,
    RemoteFailure,
    Configuration,
}

impl SubmissionError {
    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidType { .. }
            | Self::TooLarge { .. }
            | Self::NoFileSelected
            | Self::FileNotFound { .. } => ErrorCategory::Validation,
            Self::TranscodingFailed { .. } | Self::InvalidDataUri { .. } => {
                ErrorCategory::Transcoding
            }
            Self::NetworkError { .. } => ErrorCategory::Network,
            Self::RemoteProcessingFailed => ErrorCategory::RemoteFailure,
            Self::InvalidConfig(_) => ErrorCategory::Configuration,
        }
    }
}
