//! Configuration types for image submission.
//!
//! Every knob lives in [`ProcessorConfig`], built via
//! [`ProcessorConfigBuilder`]. The remote endpoint is a deployment detail, so
//! the base URL is the one thing most callers override.

use crate::error::SubmissionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Base URL of the hosted processing service.
pub const DEFAULT_BASE_URL: &str = "https://rayen96-medtech-image-processor.hf.space";

/// Largest accepted upload: 10 MiB, inclusive.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for a submission session.
///
/// # Example
/// ```rust
/// use phasesim::{Phase, ProcessorConfig};
///
/// let config = ProcessorConfig::builder()
///     .base_url("http://localhost:7860")
///     .request_timeout_secs(30)
///     .default_phase(Phase::Venous)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint(), "http://localhost:7860/process");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Base URL of the processing service. Requests go to `{base_url}/process`.
    pub base_url: String,

    /// Maximum accepted file size in bytes. Default: 10 MiB.
    pub max_file_bytes: u64,

    /// Per-request timeout. Default: `None`, which leaves the transport
    /// default in place.
    pub request_timeout_secs: Option<u64>,

    /// Phase selected when a session starts. Default: [`Phase::Arterial`].
    pub default_phase: Phase,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            request_timeout_secs: None,
            default_phase: Phase::default(),
        }
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the processing endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/process", self.base_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn default_phase(mut self, phase: Phase) -> Self {
        self.config.default_phase = phase;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, SubmissionError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            SubmissionError::InvalidConfig(format!("base URL '{}' is invalid: {}", c.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmissionError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.max_file_bytes == 0 {
            return Err(SubmissionError::InvalidConfig(
                "Maximum file size must be ≥ 1 byte".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(SubmissionError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Acquisition phase the remote service should simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Arterial phase (default).
    #[default]
    Arterial,
    /// Portal venous phase.
    Venous,
}

impl Phase {
    /// Wire name, as sent in the request body.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Arterial => "arterial",
            Phase::Venous => "venous",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arterial" => Ok(Phase::Arterial),
            "venous" => Ok(Phase::Venous),
            other => Err(SubmissionError::InvalidConfig(format!(
                "unknown phase '{other}', expected 'arterial' or 'venous'"
            ))),
        }
    }
}
