//! Remote processing: send the encoded image and phase, await the result.
//!
//! The only stage with network I/O. [`ProcessingService`] is the seam the
//! orchestrator talks to; [`HttpProcessingService`] is the production
//! implementation, tests substitute their own.
//!
//! ## Wire contract
//!
//! ```text
//! POST {base_url}/process
//! { "image": "data:image/png;base64,…", "phase": "arterial" }
//!
//! 200 { "success": true,  "processed_image": "data:image/png;base64,…" }
//! 200 { "success": false }
//! 5xx { "error": "model not loaded" }
//! ```
//!
//! A single attempt is made. Failures surface to the caller as-is.

use crate::config::{Phase, ProcessorConfig};
use crate::error::SubmissionError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request body sent to the processing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRequest {
    /// Data URI of the source image.
    pub image: String,
    pub phase: Phase,
}

/// Something that turns a [`ProcessRequest`] into a processed data URI.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Run one processing request.
    ///
    /// Resolves with the processed image's data URI, or fails with
    /// [`SubmissionError::RemoteProcessingFailed`] /
    /// [`SubmissionError::NetworkError`].
    async fn process(&self, request: &ProcessRequest) -> Result<String, SubmissionError>;
}

/// [`ProcessingService`] backed by an HTTP JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    client: reqwest::Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpProcessingService {
    pub fn new(config: &ProcessorConfig) -> Result<Self, SubmissionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SubmissionError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            timeout: config.request_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: &reqwest::Error) -> SubmissionError {
        let message = match self.timeout {
            Some(t) if e.is_timeout() => format!("timeout of {}ms exceeded", t.as_millis()),
            _ => error_chain(e),
        };
        warn!("Request to {} failed: {}", self.endpoint, message);
        SubmissionError::NetworkError { message }
    }
}

#[async_trait]
impl ProcessingService for HttpProcessingService {
    async fn process(&self, request: &ProcessRequest) -> Result<String, SubmissionError> {
        info!(
            "Submitting {} bytes ({} phase) to {}",
            request.image.len(),
            request.phase,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        debug!("Response: HTTP {} ({} bytes)", status, body.len());

        interpret_response(status, &body)
    }
}

/// Map an HTTP status and body onto the response contract.
pub fn interpret_response(status: StatusCode, body: &[u8]) -> Result<String, SubmissionError> {
    let json: Option<Value> = serde_json::from_slice(body).ok();

    if !status.is_success() {
        let message = json
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status code {}", status.as_u16()));
        warn!("Processing service returned HTTP {}: {}", status, message);
        return Err(SubmissionError::NetworkError { message });
    }

    let Some(json) = json else {
        warn!("Processing service returned a non-JSON body");
        return Err(SubmissionError::RemoteProcessingFailed);
    };

    if !json.get("success").is_some_and(is_truthy) {
        warn!("Processing service declared failure");
        return Err(SubmissionError::RemoteProcessingFailed);
    }

    match json.get("processed_image").and_then(Value::as_str) {
        Some(image) => Ok(image.to_string()),
        None => {
            warn!("Processing service reported success without an image");
            Err(SubmissionError::RemoteProcessingFailed)
        }
    }
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Display an error followed by its sources, `outer: inner: root`.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}
