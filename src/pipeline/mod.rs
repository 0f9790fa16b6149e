//! Pipeline stages for a single submission.
//!
//! Each submodule implements exactly one step and returns a value or a
//! [`crate::SubmissionError`]; none of them touch submission state.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ validate ──▶ encode ──▶ invoke
//! (file)    (type/size)  (data URI) (HTTP)
//! ```
//!
//! 1. [`input`]    — describe the chosen file (name, media type, size, bytes)
//! 2. [`validate`] — reject non-images and oversized files
//! 3. [`encode`]   — base64 data URI for preview and request body
//! 4. [`invoke`]   — POST to the processing service; the only stage with
//!    network I/O

pub mod encode;
pub mod input;
pub mod invoke;
pub mod validate;
