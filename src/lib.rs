//! # phasesim
//!
//! Client-side orchestrator for a remote medical phase simulator: pick an
//! image, choose an acquisition phase (arterial or venous), and receive a
//! processed version of the image from the remote service for side-by-side
//! comparison.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image file
//!  │
//!  ├─ 1. Input      name, declared media type, size, bytes
//!  ├─ 2. Validate   image/* only, ≤ 10 MiB
//!  ├─ 3. Encode     bytes → data URI (preview, and again for the request)
//!  ├─ 4. Invoke     POST {base_url}/process  { image, phase }
//!  └─ 5. State      Idle → Selected → Processing → Completed | Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phasesim::{Phase, ProcessorConfig, SelectedFile, Submission};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let submission = Submission::with_http(ProcessorConfig::default())?;
//!
//!     submission.select_file(SelectedFile::from_path("scan.png").await?).await?;
//!     submission.set_phase(Phase::Venous);
//!     submission.process().await?;
//!
//!     let snapshot = submission.snapshot();
//!     println!("{:?}: {} bytes", snapshot.status,
//!         snapshot.result.map_or(0, |r| r.len()));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `phasesim` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod state;
pub mod submission;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Phase, ProcessorConfig, ProcessorConfigBuilder};
pub use error::{ErrorCategory, SubmissionError};
pub use observer::{LatestSnapshot, NoopObserver, SharedObserver, StateObserver};
pub use pipeline::encode::{decode_data_uri, DecodedImage};
pub use pipeline::input::SelectedFile;
pub use pipeline::invoke::{HttpProcessingService, ProcessRequest, ProcessingService};
pub use state::{Outcome, StateSnapshot, Status, SubmissionState};
pub use submission::Submission;
