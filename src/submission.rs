//! The submission orchestrator.
//!
//! [`Submission`] owns the [`SubmissionState`] and exposes the three intents
//! of the presentation boundary: [`select_file`](Submission::select_file),
//! [`set_phase`](Submission::set_phase) and
//! [`process`](Submission::process). Each intent runs its stages as
//! sequential awaits inside one task:
//!
//! ```text
//! select_file:  validate ─▶ transcode (preview)
//! process:      guard ─▶ transcode (payload) ─▶ invoke
//! ```
//!
//! The state lock is taken only to apply a transition and is released before
//! any await, so intents may overlap. Overlaps are resolved by generation
//! tags (see [`crate::state`]): a stale completion is dropped and its intent
//! returns [`Outcome::Superseded`].

use crate::config::{Phase, ProcessorConfig};
use crate::error::SubmissionError;
use crate::observer::{NoopObserver, SharedObserver};
use crate::pipeline::encode;
use crate::pipeline::input::SelectedFile;
use crate::pipeline::invoke::{HttpProcessingService, ProcessRequest, ProcessingService};
use crate::state::{Outcome, StateSnapshot, SubmissionState};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// One user's submission session.
pub struct Submission {
    config: ProcessorConfig,
    service: Arc<dyn ProcessingService>,
    state: Mutex<SubmissionState>,
    observer: SharedObserver,
}

impl Submission {
    /// Create a session that talks to `service`.
    pub fn new(config: ProcessorConfig, service: Arc<dyn ProcessingService>) -> Self {
        let state = SubmissionState::new(config.default_phase);
        Self {
            config,
            service,
            state: Mutex::new(state),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Create a session backed by [`HttpProcessingService`].
    pub fn with_http(config: ProcessorConfig) -> Result<Self, SubmissionError> {
        let service = HttpProcessingService::new(&config)?;
        Ok(Self::new(config, Arc::new(service)))
    }

    /// Attach an observer notified after every transition.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Read-only projection of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    /// Change the phase used by the next [`process`](Self::process) call.
    pub fn set_phase(&self, phase: Phase) {
        debug!("Phase → {}", phase);
        self.update(|s| s.set_phase(phase));
    }

    /// Validate `file` and, if accepted, build its preview.
    ///
    /// # Errors
    /// The validation or transcoding error, after it has been surfaced in
    /// the state. A superseded selection is not an error.
    pub async fn select_file(&self, file: SelectedFile) -> Result<Outcome, SubmissionError> {
        let max_bytes = self.config.max_file_bytes;
        let ticket = self
            .update(|s| s.begin_selection(file, max_bytes))
            .inspect_err(|e| info!("Selection rejected: {}", e))?;

        info!(
            "Selected {} ({}, {} bytes)",
            ticket.file().name(),
            ticket.file().media_type(),
            ticket.file().size()
        );

        let generation = ticket.generation();
        let preview = encode::transcode(ticket.file()).await;
        let failure = preview.as_ref().err().cloned();
        let outcome = self.update(|s| s.finish_selection(ticket, preview));

        self.settle(outcome, generation, failure)
    }

    /// Process the current selection with the current phase.
    ///
    /// # Errors
    /// [`SubmissionError::NoFileSelected`] without a selection (no request is
    /// made), otherwise the transcoding or remote error that ended the
    /// attempt. Both are also surfaced in the state.
    pub async fn process(&self) -> Result<Outcome, SubmissionError> {
        let ticket = self
            .update(SubmissionState::begin_processing)
            .inspect_err(|e| warn!("Processing refused: {}", e))?;

        let generation = ticket.generation();
        info!(
            "Processing {} as {} (generation {})",
            ticket.file().name(),
            ticket.phase(),
            generation
        );

        let result = match encode::transcode(ticket.file()).await {
            Ok(image) => {
                let request = ProcessRequest {
                    image,
                    phase: ticket.phase(),
                };
                self.service.process(&request).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(image) => info!("Processing complete ({} bytes)", image.len()),
            Err(e) => warn!("Processing failed: {}", e),
        }

        let failure = result.as_ref().err().cloned();
        let outcome = self.update(|s| s.finish_processing(ticket, result));

        self.settle(outcome, generation, failure)
    }

    fn settle(
        &self,
        outcome: Outcome,
        generation: u64,
        failure: Option<SubmissionError>,
    ) -> Result<Outcome, SubmissionError> {
        match (outcome, failure) {
            (Outcome::Superseded, _) => {
                warn!("Discarding superseded completion (generation {})", generation);
                self.observer.on_superseded(generation);
                Ok(Outcome::Superseded)
            }
            (Outcome::Applied, Some(e)) => Err(e),
            (Outcome::Applied, None) => Ok(Outcome::Applied),
        }
    }

    /// Apply a transition and notify the observer once the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut SubmissionState) -> R) -> R {
        let (out, snapshot) = {
            let mut state = self.lock();
            let out = f(&mut state);
            (out, state.snapshot())
        };
        self.observer.on_state_change(&snapshot);
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Status;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service that returns a fixed outcome and counts calls.
    struct FixedService {
        outcome: Result<String, SubmissionError>,
        calls: AtomicUsize,
        last_request: Mutex<Option<ProcessRequest>>,
    }

    impl FixedService {
        fn new(outcome: Result<String, SubmissionError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ProcessingService for FixedService {
        async fn process(&self, request: &ProcessRequest) -> Result<String, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.outcome.clone()
        }
    }

    fn png(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, "image/png", vec![1u8, 2, 3])
    }

    #[tokio::test]
    async fn happy_path() {
        let svc = FixedService::new(Ok("data:image/png;base64,AAA".into()));
        let sub = Submission::new(ProcessorConfig::default(), svc.clone());

        assert_eq!(sub.select_file(png("a.png")).await, Ok(Outcome::Applied));
        let snap = sub.snapshot();
        assert_eq!(snap.status, Status::Selected);
        assert_eq!(snap.preview.as_deref(), Some("data:image/png;base64,AQID"));

        sub.set_phase(Phase::Venous);
        assert_eq!(sub.process().await, Ok(Outcome::Applied));

        let snap = sub.snapshot();
        assert_eq!(snap.status, Status::Completed);
        assert_eq!(snap.result.as_deref(), Some("data:image/png;base64,AAA"));
        assert!(!snap.loading);

        let req = svc.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(req.image, "data:image/png;base64,AQID");
        assert_eq!(req.phase, Phase::Venous);
    }

    #[tokio::test]
    async fn no_file_means_no_request() {
        let svc = FixedService::new(Ok("data:,x".into()));
        let sub = Submission::new(ProcessorConfig::default(), svc.clone());

        assert_eq!(sub.process().await, Err(SubmissionError::NoFileSelected));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            sub.snapshot().error_message().as_deref(),
            Some("Please select an image first")
        );
    }

    #[tokio::test]
    async fn remote_failure_surfaces_generic_message() {
        let svc = FixedService::new(Err(SubmissionError::RemoteProcessingFailed));
        let sub = Submission::new(ProcessorConfig::default(), svc);

        sub.select_file(png("a.png")).await.unwrap();
        assert_eq!(
            sub.process().await,
            Err(SubmissionError::RemoteProcessingFailed)
        );
        let snap = sub.snapshot();
        assert_eq!(snap.status, Status::Failed);
        assert!(snap.result.is_none());
        assert_eq!(snap.error_message().as_deref(), Some("Failed to process image"));
    }

    #[tokio::test]
    async fn default_phase_comes_from_config() {
        let config = ProcessorConfig::builder()
            .default_phase(Phase::Venous)
            .build()
            .unwrap();
        let sub = Submission::new(config, FixedService::new(Ok(String::new())));
        assert_eq!(sub.phase(), Phase::Venous);
    }

    #[tokio::test]
    async fn oversized_file_uses_configured_limit() {
        let config = ProcessorConfig::builder().max_file_bytes(2).build().unwrap();
        let sub = Submission::new(config, FixedService::new(Ok(String::new())));

        let err = sub.select_file(png("a.png")).await.unwrap_err();
        assert!(matches!(err, SubmissionError::TooLarge { size: 3, limit: 2 }));
        assert_eq!(sub.snapshot().status, Status::Idle);
    }
}
