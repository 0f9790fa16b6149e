//! Submission state and its transition functions.
//!
//! [`SubmissionState`] is a plain owned value. Every mutation goes through one
//! of its `begin_*` / `finish_*` methods, which the orchestrator calls under a
//! lock that is never held across an await point. Asynchronous work happens
//! between a `begin` and its `finish`.
//!
//! ## Generations
//!
//! Each accepted selection and each processing trigger draws the next value
//! from a monotonically increasing counter and records it as the pending
//! generation for its kind. A `finish` call applies its result only when its
//! ticket still matches that pending generation; anything else is a stale
//! completion and is dropped. An accepted selection also clears the pending
//! processing generation, so a result computed for the previous file can
//! never land next to the new one.
//!
//! Separately, every applied transition bumps a `revision` carried by
//! [`StateSnapshot`]. Snapshots are taken under the lock, so a larger
//! revision is always the newer view even when notifications are delivered
//! out of order.
//!
//! ```text
//!            select ok            process
//!  Idle ──────────────▶ Selected ─────────▶ Processing ──ok──▶ Completed
//!                          ▲  ▲                  │
//!                          │  └──── select ──────┤
//!                          │                     └──err──▶ Failed
//!                          └──────────── select ok ─────────────┘
//! ```

use crate::config::Phase;
use crate::error::{ErrorCategory, SubmissionError};
use crate::pipeline::input::SelectedFile;
use crate::pipeline::validate::validate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coarse state shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No file selected.
    Idle,
    /// File and preview present; nothing processed yet.
    Selected,
    /// A processing request is in flight.
    Processing,
    /// The last processing request succeeded; a result is present.
    Completed,
    /// The last processing request failed; an error is present.
    Failed,
}

/// Whether a completion was applied to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A newer selection or processing request took over; the completion
    /// was discarded.
    Superseded,
}

/// Proof that a selection passed validation. Returned by
/// [`SubmissionState::begin_selection`], consumed by `finish_selection`.
#[derive(Debug)]
#[must_use]
pub struct SelectionTicket {
    generation: u64,
    file: SelectedFile,
}

impl SelectionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }
}

/// A processing request that has been started. Captures the file and phase
/// as they were when processing was triggered.
#[derive(Debug)]
#[must_use]
pub struct ProcessingTicket {
    generation: u64,
    file: SelectedFile,
    phase: Phase,
}

impl ProcessingTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

#[derive(Debug, Clone)]
struct Selection {
    file: SelectedFile,
    preview: Arc<str>,
}

/// Immutable view of the state handed to the presentation layer.
///
/// Image strings are reference-counted, so taking a snapshot never copies
/// a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub status: Status,
    pub phase: Phase,
    pub file_name: Option<String>,
    pub preview: Option<Arc<str>>,
    pub result: Option<Arc<str>>,
    pub loading: bool,
    pub error: Option<SubmissionError>,
    pub generation: u64,
    /// Count of transitions applied so far. Increases with every change.
    pub revision: u64,
}

impl StateSnapshot {
    /// User-facing message of the current error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(SubmissionError::category)
    }

    /// Whether this snapshot reflects a later state than `other`.
    pub fn is_newer_than(&self, other: &StateSnapshot) -> bool {
        self.revision > other.revision
    }
}

/// The single mutable submission state.
#[derive(Debug, Clone)]
pub struct SubmissionState {
    phase: Phase,
    selection: Option<Selection>,
    result: Option<Arc<str>>,
    error: Option<SubmissionError>,
    status: Status,
    generation: u64,
    revision: u64,
    pending_selection: Option<u64>,
    pending_processing: Option<u64>,
}

impl Default for SubmissionState {
    fn default() -> Self {
        Self::new(Phase::default())
    }
}

impl SubmissionState {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            selection: None,
            result: None,
            error: None,
            status: Status::Idle,
            generation: 0,
            revision: 0,
            pending_selection: None,
            pending_processing: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Change the phase. Touches nothing else and is legal in any state.
    pub fn set_phase(&mut self, phase: Phase) {
        self.revision += 1;
        self.phase = phase;
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selection.as_ref().map(|s| &s.file)
    }

    pub fn preview(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| &*s.preview)
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_processing.is_some()
    }

    /// Latest generation handed out.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            status: self.status,
            phase: self.phase,
            file_name: self.selection.as_ref().map(|s| s.file.name().to_string()),
            preview: self.selection.as_ref().map(|s| Arc::clone(&s.preview)),
            result: self.result.clone(),
            loading: self.is_loading(),
            error: self.error.clone(),
            generation: self.generation,
            revision: self.revision,
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────

    /// Validate a newly chosen file.
    ///
    /// Any stale result is cleared first, whether or not the file passes.
    /// On rejection the error is surfaced and the current selection stays.
    /// On acceptance the error is cleared, in-flight processing is
    /// superseded, and a ticket for the preview transcoding is returned.
    pub fn begin_selection(
        &mut self,
        file: SelectedFile,
        max_bytes: u64,
    ) -> Result<SelectionTicket, SubmissionError> {
        self.revision += 1;
        self.result = None;

        if let Err(e) = validate(&file, max_bytes) {
            self.error = Some(e.clone());
            if self.status == Status::Completed {
                self.status = Status::Selected;
            }
            return Err(e);
        }

        let generation = self.next_generation();
        self.error = None;
        self.pending_selection = Some(generation);
        self.pending_processing = None;
        self.status = self.settled_status();

        Ok(SelectionTicket { generation, file })
    }

    /// Apply the preview transcoding outcome for a selection.
    ///
    /// On success the file and preview replace the previous selection as one
    /// unit. On failure the previous selection, if any, is kept.
    pub fn finish_selection(
        &mut self,
        ticket: SelectionTicket,
        preview: Result<String, SubmissionError>,
    ) -> Outcome {
        if self.pending_selection != Some(ticket.generation) {
            return Outcome::Superseded;
        }
        self.revision += 1;
        self.pending_selection = None;
        self.result = None;

        match preview {
            Ok(preview) => {
                self.selection = Some(Selection {
                    file: ticket.file,
                    preview: preview.into(),
                });
                self.error = None;
                self.pending_processing = None;
                self.status = Status::Selected;
            }
            Err(e) => {
                self.error = Some(e);
                self.status = self.settled_status();
            }
        }
        Outcome::Applied
    }

    /// Start processing the current selection with the current phase.
    ///
    /// Without a selection this surfaces [`SubmissionError::NoFileSelected`]
    /// and returns it; no ticket means no network call.
    pub fn begin_processing(&mut self) -> Result<ProcessingTicket, SubmissionError> {
        self.revision += 1;
        let Some(file) = self.selection.as_ref().map(|s| s.file.clone()) else {
            self.result = None;
            self.error = Some(SubmissionError::NoFileSelected);
            return Err(SubmissionError::NoFileSelected);
        };

        let generation = self.next_generation();
        self.pending_processing = Some(generation);
        self.result = None;
        self.error = None;
        self.status = Status::Processing;

        Ok(ProcessingTicket {
            generation,
            file,
            phase: self.phase,
        })
    }

    /// Apply a processing outcome.
    pub fn finish_processing(
        &mut self,
        ticket: ProcessingTicket,
        outcome: Result<String, SubmissionError>,
    ) -> Outcome {
        if self.pending_processing != Some(ticket.generation) {
            return Outcome::Superseded;
        }
        self.revision += 1;
        self.pending_processing = None;

        match outcome {
            Ok(image) => {
                self.result = Some(image.into());
                self.error = None;
                self.status = Status::Completed;
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e);
                self.status = Status::Failed;
            }
        }
        Outcome::Applied
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Status implied by what is present when no result or failure applies.
    fn settled_status(&self) -> Status {
        if self.pending_processing.is_some() {
            Status::Processing
        } else if self.selection.is_some() {
            Status::Selected
        } else {
            Status::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 10 * 1024 * 1024;

    fn png(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, "image/png", vec![1u8, 2, 3])
    }

    fn selected(name: &str) -> SubmissionState {
        let mut s = SubmissionState::default();
        let t = s.begin_selection(png(name), LIMIT).unwrap();
        assert_eq!(
            s.finish_selection(t, Ok(format!("data:image/png;base64,{name}"))),
            Outcome::Applied
        );
        s
    }

    fn completed(name: &str) -> SubmissionState {
        let mut s = selected(name);
        let t = s.begin_processing().unwrap();
        s.finish_processing(t, Ok("data:image/png;base64,AAA".into()));
        s
    }

    #[test]
    fn starts_idle() {
        let s = SubmissionState::new(Phase::Venous);
        let snap = s.snapshot();
        assert_eq!(snap.status, Status::Idle);
        assert_eq!(snap.phase, Phase::Venous);
        assert!(snap.file_name.is_none() && snap.preview.is_none());
        assert!(snap.result.is_none() && snap.error.is_none());
        assert!(!snap.loading);
    }

    #[test]
    fn selection_commits_file_and_preview_together() {
        let mut s = SubmissionState::default();
        let t = s.begin_selection(png("a.png"), LIMIT).unwrap();
        assert!(s.selected_file().is_none());
        assert!(s.preview().is_none());

        s.finish_selection(t, Ok("data:image/png;base64,AQID".into()));
        assert_eq!(s.status(), Status::Selected);
        assert_eq!(s.selected_file().unwrap().name(), "a.png");
        assert_eq!(s.preview(), Some("data:image/png;base64,AQID"));
    }

    #[test]
    fn rejection_keeps_selection_and_clears_result() {
        let mut s = completed("a.png");
        assert_eq!(s.status(), Status::Completed);

        let bad = SelectedFile::from_bytes("doc.pdf", "application/pdf", vec![0u8; 4]);
        let err = s.begin_selection(bad, LIMIT).unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidType { .. }));

        assert_eq!(s.status(), Status::Selected);
        assert_eq!(s.selected_file().unwrap().name(), "a.png");
        assert_eq!(s.preview(), Some("data:image/png;base64,a.png"));
        assert!(s.result().is_none());
        assert_eq!(s.error(), Some(&err));
    }

    #[test]
    fn rejection_from_idle_stays_idle() {
        let mut s = SubmissionState::default();
        let big = SelectedFile::from_bytes("big.png", "image/png", vec![0u8; 11]);
        let err = s.begin_selection(big, 10).unwrap_err();
        assert!(matches!(err, SubmissionError::TooLarge { size: 11, limit: 10 }));
        assert_eq!(s.status(), Status::Idle);
        assert!(s.selected_file().is_none());
    }

    #[test]
    fn new_selection_resets_result_and_error_before_preview() {
        let mut s = completed("a.png");
        let t = s.begin_selection(png("b.png"), LIMIT).unwrap();
        assert!(s.result().is_none());
        assert!(s.error().is_none());
        // old selection remains visible until the new preview lands
        assert_eq!(s.selected_file().unwrap().name(), "a.png");
        assert_eq!(s.status(), Status::Selected);

        s.finish_selection(t, Ok("data:image/png;base64,Yg==".into()));
        assert_eq!(s.selected_file().unwrap().name(), "b.png");
    }

    #[test]
    fn preview_failure_keeps_previous_selection() {
        let mut s = selected("a.png");
        let t = s.begin_selection(png("b.png"), LIMIT).unwrap();
        let outcome = s.finish_selection(
            t,
            Err(SubmissionError::TranscodingFailed {
                detail: "gone".into(),
            }),
        );
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(s.selected_file().unwrap().name(), "a.png");
        assert_eq!(s.status(), Status::Selected);
        assert!(matches!(
            s.error(),
            Some(SubmissionError::TranscodingFailed { .. })
        ));
    }

    #[test]
    fn processing_without_file_is_refused() {
        let mut s = SubmissionState::default();
        let err = s.begin_processing().unwrap_err();
        assert_eq!(err, SubmissionError::NoFileSelected);
        assert_eq!(s.error(), Some(&SubmissionError::NoFileSelected));
        assert_eq!(s.status(), Status::Idle);
        assert!(!s.is_loading());
    }

    #[test]
    fn processing_success_and_failure() {
        let mut s = selected("a.png");
        s.set_phase(Phase::Venous);

        let t = s.begin_processing().unwrap();
        assert_eq!(t.phase(), Phase::Venous);
        assert_eq!(s.status(), Status::Processing);
        assert!(s.is_loading());

        s.finish_processing(t, Ok("data:image/png;base64,AAA".into()));
        assert_eq!(s.status(), Status::Completed);
        assert_eq!(s.result(), Some("data:image/png;base64,AAA"));
        assert!(!s.is_loading());

        let t = s.begin_processing().unwrap();
        assert!(s.result().is_none(), "new invocation clears the result");
        s.finish_processing(t, Err(SubmissionError::RemoteProcessingFailed));
        assert_eq!(s.status(), Status::Failed);
        assert!(s.result().is_none());
        assert_eq!(s.error(), Some(&SubmissionError::RemoteProcessingFailed));
    }

    #[test]
    fn retry_after_failure_clears_error() {
        let mut s = selected("a.png");
        let t = s.begin_processing().unwrap();
        s.finish_processing(t, Err(SubmissionError::RemoteProcessingFailed));

        let _t = s.begin_processing().unwrap();
        assert!(s.error().is_none());
        assert_eq!(s.status(), Status::Processing);
    }

    #[test]
    fn phase_change_touches_nothing_else() {
        let mut s = completed("a.png");
        let before = s.snapshot();
        s.set_phase(Phase::Venous);
        let after = s.snapshot();
        assert_eq!(after.phase, Phase::Venous);
        assert_eq!(
            StateSnapshot {
                phase: before.phase,
                revision: before.revision,
                ..after
            },
            before
        );
    }

    #[test]
    fn selection_supersedes_in_flight_processing() {
        let mut s = selected("a.png");
        let stale = s.begin_processing().unwrap();

        let t = s.begin_selection(png("b.png"), LIMIT).unwrap();
        assert!(!s.is_loading());
        assert_eq!(s.status(), Status::Selected);
        s.finish_selection(t, Ok("data:image/png;base64,Yg==".into()));

        let outcome = s.finish_processing(stale, Ok("data:image/png;base64,OLD".into()));
        assert_eq!(outcome, Outcome::Superseded);
        assert!(s.result().is_none());
        assert_eq!(s.status(), Status::Selected);
    }

    #[test]
    fn newer_processing_supersedes_older() {
        let mut s = selected("a.png");
        let first = s.begin_processing().unwrap();
        let second = s.begin_processing().unwrap();
        assert!(second.generation() > first.generation());

        assert_eq!(
            s.finish_processing(first, Ok("data:,first".into())),
            Outcome::Superseded
        );
        assert!(s.is_loading());
        assert_eq!(
            s.finish_processing(second, Ok("data:,second".into())),
            Outcome::Applied
        );
        assert_eq!(s.result(), Some("data:,second"));
    }

    #[test]
    fn newer_selection_supersedes_older_preview() {
        let mut s = SubmissionState::default();
        let first = s.begin_selection(png("a.png"), LIMIT).unwrap();
        let second = s.begin_selection(png("b.png"), LIMIT).unwrap();

        assert_eq!(
            s.finish_selection(second, Ok("data:,b".into())),
            Outcome::Applied
        );
        assert_eq!(
            s.finish_selection(first, Ok("data:,a".into())),
            Outcome::Superseded
        );
        assert_eq!(s.selected_file().unwrap().name(), "b.png");
    }

    #[test]
    fn processing_keeps_pending_preview_alive() {
        let mut s = selected("a.png");
        let sel = s.begin_selection(png("b.png"), LIMIT).unwrap();
        let proc = s.begin_processing().unwrap();
        assert_eq!(proc.file().name(), "a.png");

        // the preview for b still lands, and supersedes the run on a
        assert_eq!(
            s.finish_selection(sel, Ok("data:,b".into())),
            Outcome::Applied
        );
        assert_eq!(
            s.finish_processing(proc, Ok("data:,a-result".into())),
            Outcome::Superseded
        );
        assert_eq!(s.selected_file().unwrap().name(), "b.png");
        assert!(s.result().is_none());
    }

    #[test]
    fn result_and_error_never_coexist() {
        let mut s = completed("a.png");
        let big = SelectedFile::from_bytes("big.png", "image/png", vec![0u8; 32]);
        let _ = s.begin_selection(big, 8);
        assert!(s.result().is_none() && s.error().is_some());

        let t = s.begin_processing().unwrap();
        s.finish_processing(t, Ok("data:,x".into()));
        assert!(s.result().is_some() && s.error().is_none());
    }

    #[test]
    fn revision_counts_applied_transitions_only() {
        let mut s = SubmissionState::default();
        assert_eq!(s.revision(), 0);

        s.set_phase(Phase::Venous);
        assert_eq!(s.revision(), 1);

        let first = s.begin_selection(png("a.png"), LIMIT).unwrap();
        let second = s.begin_selection(png("b.png"), LIMIT).unwrap();
        assert_eq!(s.revision(), 3);

        s.finish_selection(second, Ok("data:,b".into()));
        assert_eq!(s.revision(), 4);
        // stale completion changes nothing
        s.finish_selection(first, Ok("data:,a".into()));
        assert_eq!(s.revision(), 4);

        let _ = s.begin_selection(png("c.png"), 1);
        assert_eq!(s.revision(), 5, "rejections are transitions too");
    }

    #[test]
    fn later_snapshot_is_newer() {
        let mut s = selected("a.png");
        let older = s.snapshot();
        let t = s.begin_processing().unwrap();
        let middle = s.snapshot();
        s.finish_processing(t, Ok("data:,x".into()));
        let newer = s.snapshot();

        assert!(newer.is_newer_than(&middle));
        assert!(middle.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!newer.is_newer_than(&newer));
    }
}
