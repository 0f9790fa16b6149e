//! Mock processing service and observer for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use phasesim::{ProcessRequest, ProcessingService, StateObserver, StateSnapshot, SubmissionError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify};

type Reply = Result<String, SubmissionError>;

/// Processing service whose calls block until the test releases them.
///
/// Each call to [`GatedService::gate`] queues one gate; the n-th request
/// waits on the n-th gate. Requests without a gate fail immediately.
pub struct GatedService {
    called: Notify,
    gates: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    requests: Mutex<Vec<ProcessRequest>>,
}

impl GatedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            called: Notify::new(),
            gates: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a gate for the next request; send on it to release the request.
    pub fn gate(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Resolve once a request has reached the service.
    pub async fn wait_for_call(&self) {
        self.called.notified().await;
    }

    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessingService for GatedService {
    async fn process(&self, request: &ProcessRequest) -> Result<String, SubmissionError> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.gates.lock().unwrap().pop_front();
        self.called.notify_one();

        match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(SubmissionError::NetworkError {
                    message: "gate dropped".into(),
                })
            }),
            None => Err(SubmissionError::NetworkError {
                message: "no gate queued".into(),
            }),
        }
    }
}

/// Observer that keeps every snapshot and superseded generation.
#[derive(Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<StateSnapshot>>,
    superseded: Mutex<Vec<u64>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<StateSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn superseded(&self) -> Vec<u64> {
        self.superseded.lock().unwrap().clone()
    }
}

impl StateObserver for RecordingObserver {
    fn on_state_change(&self, snapshot: &StateSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn on_superseded(&self, generation: u64) {
        self.superseded.lock().unwrap().push(generation);
    }
}
