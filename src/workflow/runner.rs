//! Async driver for the review workflow.
//!
//! All mutation stays on the caller's task: launching extraction or
//! commit spawns the collaborator call, and its resolution comes back as
//! an event on an internal channel. The caller pumps events into the
//! machine, so ordering is simply the order events are delivered —
//! no locks around the workflow itself. The driver also owns the
//! timeout policy and the acknowledgment display timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::machine::{CommitToken, ExtractionToken, Resolution, ReviewWorkflow};
use crate::commit::{CommitAck, CommitSink};
use crate::config::Config;
use crate::errors::{CommitError, ExtractionError, ValidationError, WorkflowError};
use crate::extract::ExtractionClient;
use crate::intake::FileCandidate;
use crate::table::AttendanceTable;

/// Resolution of one async collaborator call, delivered back to the
/// single mutation task.
#[derive(Debug)]
pub enum WorkflowEvent {
    ExtractionDone {
        token: ExtractionToken,
        outcome: Result<AttendanceTable, ExtractionError>,
    },
    CommitDone {
        token: CommitToken,
        outcome: Result<CommitAck, CommitError>,
    },
    AckExpired {
        token: CommitToken,
    },
}

pub struct WorkflowRunner {
    machine: ReviewWorkflow,
    extractor: Arc<dyn ExtractionClient>,
    sink: Arc<dyn CommitSink>,
    extraction_timeout: Duration,
    commit_timeout: Duration,
    ack_display: Duration,
    tx: mpsc::UnboundedSender<WorkflowEvent>,
    rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl WorkflowRunner {
    pub fn new(
        config: &Config,
        extractor: Arc<dyn ExtractionClient>,
        sink: Arc<dyn CommitSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            machine: ReviewWorkflow::new(),
            extractor,
            sink,
            extraction_timeout: Duration::from_secs(config.extraction_timeout_secs),
            commit_timeout: Duration::from_secs(config.commit_timeout_secs),
            ack_display: Duration::from_secs(config.ack_display_secs),
            tx,
            rx,
        }
    }

    pub fn machine(&self) -> &ReviewWorkflow {
        &self.machine
    }

    pub fn select_file(&mut self, candidate: FileCandidate) -> Result<(), ValidationError> {
        self.machine.select_file(candidate)
    }

    pub fn remove_file(&mut self) {
        self.machine.remove_file();
    }

    pub fn edit_cell(&mut self, row: usize, column: usize, raw: &str) -> bool {
        self.machine.edit_cell(row, column, raw)
    }

    /// Launch extraction for the selected file. Returns as soon as the
    /// call is in flight; the outcome arrives via [`Self::pump`].
    pub fn start_extraction(&mut self) -> Result<(), WorkflowError> {
        let request = self.machine.start_extraction()?;
        let extractor = Arc::clone(&self.extractor);
        let tx = self.tx.clone();
        let deadline = self.extraction_timeout;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(deadline, extractor.extract(request.payload))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ExtractionError::TimedOut {
                    seconds: deadline.as_secs(),
                }),
            };
            // Receiver gone means the session was torn down; nothing to do.
            let _ = tx.send(WorkflowEvent::ExtractionDone {
                token: request.token,
                outcome,
            });
        });
        Ok(())
    }

    /// Launch a commit of the current result model snapshot.
    pub fn request_commit(&mut self) -> Result<(), WorkflowError> {
        let request = self.machine.request_commit()?;
        let sink = Arc::clone(&self.sink);
        let tx = self.tx.clone();
        let deadline = self.commit_timeout;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(deadline, sink.commit(request.snapshot)).await
            {
                Ok(result) => result,
                Err(_) => Err(CommitError::TimedOut {
                    seconds: deadline.as_secs(),
                }),
            };
            let _ = tx.send(WorkflowEvent::CommitDone {
                token: request.token,
                outcome,
            });
        });
        Ok(())
    }

    /// Wait for the next event and feed it into the machine. Returns
    /// what the machine did with it, or `None` if the channel closed.
    pub async fn pump(&mut self) -> Option<Resolution> {
        let event = self.rx.recv().await?;
        Some(self.dispatch(event))
    }

    /// Pump events until no collaborator call is outstanding. Does not
    /// wait out the acknowledgment display timer.
    pub async fn settle(&mut self) {
        while self.machine.has_inflight() {
            if self.pump().await.is_none() {
                break;
            }
        }
    }

    fn dispatch(&mut self, event: WorkflowEvent) -> Resolution {
        match event {
            WorkflowEvent::ExtractionDone { token, outcome } => {
                self.machine.extraction_resolved(token, outcome)
            }
            WorkflowEvent::CommitDone { token, outcome } => {
                let succeeded = outcome.is_ok();
                let resolution = self.machine.commit_resolved(token, outcome);
                if resolution == Resolution::Applied && succeeded {
                    self.schedule_ack_expiry(token);
                }
                resolution
            }
            WorkflowEvent::AckExpired { token } => self.machine.ack_elapsed(token),
        }
    }

    fn schedule_ack_expiry(&self, token: CommitToken) {
        let tx = self.tx.clone();
        let ack_display = self.ack_display;
        debug!(secs = ack_display.as_secs(), "scheduling acknowledgment expiry");
        tokio::spawn(async move {
            tokio::time::sleep(ack_display).await;
            let _ = tx.send(WorkflowEvent::AckExpired { token });
        });
    }
}
