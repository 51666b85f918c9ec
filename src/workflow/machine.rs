//! The review workflow state machine.
//!
//! `Idle → FileSelected → Extracting → Reviewing → Committing →
//! Committed`, with `Committed` relaxing back to `Reviewing` after the
//! acknowledgment display interval and a new selection re-enterable from
//! any state.
//!
//! The machine is synchronous and pure: launching an async operation
//! hands back a request descriptor tagged with the originating identity,
//! and the caller feeds the resolution back in. Resolutions whose token
//! no longer matches current state are discarded (stale-response guard),
//! so the replace-file-mid-extraction race is handled here, not in the
//! driver. Single-flight for extraction and commit is enforced by this
//! API itself, not by UI disablement.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::commit::CommitAck;
use crate::errors::{CommitError, ExtractionError, ValidationError, WorkflowError};
use crate::extract::ExtractionPayload;
use crate::intake::{FileCandidate, IntakeManager, SourceFile};
use crate::table::AttendanceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    FileSelected,
    Extracting,
    Reviewing,
    Committing,
    Committed,
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::FileSelected => "FileSelected",
            Self::Extracting => "Extracting",
            Self::Reviewing => "Reviewing",
            Self::Committing => "Committing",
            Self::Committed => "Committed",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one extraction launch: the file it was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionToken {
    file_id: Uuid,
}

/// Identity of one commit launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitToken {
    id: Uuid,
}

/// Descriptor for an extraction the caller must now drive.
#[derive(Debug)]
pub struct ExtractionRequest {
    pub token: ExtractionToken,
    pub payload: ExtractionPayload,
}

/// Descriptor for a commit the caller must now drive. The snapshot is a
/// clone: concurrent edits cannot reach the payload being persisted.
#[derive(Debug)]
pub struct CommitRequest {
    pub token: CommitToken,
    pub snapshot: AttendanceTable,
}

/// What the machine did with a delivered resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The originating request no longer matches current state; the
    /// outcome was dropped without touching the model.
    Discarded,
}

/// Orchestrates intake, extraction, review edits, and commit through a
/// strict state sequence. The only mutation entry points a front end may
/// call.
#[derive(Debug)]
pub struct ReviewWorkflow {
    state: WorkflowState,
    intake: IntakeManager,
    table: Option<AttendanceTable>,
    /// File whose extraction already succeeded; re-extraction of the
    /// same file is refused.
    extracted_file: Option<Uuid>,
    inflight_extraction: Option<ExtractionToken>,
    inflight_commit: Option<CommitToken>,
    /// Token of the acknowledgment currently on display.
    acknowledged: Option<CommitToken>,
    last_ack: Option<CommitAck>,
    /// Most recent user-visible failure, distinguishable from
    /// "still in progress".
    last_error: Option<String>,
}

impl ReviewWorkflow {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            intake: IntakeManager::new(),
            table: None,
            extracted_file: None,
            inflight_extraction: None,
            inflight_commit: None,
            acknowledged: None,
            last_ack: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.intake.source()
    }

    pub fn table(&self) -> Option<&AttendanceTable> {
        self.table.as_ref()
    }

    pub fn last_ack(&self) -> Option<&CommitAck> {
        self.last_ack.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an async operation is outstanding.
    pub fn has_inflight(&self) -> bool {
        self.inflight_extraction.is_some() || self.inflight_commit.is_some()
    }

    /// Test hook: live preview handles issued by the intake manager.
    pub fn live_preview_count(&self) -> usize {
        self.intake.live_preview_count()
    }

    /// Select a file (browse or drag-and-drop). Reachable from any
    /// state. A validation failure leaves all state untouched; success
    /// replaces the handle pair, discards any prior result, and makes
    /// every outstanding async call stale.
    pub fn select_file(&mut self, candidate: FileCandidate) -> Result<(), ValidationError> {
        self.intake.select(candidate)?;
        self.table = None;
        self.extracted_file = None;
        self.inflight_extraction = None;
        self.inflight_commit = None;
        self.acknowledged = None;
        self.last_ack = None;
        self.last_error = None;
        self.state = WorkflowState::FileSelected;
        Ok(())
    }

    /// Remove the selected file and return to `Idle`. Any outstanding
    /// extraction or commit becomes stale.
    pub fn remove_file(&mut self) {
        self.intake.clear();
        self.table = None;
        self.extracted_file = None;
        self.inflight_extraction = None;
        self.inflight_commit = None;
        self.acknowledged = None;
        self.last_ack = None;
        self.last_error = None;
        self.state = WorkflowState::Idle;
    }

    /// Launch extraction for the selected file. Single-flight: refused
    /// while one is outstanding, and refused once the current file has
    /// already been extracted.
    pub fn start_extraction(&mut self) -> Result<ExtractionRequest, WorkflowError> {
        let (file_id, payload) = {
            let source = self.intake.source().ok_or(WorkflowError::NoFileSelected)?;
            (source.id(), ExtractionPayload::from(source))
        };

        match self.state {
            WorkflowState::FileSelected => {}
            WorkflowState::Extracting => return Err(WorkflowError::ExtractionInFlight),
            WorkflowState::Reviewing | WorkflowState::Committed
                if self.extracted_file == Some(file_id) =>
            {
                return Err(WorkflowError::AlreadyExtracted);
            }
            other => {
                return Err(WorkflowError::InvalidState {
                    action: "start extraction",
                    state: other.name(),
                });
            }
        }

        let token = ExtractionToken { file_id };
        self.inflight_extraction = Some(token);
        self.last_error = None;
        self.state = WorkflowState::Extracting;
        Ok(ExtractionRequest { token, payload })
    }

    /// Deliver the outcome of an extraction launch. Stale outcomes —
    /// wrong state, superseded token, or a file identity that no longer
    /// matches the current selection — are discarded.
    pub fn extraction_resolved(
        &mut self,
        token: ExtractionToken,
        outcome: Result<AttendanceTable, ExtractionError>,
    ) -> Resolution {
        let current_file = self.intake.source().map(|s| s.id());
        if self.state != WorkflowState::Extracting
            || self.inflight_extraction != Some(token)
            || current_file != Some(token.file_id)
        {
            debug!(
                state = %self.state,
                file_id = %token.file_id,
                "stale extraction response discarded"
            );
            return Resolution::Discarded;
        }

        self.inflight_extraction = None;
        match outcome {
            Ok(table) => {
                self.table = Some(table);
                self.extracted_file = Some(token.file_id);
                self.state = WorkflowState::Reviewing;
            }
            Err(err) => {
                warn!(%err, "extraction failed");
                self.table = None;
                self.last_error = Some(err.to_string());
                self.state = WorkflowState::FileSelected;
            }
        }
        Resolution::Applied
    }

    /// Apply a manual cell edit to the result model. No-op without a
    /// result or on out-of-bounds indices; returns whether an edit was
    /// applied. Permitted whenever a result exists — an in-flight commit
    /// works on its own snapshot.
    pub fn edit_cell(&mut self, row: usize, column: usize, raw: &str) -> bool {
        match self.table.as_mut() {
            Some(table) => table.edit_cell(row, column, raw),
            None => false,
        }
    }

    /// Launch a commit of the current result. Single-flight; only
    /// available while reviewing.
    pub fn request_commit(&mut self) -> Result<CommitRequest, WorkflowError> {
        if self.inflight_commit.is_some() {
            return Err(WorkflowError::CommitInFlight);
        }
        match self.state {
            WorkflowState::Reviewing => {}
            WorkflowState::Committing => return Err(WorkflowError::CommitInFlight),
            other => {
                return Err(WorkflowError::InvalidState {
                    action: "commit",
                    state: other.name(),
                });
            }
        }
        let snapshot = self.table.clone().ok_or(WorkflowError::NothingToCommit)?;

        let token = CommitToken { id: Uuid::new_v4() };
        self.inflight_commit = Some(token);
        self.last_error = None;
        self.state = WorkflowState::Committing;
        Ok(CommitRequest { token, snapshot })
    }

    /// Deliver the outcome of a commit launch. On failure the result
    /// model is untouched and the workflow returns to `Reviewing` for a
    /// retry.
    pub fn commit_resolved(
        &mut self,
        token: CommitToken,
        outcome: Result<CommitAck, CommitError>,
    ) -> Resolution {
        if self.state != WorkflowState::Committing || self.inflight_commit != Some(token) {
            debug!(state = %self.state, "stale commit response discarded");
            return Resolution::Discarded;
        }

        self.inflight_commit = None;
        match outcome {
            Ok(ack) => {
                self.last_ack = Some(ack);
                self.acknowledged = Some(token);
                self.state = WorkflowState::Committed;
            }
            Err(err) => {
                warn!(%err, "commit failed; result model preserved");
                self.last_error = Some(err.to_string());
                self.state = WorkflowState::Reviewing;
            }
        }
        Resolution::Applied
    }

    /// The acknowledgment display interval elapsed: relax `Committed`
    /// back to `Reviewing` so further edits and re-commits are
    /// permitted. Guarded by token so a timer for a superseded commit
    /// cannot clear a newer acknowledgment.
    pub fn ack_elapsed(&mut self, token: CommitToken) -> Resolution {
        if self.state != WorkflowState::Committed || self.acknowledged != Some(token) {
            debug!(state = %self.state, "stale acknowledgment timer discarded");
            return Resolution::Discarded;
        }
        self.acknowledged = None;
        self.last_ack = None;
        self.state = WorkflowState::Reviewing;
        Resolution::Applied
    }
}

impl Default for ReviewWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
