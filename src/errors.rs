//! Typed error hierarchy for the rollcall workflow.
//!
//! Four top-level enums cover the four subsystems:
//! - `ValidationError` — file intake rejections
//! - `ExtractionError` — extraction collaborator failures
//! - `CommitError` — commit sink failures
//! - `WorkflowError` — state-machine precondition violations
//!
//! None of these is fatal: every failure returns the workflow to its last
//! stable state with data intact.

use thiserror::Error;

/// Errors from file intake. Recovered locally; prior intake state is
/// left untouched when one of these is returned.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Incompatible media type '{media_type}': expected an image")]
    IncompatibleMediaType { media_type: String },

    #[error("Empty payload for '{name}'")]
    EmptyPayload { name: String },
}

/// Shape violations in extracted table data.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Row '{roll_no}' has {marks} marks but {confidences} confidences")]
    ShapeMismatch {
        roll_no: String,
        marks: usize,
        confidences: usize,
    },

    #[error("Row '{roll_no}' has an empty mark at column {column}")]
    EmptyMark { roll_no: String, column: usize },
}

/// Errors from the extraction collaborator. The workflow returns to
/// `FileSelected` so the user may retry processing.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction service unreachable: {0}")]
    Transport(String),

    #[error("Extraction service rejected the image: {message}")]
    Service { message: String },

    #[error("Malformed extraction payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    BadTable(#[from] TableError),

    #[error("Extraction timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

/// Errors from the commit sink. The workflow returns to `Reviewing` with
/// the result model preserved so the user may retry the commit.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Storage write failed: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Commit timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

/// Precondition violations on the review workflow API. These guard the
/// single-flight invariants even when a caller bypasses UI disablement.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Extraction already in flight for the selected file")]
    ExtractionInFlight,

    #[error("Selected file was already extracted; select a new file to re-run")]
    AlreadyExtracted,

    #[error("A commit is already in flight")]
    CommitInFlight,

    #[error("No extraction result to commit")]
    NothingToCommit,

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_media_type() {
        let err = ValidationError::IncompatibleMediaType {
            media_type: "application/pdf".into(),
        };
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn extraction_error_wraps_table_error() {
        let inner = TableError::ShapeMismatch {
            roll_no: "04".into(),
            marks: 5,
            confidences: 4,
        };
        let err: ExtractionError = inner.into();
        match &err {
            ExtractionError::BadTable(TableError::ShapeMismatch { roll_no, .. }) => {
                assert_eq!(roll_no, "04");
            }
            _ => panic!("Expected BadTable(ShapeMismatch)"),
        }
    }

    #[test]
    fn workflow_error_invalid_state_is_readable() {
        let err = WorkflowError::InvalidState {
            action: "commit",
            state: "Extracting",
        };
        assert_eq!(err.to_string(), "Cannot commit while Extracting");
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ValidationError::EmptyPayload { name: "x".into() });
        assert_std_error(&ExtractionError::TimedOut { seconds: 30 });
        assert_std_error(&CommitError::LockPoisoned);
        assert_std_error(&WorkflowError::NoFileSelected);
    }
}
