//! The extraction-review workflow: the state machine itself plus the
//! async driver that runs it against real collaborators.

mod machine;
mod runner;

pub use machine::{
    CommitRequest, CommitToken, ExtractionRequest, ExtractionToken, Resolution, ReviewWorkflow,
    WorkflowState,
};
pub use runner::{WorkflowEvent, WorkflowRunner};
