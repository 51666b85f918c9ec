//! Commit sink boundary.
//!
//! The sink receives an immutable snapshot of the result model and
//! asynchronously acknowledges or fails; commit is all-or-nothing from
//! the workflow's perspective. The sink is an explicitly owned resource
//! constructed once from configuration — no ambient global handle. When
//! no storage endpoint is configured it runs in a declared detached mode,
//! so "not configured" is distinguishable from "commit failed".

mod sqlite;

pub use sqlite::SqliteSink;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::config::Config;
use crate::errors::CommitError;
use crate::table::AttendanceTable;

/// Acknowledgment from the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitAck {
    /// Rows were durably persisted under the given session id.
    Persisted { session_id: i64, rows: usize },
    /// No storage endpoint is configured; the snapshot was accepted and
    /// dropped. Not a failure.
    Detached,
}

/// Opaque commit collaborator. Takes the snapshot by value: the workflow
/// hands over a clone, so edits made while the commit is in flight cannot
/// touch the payload being persisted.
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn commit(&self, snapshot: AttendanceTable) -> Result<CommitAck, CommitError>;
}

/// Sink used when no storage endpoint is configured.
pub struct DetachedSink;

#[async_trait]
impl CommitSink for DetachedSink {
    async fn commit(&self, snapshot: AttendanceTable) -> Result<CommitAck, CommitError> {
        warn!(
            rows = snapshot.len(),
            "no database configured; commit running in detached mode"
        );
        Ok(CommitAck::Detached)
    }
}

/// Build the sink the configuration calls for.
pub fn sink_from_config(config: &Config) -> Result<Arc<dyn CommitSink>> {
    match &config.database {
        Some(path) => Ok(Arc::new(SqliteSink::open(path)?)),
        None => {
            warn!("ROLLCALL_DB not set; commits will not be persisted");
            Ok(Arc::new(DetachedSink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AttendanceRow, AttendanceTable, Mark};

    fn one_row_table() -> AttendanceTable {
        let marks = vec![Mark::from_raw("P").unwrap(), Mark::from_raw("A").unwrap()];
        AttendanceTable::new(vec![
            AttendanceRow::new("01", "Aarav Sharma", marks, vec![0.99, 0.45]).unwrap(),
        ])
    }

    #[tokio::test]
    async fn detached_sink_acknowledges_without_failing() {
        let ack = DetachedSink.commit(one_row_table()).await.unwrap();
        assert_eq!(ack, CommitAck::Detached);
    }

    #[test]
    fn unconfigured_storage_builds_detached_sink() {
        let config = Config::default();
        assert!(!config.storage_configured());
        // Construction itself must not fail hard
        sink_from_config(&config).unwrap();
    }
}
