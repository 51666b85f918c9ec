//! SQLite commit sink.
//!
//! The connection lives behind `Arc<Mutex<_>>` and every commit runs on
//! tokio's blocking thread pool via `spawn_blocking`, keeping synchronous
//! SQLite I/O off async worker threads. Each snapshot is written in one
//! transaction: a session header plus one record per cell, all or
//! nothing.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::info;

use super::{CommitAck, CommitSink};
use crate::errors::CommitError;
use crate::table::AttendanceTable;

pub struct SqliteSink {
    inner: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (or create) the database at the given path and run
    /// migrations.
    pub fn open(path: &Path) -> Result<Self, CommitError> {
        let conn = Connection::open(path)
            .map_err(|e| CommitError::Storage(anyhow!(e).context("Failed to open database")))?;
        Self::from_connection(conn)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, CommitError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CommitError::Storage(anyhow!(e).context("Failed to open in-memory database")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, CommitError> {
        init_schema(&conn)
            .map_err(|e| CommitError::Storage(anyhow!(e).context("Failed to run migrations")))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS attendance_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            committed_at TEXT NOT NULL,
            row_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attendance_marks (
            session_id INTEGER NOT NULL REFERENCES attendance_sessions(id) ON DELETE CASCADE,
            roll_no TEXT NOT NULL,
            name TEXT NOT NULL,
            day INTEGER NOT NULL,
            mark TEXT NOT NULL,
            confidence REAL NOT NULL,
            PRIMARY KEY (session_id, roll_no, day)
        );
        ",
    )
}

#[async_trait]
impl CommitSink for SqliteSink {
    async fn commit(&self, snapshot: AttendanceTable) -> Result<CommitAck, CommitError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || write_snapshot(&inner, &snapshot))
            .await
            .map_err(|e| CommitError::Storage(anyhow!("Commit task panicked: {e}")))?
    }
}

fn write_snapshot(
    inner: &Mutex<Connection>,
    snapshot: &AttendanceTable,
) -> Result<CommitAck, CommitError> {
    let mut conn = inner.lock().map_err(|_| CommitError::LockPoisoned)?;
    let tx = conn
        .transaction()
        .map_err(|e| CommitError::Storage(anyhow!(e)))?;

    tx.execute(
        "INSERT INTO attendance_sessions (committed_at, row_count) VALUES (?1, ?2)",
        params![Utc::now().to_rfc3339(), snapshot.len() as i64],
    )
    .map_err(|e| CommitError::Storage(anyhow!(e)))?;
    let session_id = tx.last_insert_rowid();

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO attendance_marks (session_id, roll_no, name, day, mark, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| CommitError::Storage(anyhow!(e)))?;
        for row in snapshot.rows() {
            for (day, (mark, confidence)) in
                row.marks().iter().zip(row.confidences()).enumerate()
            {
                stmt.execute(params![
                    session_id,
                    row.roll_no(),
                    row.name(),
                    day as i64,
                    mark.to_string(),
                    *confidence as f64,
                ])
                .map_err(|e| CommitError::Storage(anyhow!(e)))?;
            }
        }
    }

    tx.commit().map_err(|e| CommitError::Storage(anyhow!(e)))?;
    info!(session_id, rows = snapshot.len(), "attendance snapshot persisted");
    Ok(CommitAck::Persisted {
        session_id,
        rows: snapshot.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AttendanceRow, Mark};

    fn marks(s: &str) -> Vec<Mark> {
        s.chars().map(|c| Mark::from_raw(&c.to_string()).unwrap()).collect()
    }

    fn sample_table() -> AttendanceTable {
        AttendanceTable::new(vec![
            AttendanceRow::new("01", "Aarav Sharma", marks("PPA"), vec![0.99, 0.95, 0.45]).unwrap(),
            AttendanceRow::new("02", "Diya Patel", marks("PAP"), vec![0.98, 0.99, 0.99]).unwrap(),
        ])
    }

    #[tokio::test]
    async fn commit_persists_every_cell() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let ack = sink.commit(sample_table()).await.unwrap();
        let CommitAck::Persisted { session_id, rows } = ack else {
            panic!("Expected Persisted ack");
        };
        assert_eq!(rows, 2);

        let conn = sink.inner.lock().unwrap();
        let cells: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM attendance_marks WHERE session_id = ?1",
                params![session_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(cells, 6);

        let mark: String = conn
            .query_row(
                "SELECT mark FROM attendance_marks WHERE session_id = ?1 AND roll_no = '01' AND day = 2",
                params![session_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(mark, "A");
    }

    #[tokio::test]
    async fn repeated_commits_create_separate_sessions() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let first = sink.commit(sample_table()).await.unwrap();
        let second = sink.commit(sample_table()).await.unwrap();
        assert_ne!(first, second);

        let conn = sink.inner.lock().unwrap();
        let sessions: i64 = conn
            .query_row("SELECT COUNT(*) FROM attendance_sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sessions, 2);
    }

    #[tokio::test]
    async fn open_on_disk_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.db");
        let sink = SqliteSink::open(&path).unwrap();
        sink.commit(sample_table()).await.unwrap();
        assert!(path.exists());
    }
}
