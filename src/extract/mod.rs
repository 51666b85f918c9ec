//! Extraction client boundary.
//!
//! The image-processing pipeline is an opaque collaborator: it takes the
//! selected image and asynchronously returns the whole table or a
//! failure — no partial-row streaming. The trait is the seam; the real
//! implementation lives in [`http`], and tests substitute doubles.

mod http;

pub use http::HttpExtractionClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{ExtractionError, TableError};
use crate::intake::SourceFile;
use crate::table::{AttendanceRow, AttendanceTable, Mark};

/// The image payload handed to the extraction collaborator. Bytes are
/// shared with the intake manager, not copied.
#[derive(Debug, Clone)]
pub struct ExtractionPayload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl From<&SourceFile> for ExtractionPayload {
    fn from(source: &SourceFile) -> Self {
        Self {
            file_name: source.name().to_string(),
            media_type: source.media_type().to_string(),
            bytes: source.share_bytes(),
        }
    }
}

/// Opaque extraction collaborator.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, payload: ExtractionPayload)
    -> Result<AttendanceTable, ExtractionError>;
}

/// One row as the pipeline service reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RowPayload {
    pub roll_no: String,
    pub name: String,
    pub attendance: Vec<String>,
    pub confidence: Vec<f32>,
}

/// Validate service rows into the result model. Rejects atomically: a
/// single bad row fails the whole response, so a partially-valid table
/// never reaches the workflow.
pub(crate) fn into_table(rows: Vec<RowPayload>) -> Result<AttendanceTable, ExtractionError> {
    let mut validated = Vec::with_capacity(rows.len());
    for row in rows {
        let marks = row
            .attendance
            .iter()
            .enumerate()
            .map(|(column, raw)| {
                Mark::from_raw(raw).ok_or_else(|| TableError::EmptyMark {
                    roll_no: row.roll_no.clone(),
                    column,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        validated.push(AttendanceRow::new(
            row.roll_no,
            row.name,
            marks,
            row.confidence,
        )?);
    }
    Ok(AttendanceTable::new(validated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_row(roll: &str, marks: &[&str], conf: &[f32]) -> RowPayload {
        RowPayload {
            roll_no: roll.to_string(),
            name: format!("Student {roll}"),
            attendance: marks.iter().map(|m| m.to_string()).collect(),
            confidence: conf.to_vec(),
        }
    }

    #[test]
    fn valid_rows_become_a_table() {
        let table = into_table(vec![
            payload_row("01", &["P", "A"], &[0.99, 0.45]),
            payload_row("02", &["p", "x"], &[0.98, 0.30]),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
        // Marks are normalized on ingest
        assert_eq!(table.rows()[1].marks()[0].as_char(), 'P');
        assert_eq!(table.rows()[1].marks()[1].as_char(), 'X');
    }

    #[test]
    fn shape_mismatch_rejects_the_whole_response() {
        let result = into_table(vec![
            payload_row("01", &["P", "A"], &[0.99, 0.45]),
            payload_row("02", &["P"], &[0.98, 0.30]),
        ]);
        assert!(matches!(
            result,
            Err(ExtractionError::BadTable(TableError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn empty_mark_rejects_the_whole_response() {
        let result = into_table(vec![payload_row("01", &["P", ""], &[0.99, 0.45])]);
        assert!(matches!(
            result,
            Err(ExtractionError::BadTable(TableError::EmptyMark { column: 1, .. }))
        ));
    }

    #[test]
    fn wire_rows_deserialize_from_camel_case() {
        let raw = r#"{"rollNo":"04","name":"Ananya Gupta","attendance":["A","P"],"confidence":[0.55,0.99]}"#;
        let row: RowPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(row.roll_no, "04");
        assert_eq!(row.attendance, vec!["A", "P"]);
    }
}
