//! The result model: the mutable table of per-student attendance marks
//! produced by extraction and edited during review.
//!
//! The load-bearing invariant lives here: every row keeps `marks` and
//! `confidences` index-aligned and equal in length at all times. Rows can
//! only be built through the fallible constructor, and the only mutator
//! writes a mark and its confidence as one operation.

mod policy;

pub use policy::{REVIEW_THRESHOLD, needs_review};

use std::fmt;

use serde::{Serialize, Serializer};

use crate::errors::TableError;

/// A single-character attendance value for one student on one day.
///
/// The alphabet is open: the classifier emits at least `P`, `A`, and
/// ad-hoc symbols for uncertain glyphs, and manual entry accepts any
/// character. Raw input is truncated to its first code point and
/// upper-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(char);

impl Mark {
    /// Normalize raw input to a mark: first code point, upper-cased.
    /// Returns `None` for empty input.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let first = raw.chars().next()?;
        // to_uppercase can expand to several chars (e.g. 'ß' -> "SS");
        // keep the first, consistent with single-cell truncation.
        let upper = first.to_uppercase().next().unwrap_or(first);
        Some(Self(upper))
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One student's row: roll number, name, and index-aligned marks and
/// confidences for the tracked days.
///
/// Serialized with the wire field names of the pipeline service
/// (`rollNo` / `attendance` / `confidence`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    roll_no: String,
    name: String,
    #[serde(rename = "attendance")]
    marks: Vec<Mark>,
    #[serde(rename = "confidence")]
    confidences: Vec<f32>,
}

impl AttendanceRow {
    /// Build a row, enforcing the length invariant and clamping
    /// confidences to [0, 1].
    pub fn new(
        roll_no: impl Into<String>,
        name: impl Into<String>,
        marks: Vec<Mark>,
        confidences: Vec<f32>,
    ) -> Result<Self, TableError> {
        let roll_no = roll_no.into();
        if marks.len() != confidences.len() {
            return Err(TableError::ShapeMismatch {
                roll_no,
                marks: marks.len(),
                confidences: confidences.len(),
            });
        }
        let confidences = confidences.into_iter().map(|c| c.clamp(0.0, 1.0)).collect();
        Ok(Self {
            roll_no,
            name: name.into(),
            marks,
            confidences,
        })
    }

    pub fn roll_no(&self) -> &str {
        &self.roll_no
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }

    /// Number of tracked days.
    pub fn day_count(&self) -> usize {
        self.marks.len()
    }

    /// Write a human-confirmed mark. The paired confidence is forced to
    /// 1.0 in the same operation: a confirmed value is authoritative and
    /// immediately clears any review flag for the cell.
    fn confirm_mark(&mut self, column: usize, mark: Mark) {
        self.marks[column] = mark;
        self.confidences[column] = 1.0;
    }
}

/// The ordered extraction result. Produced atomically, replaced
/// wholesale, and mutated in place by edits; the workflow never reorders
/// or removes rows.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AttendanceTable {
    rows: Vec<AttendanceRow>,
}

impl AttendanceTable {
    pub fn new(rows: Vec<AttendanceRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[AttendanceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Apply a manual cell edit. Out-of-bounds indices and empty input
    /// are no-ops, not errors; returns whether an edit was applied.
    pub fn edit_cell(&mut self, row: usize, column: usize, raw: &str) -> bool {
        let Some(mark) = Mark::from_raw(raw) else {
            return false;
        };
        let Some(target) = self.rows.get_mut(row) else {
            return false;
        };
        if column >= target.day_count() {
            return false;
        }
        target.confirm_mark(column, mark);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(s: &str) -> Vec<Mark> {
        s.chars().map(|c| Mark::from_raw(&c.to_string()).unwrap()).collect()
    }

    fn sample_table() -> AttendanceTable {
        AttendanceTable::new(vec![
            AttendanceRow::new("01", "Aarav Sharma", marks("PPAPP"), vec![0.99, 0.95, 0.45, 0.99, 0.98])
                .unwrap(),
            AttendanceRow::new("04", "Ananya Gupta", marks("APPPP"), vec![0.55, 0.99, 0.99, 0.99, 0.99])
                .unwrap(),
        ])
    }

    #[test]
    fn mark_normalizes_to_first_uppercased_code_point() {
        assert_eq!(Mark::from_raw("p").unwrap().as_char(), 'P');
        assert_eq!(Mark::from_raw("absent").unwrap().as_char(), 'A');
        assert_eq!(Mark::from_raw("x").unwrap().as_char(), 'X');
        // Multi-char uppercase expansions are truncated too
        assert_eq!(Mark::from_raw("ß").unwrap().as_char(), 'S');
        assert!(Mark::from_raw("").is_none());
    }

    #[test]
    fn mark_alphabet_is_open() {
        // No closed enum: any single character is accepted verbatim.
        assert_eq!(Mark::from_raw("?").unwrap().as_char(), '?');
        assert_eq!(Mark::from_raw("✓").unwrap().as_char(), '✓');
    }

    #[test]
    fn row_rejects_length_mismatch() {
        let err = AttendanceRow::new("04", "Ananya", marks("AP"), vec![0.5]).unwrap_err();
        match err {
            TableError::ShapeMismatch { marks, confidences, .. } => {
                assert_eq!(marks, 2);
                assert_eq!(confidences, 1);
            }
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn row_clamps_confidences_on_ingest() {
        let row = AttendanceRow::new("01", "A", marks("PA"), vec![1.7, -0.2]).unwrap();
        assert_eq!(row.confidences(), &[1.0, 0.0]);
    }

    #[test]
    fn rows_keep_lengths_aligned_through_edits() {
        let mut table = sample_table();
        table.edit_cell(1, 0, "P");
        for row in table.rows() {
            assert_eq!(row.marks().len(), row.confidences().len());
        }
    }

    #[test]
    fn edit_writes_mark_and_forces_confidence() {
        let mut table = sample_table();
        assert!(table.edit_cell(1, 0, "p"));
        let row = &table.rows()[1];
        assert_eq!(row.marks()[0].as_char(), 'P');
        assert_eq!(row.confidences()[0], 1.0);
        assert!(!needs_review(row.confidences()[0]));
    }

    #[test]
    fn edit_is_idempotent() {
        let mut table = sample_table();
        assert!(table.edit_cell(1, 0, "P"));
        let after_once = format!("{:?}", table.rows()[1]);
        assert!(table.edit_cell(1, 0, "P"));
        let after_twice = format!("{:?}", table.rows()[1]);
        assert_eq!(after_once, after_twice);
    }

    #[test]
    fn out_of_bounds_edit_is_a_no_op() {
        let mut table = sample_table();
        let before = format!("{:?}", table);
        assert!(!table.edit_cell(7, 0, "P"));
        assert!(!table.edit_cell(0, 9, "P"));
        assert!(!table.edit_cell(0, 0, ""));
        assert_eq!(before, format!("{:?}", table));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let table = sample_table();
        let json = serde_json::to_value(&table).unwrap();
        let first = &json[0];
        assert_eq!(first["rollNo"], "01");
        assert_eq!(first["attendance"][2], "A");
        assert!(first["confidence"][2].as_f64().unwrap() < 0.6);
    }
}
