//! rollcall — attendance register extraction-review workflow.
//!
//! A photographed attendance register goes in; a machine-extracted table
//! of per-student marks with per-cell confidence comes out, gets
//! reviewed and corrected by a human, and is committed to storage. The
//! crate owns the finite-state process and the data model that must stay
//! consistent across every transition; the OCR pipeline and the storage
//! engine are opaque collaborators behind traits.

pub mod commit;
pub mod config;
pub mod errors;
pub mod extract;
pub mod intake;
pub mod table;
pub mod workflow;
