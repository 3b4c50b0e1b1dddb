//! Forward sync: UCS change feed into the FHIR server
//!
//! - [`SyncDriver`] - bulk/incremental paging with cursor checkpoints
//! - [`ForwardIngestion`] - upsert of transformed Patients
//! - [`CursorStore`] - persisted server-version cursor
//! - [`SyncSummary`] - per-run counters and errors

pub mod cursor;
pub mod driver;
pub mod ingestion;
pub mod summary;

pub use cursor::{CursorStore, FileCursorStore};
pub use driver::{SyncDriver, SyncMode, WatchOutcome};
pub use ingestion::{ForwardIngestion, IngestOutcome};
pub use summary::{SyncError, SyncStage, SyncSummary};
