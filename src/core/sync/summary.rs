//! Sync run summary and reporting

use super::driver::SyncMode;
use crate::domain::ServerVersion;
use crate::log_sync_complete;
use std::time::Duration;

/// Stage at which a record failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Feed record could not be mapped to a client
    Mapping,
    Transformation,
    Timeout,
    /// FHIR lookup or write failed
    Ingestion,
}

/// One failed record
#[derive(Debug, Clone)]
pub struct SyncError {
    pub stage: SyncStage,

    /// Registry entity id of the record
    pub record_id: String,

    pub message: String,
}

impl SyncError {
    pub fn new(stage: SyncStage, record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            record_id: record_id.into(),
            message: message.into(),
        }
    }
}

/// Summary of one page of the forward sync
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub mode: SyncMode,

    /// Records fetched from the feed
    pub total_records: usize,

    pub successful: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,

    pub cursor_before: ServerVersion,
    pub cursor_after: ServerVersion,

    /// FHIR writes and cursor persistence were skipped
    pub dry_run: bool,

    pub duration: Duration,
    pub errors: Vec<SyncError>,
}

impl SyncSummary {
    pub fn new(mode: SyncMode, cursor_before: ServerVersion, dry_run: bool) -> Self {
        Self {
            mode,
            total_records: 0,
            successful: 0,
            failed: 0,
            created: 0,
            updated: 0,
            cursor_before,
            cursor_after: cursor_before,
            dry_run,
            duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Counts a failed record
    pub fn add_error(&mut self, error: SyncError) {
        self.failed += 1;
        self.errors.push(error);
    }

    pub fn is_successful(&self) -> bool {
        self.failed == 0
    }

    /// Percentage of fetched records that synced
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        (self.successful as f64 / self.total_records as f64) * 100.0
    }

    pub fn log_summary(&self) {
        log_sync_complete!(self.successful, self.failed, self.duration);
        tracing::info!(
            mode = %self.mode,
            total = self.total_records,
            created = self.created,
            updated = self.updated,
            cursor_before = %self.cursor_before,
            cursor_after = %self.cursor_after,
            dry_run = self.dry_run,
            success_rate = format!("{:.2}%", self.success_rate()),
            "Sync page processed"
        );

        for error in &self.errors {
            tracing::warn!(
                stage = ?error.stage,
                record_id = %error.record_id,
                message = %error.message,
                "Sync error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_summary_keeps_cursor() {
        let cursor = ServerVersion::new(10).unwrap();
        let summary = SyncSummary::new(SyncMode::Incremental, cursor, false);
        assert_eq!(summary.cursor_after, cursor);
        assert!(summary.is_successful());
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[test]
    fn test_add_error_counts_failure() {
        let mut summary = SyncSummary::new(SyncMode::Bulk, ServerVersion::ZERO, false);
        summary.total_records = 4;
        summary.successful = 3;
        summary.add_error(SyncError::new(SyncStage::Transformation, "be-1", "no gender"));

        assert_eq!(summary.failed, 1);
        assert!(!summary.is_successful());
        assert_eq!(summary.success_rate(), 75.0);
    }
}
