//! Bulk and incremental sync of the UCS change feed into FHIR
//!
//! One run processes one page of the feed:
//!
//! 1. **Load cursor**: persisted server version (incremental) or 0 (bulk)
//! 2. **Fetch**: up to `page_size` records at or above the cursor
//! 3. **Map**: feed records to canonical clients
//! 4. **Transform**: the page through the forward executor
//! 5. **Ingest**: each success into the FHIR server
//! 6. **Checkpoint**: the highest server version seen in the page
//!
//! Record failures are counted and logged; they never abort the page. The
//! checkpoint covers failed records too, so a poison record cannot stall the
//! feed.

use super::cursor::CursorStore;
use super::ingestion::ForwardIngestion;
use super::summary::{SyncError, SyncStage, SyncSummary};
use crate::adapters::ucs::UcsClientApi;
use crate::config::SyncConfig;
use crate::core::executor::{TransformationExecutor, TransformationResult};
use crate::domain::{BridgeError, OperationKind, Result, ServerVersion};
use crate::{log_error_with_context, log_sync_start};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Where a run starts reading the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// From the persisted cursor
    Incremental,
    /// From the start of the feed
    Bulk,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Incremental => f.write_str("incremental"),
            SyncMode::Bulk => f.write_str("bulk"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(SyncMode::Incremental),
            "bulk" | "full" => Ok(SyncMode::Bulk),
            other => Err(BridgeError::Configuration(format!(
                "Invalid sync mode '{other}', expected 'incremental' or 'bulk'"
            ))),
        }
    }
}

/// Totals over a watch loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOutcome {
    pub runs: usize,
    pub failed_runs: usize,
    pub failed_records: usize,
}

/// Pulls pages of the UCS change feed through the forward pipeline
pub struct SyncDriver {
    ucs: Arc<dyn UcsClientApi>,
    executor: Arc<TransformationExecutor>,
    ingestion: ForwardIngestion,
    cursor: Arc<dyn CursorStore>,
    page_size: usize,
    source_tag: String,
    dry_run: bool,
}

impl SyncDriver {
    pub fn new(
        ucs: Arc<dyn UcsClientApi>,
        executor: Arc<TransformationExecutor>,
        ingestion: ForwardIngestion,
        cursor: Arc<dyn CursorStore>,
        config: &SyncConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            ucs,
            executor,
            ingestion,
            cursor,
            page_size: config.page_size.max(1),
            source_tag: config.source_tag.clone(),
            dry_run,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Processes one page of the feed
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be fetched or the cursor cannot be
    /// saved. Per-record failures are reported in the summary instead.
    pub async fn run(&self, mode: SyncMode) -> Result<SyncSummary> {
        let start_time = Instant::now();

        let cursor_before = match mode {
            SyncMode::Incremental => self.cursor.load().await,
            SyncMode::Bulk => ServerVersion::ZERO,
        };
        log_sync_start!(mode, cursor_before);

        let mut summary = SyncSummary::new(mode, cursor_before, self.dry_run);

        let records = self.ucs.fetch_changes(cursor_before, self.page_size).await?;
        summary.total_records = records.len();
        if records.is_empty() {
            tracing::info!(cursor = %cursor_before, "No changes in feed");
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        let page_max = records
            .iter()
            .map(|r| r.server_version)
            .max()
            .unwrap_or(cursor_before);

        let mut record_ids = Vec::with_capacity(records.len());
        let mut clients = Vec::with_capacity(records.len());
        for record in &records {
            match record.to_client(&self.source_tag) {
                Ok(client) => {
                    record_ids.push(record.base_entity_id.clone());
                    clients.push(client);
                }
                Err(e) => summary.add_error(SyncError::new(
                    SyncStage::Mapping,
                    &record.base_entity_id,
                    e.to_string(),
                )),
            }
        }

        let results = self.executor.transform_forward_batch(clients).await;
        for (record_id, result) in record_ids.into_iter().zip(results) {
            match result {
                TransformationResult::Success(transformed) => {
                    match self.ingestion.ingest(transformed).await {
                        Ok(outcome) => {
                            summary.successful += 1;
                            match outcome.operation {
                                OperationKind::Create => summary.created += 1,
                                OperationKind::Update => summary.updated += 1,
                            }
                        }
                        Err(e) => summary.add_error(SyncError::new(
                            SyncStage::Ingestion,
                            record_id,
                            e.to_string(),
                        )),
                    }
                }
                TransformationResult::Failure(e) => summary.add_error(SyncError::new(
                    SyncStage::Transformation,
                    record_id,
                    e.to_string(),
                )),
                TransformationResult::Timeout => summary.add_error(SyncError::new(
                    SyncStage::Timeout,
                    record_id,
                    "Transformation timed out",
                )),
            }
        }

        summary.cursor_after = page_max;
        if self.dry_run {
            tracing::info!(cursor = %page_max, "Dry run, cursor not saved");
        } else {
            self.cursor.save(page_max).await?;
        }

        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    /// Runs pages until `shutdown` flips to true
    ///
    /// The first run uses `mode`; later runs are incremental. A full page that
    /// moved the saved cursor is followed immediately by the next one; anything
    /// else waits `interval`. Failed runs are logged and retried on the next tick.
    pub async fn watch(
        &self,
        mode: SyncMode,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> WatchOutcome {
        let mut outcome = WatchOutcome::default();
        let mut mode = mode;

        loop {
            if *shutdown.borrow() {
                tracing::info!(runs = outcome.runs, "Shutdown requested, stopping sync loop");
                break;
            }

            let mut drain = false;
            match self.run(mode).await {
                Ok(summary) => {
                    outcome.failed_records += summary.failed;
                    let page_full = summary.total_records >= self.page_size;
                    let advanced = summary.cursor_after > summary.cursor_before;
                    if page_full && !advanced {
                        tracing::warn!(
                            cursor = %summary.cursor_after,
                            page_size = self.page_size,
                            "Full page shares one server version, cursor cannot advance"
                        );
                    }
                    // A dry run never saves, so the next page would be the same one
                    drain = page_full && advanced && !self.dry_run;
                    mode = SyncMode::Incremental;
                }
                Err(e) => {
                    outcome.failed_runs += 1;
                    log_error_with_context!(e, "Sync run failed");
                }
            }
            outcome.runs += 1;

            if drain {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown channel closed, stopping sync loop");
                        break;
                    }
                }
            }
        }
        outcome
    }
}
