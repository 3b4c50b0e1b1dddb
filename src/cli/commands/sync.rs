//! Sync command implementation
//!
//! This module implements the `sync` command: UCS change feed into the FHIR
//! server, once or in a watch loop.

use super::{
    build_fhir_client, build_ucs_client, EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_PARTIAL,
};
use crate::config::{load_config, BridgeConfig};
use crate::core::audit::audit_logger_from_config;
use crate::core::executor::{TransformationExecutor, WorkerPool};
use crate::core::sync::{FileCursorStore, ForwardIngestion, SyncDriver, SyncMode};
use crate::domain::BridgeError;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Override sync mode (incremental or bulk)
    #[arg(long)]
    pub mode: Option<String>,

    /// Override the number of records fetched per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Keep polling the feed until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Dry run mode - transform without writing to FHIR or saving the cursor
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting sync command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        // Apply CLI overrides
        if let Some(mode) = &self.mode {
            tracing::info!(mode = %mode, "Overriding sync mode from CLI");
            config.sync.mode = mode.clone();
        }
        if let Some(page_size) = self.page_size {
            tracing::info!(page_size = page_size, "Overriding page size from CLI");
            config.sync.page_size = page_size;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }
        let mode: SyncMode = match config.sync.mode.parse() {
            Ok(mode) => mode,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let dry_run = config.application.dry_run;

        if dry_run {
            println!("🔍 DRY RUN MODE - Nothing will be written to the FHIR server");
            println!();
        }

        let driver = match build_driver(&config, dry_run) {
            Ok(driver) => driver,
            Err(e @ BridgeError::Configuration(_)) => {
                eprintln!("Failed to initialize sync: {e}");
                return Ok(EXIT_CONFIG);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize sync");
                eprintln!("Failed to initialize sync: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        if self.watch || config.sync.poll_interval_seconds > 0 {
            let interval = Duration::from_secs(config.sync.poll_interval_seconds.max(1));
            println!("👀 Watching the UCS feed every {}s (Ctrl+C to stop)", interval.as_secs());
            let outcome = driver.watch(mode, interval, shutdown_signal).await;

            println!();
            println!("📊 Watch Summary:");
            println!("  Runs: {}", outcome.runs);
            println!("  Failed runs: {}", outcome.failed_runs);
            println!("  Failed records: {}", outcome.failed_records);
            return Ok(if outcome.failed_runs > 0 || outcome.failed_records > 0 {
                EXIT_PARTIAL
            } else {
                0
            });
        }

        println!("🚀 Starting {mode} sync...");
        let summary = match driver.run(mode).await {
            Ok(summary) => summary,
            Err(e @ BridgeError::Ucs(_)) => {
                tracing::error!(error = %e, "Sync failed");
                eprintln!("Sync failed: {e}");
                return Ok(EXIT_CONNECTION);
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync failed");
                eprintln!("Sync failed: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        println!();
        println!("📊 Sync Summary:");
        println!("  Records: {}", summary.total_records);
        println!("  Successful: {}", summary.successful);
        println!("  Created: {}", summary.created);
        println!("  Updated: {}", summary.updated);
        println!("  Failed: {}", summary.failed);
        println!(
            "  Cursor: {} -> {}",
            summary.cursor_before, summary.cursor_after
        );
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        if !summary.errors.is_empty() {
            println!("⚠️  Errors encountered:");
            for error in &summary.errors {
                println!("  - {:?} [{}]: {}", error.stage, error.record_id, error.message);
            }
            println!();
        }

        if summary.is_successful() {
            println!("✅ Sync completed successfully!");
            Ok(0)
        } else {
            println!("⚠️  Sync completed with failures");
            Ok(EXIT_PARTIAL)
        }
    }
}

fn build_driver(config: &BridgeConfig, dry_run: bool) -> crate::domain::Result<SyncDriver> {
    let pool = Arc::new(WorkerPool::from_config(
        "forward",
        &config.executor.forward_pool,
    )?);
    let executor = Arc::new(TransformationExecutor::new(
        pool,
        Duration::from_millis(config.executor.batch_timeout_ms),
    ));
    let audit = audit_logger_from_config(&config.audit)?;
    let ingestion = ForwardIngestion::new(build_fhir_client(config)?, audit, dry_run);

    Ok(SyncDriver::new(
        build_ucs_client(config)?,
        executor,
        ingestion,
        Arc::new(FileCursorStore::new(&config.sync.cursor_path)),
        &config.sync,
        dry_run,
    ))
}
