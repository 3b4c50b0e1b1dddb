//! Reverse sync command implementation
//!
//! This module implements the `reverse-sync` command: FHIR Patients from a
//! JSON file or a `_lastUpdated` poll into the UCS registry.

use super::{
    build_fhir_client, build_ucs_client, EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_PARTIAL,
};
use crate::adapters::fhir::resources_from_json;
use crate::config::{load_config, BridgeConfig};
use crate::core::audit::audit_logger_from_config;
use crate::core::change_detection::ChangeDetectionService;
use crate::core::executor::WorkerPool;
use crate::core::reverse_sync::{
    InMemoryVersionStore, ReverseSyncOrchestrator, ReverseSyncResult, SyncStatus,
};
use crate::domain::{FhirResource, ResourceKind, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the reverse-sync command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "since"])))]
pub struct ReverseSyncArgs {
    /// JSON file holding a Bundle, an array of resources or a single resource
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Poll the FHIR server for Patients updated after this RFC 3339 instant
    #[arg(long, value_name = "RFC3339")]
    pub since: Option<String>,
}

impl ReverseSyncArgs {
    /// Execute the reverse-sync command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting reverse sync command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let since = match self.since.as_deref().map(parse_since).transpose() {
            Ok(since) => since,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let orchestrator = match build_orchestrator(&config) {
            Ok(o) => Arc::new(o),
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize reverse sync");
                eprintln!("Failed to initialize reverse sync: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        if let Some(path) = &self.input {
            let resources = match read_resources(path) {
                Ok(resources) => resources,
                Err(e) => {
                    eprintln!("Failed to read {}: {e}", path.display());
                    return Ok(EXIT_FATAL);
                }
            };
            println!("🚀 Syncing {} resource(s) into UCS...", resources.len());
            let results = orchestrator.sync_batch(resources).await;
            print_results(&results);
        } else if let Some(since) = since {
            let fhir = match build_fhir_client(&config) {
                Ok(fhir) => fhir,
                Err(e) => {
                    eprintln!("Failed to initialize FHIR client: {e}");
                    return Ok(EXIT_CONNECTION);
                }
            };
            let mut detection = ChangeDetectionService::new(fhir);
            detection.register(ResourceKind::Patient, orchestrator.clone());

            println!("🔍 Polling FHIR changes since {}", since.to_rfc3339());
            match detection.poll_once(since).await {
                Ok(count) => println!("  Dispatched: {count}"),
                Err(e) => {
                    tracing::error!(error = %e, "FHIR poll failed");
                    eprintln!("FHIR poll failed: {e}");
                    return Ok(EXIT_CONNECTION);
                }
            }
        }

        let stats = orchestrator.stats();
        println!();
        println!("📊 Reverse Sync Summary:");
        println!("  Synced: {}", stats.synced);
        println!("  Skipped: {}", stats.skipped);
        println!("  Failed: {}", stats.failed);
        println!();

        if stats.failed > 0 {
            println!("⚠️  Reverse sync completed with failures");
            Ok(EXIT_PARTIAL)
        } else {
            println!("✅ Reverse sync completed successfully!");
            Ok(0)
        }
    }
}

fn build_orchestrator(config: &BridgeConfig) -> Result<ReverseSyncOrchestrator> {
    let pool = Arc::new(WorkerPool::from_config(
        "reverse",
        &config.executor.reverse_pool,
    )?);
    Ok(ReverseSyncOrchestrator::new(
        build_ucs_client(config)?,
        Arc::new(InMemoryVersionStore::new()),
        audit_logger_from_config(&config.audit)?,
        pool,
    ))
}

fn parse_since(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid --since '{raw}': {e}"))
}

fn read_resources(path: &Path) -> Result<Vec<FhirResource>> {
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(resources_from_json(value)?)
}

fn print_results(results: &[ReverseSyncResult]) {
    for result in results {
        let id = result.resource_id.as_deref().unwrap_or("<no id>");
        match result.status {
            SyncStatus::Synced => {
                let operation = result
                    .operation
                    .map(|op| op.to_string())
                    .unwrap_or_default();
                println!("  ✅ {id}: {operation}");
                for inconsistency in &result.inconsistencies {
                    println!("     ⚠️  {inconsistency}");
                }
            }
            SyncStatus::Skipped => {
                let reason = result
                    .skip_reason
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                println!("  ⏭️  {id}: skipped ({reason})");
            }
            SyncStatus::Failed => {
                let error = result
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                println!("  ❌ {id}: {error}");
            }
        }
    }
}
