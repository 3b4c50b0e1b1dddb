//! Status command implementation
//!
//! This module implements the `status` command for displaying the persisted
//! sync cursor.

use super::EXIT_CONFIG;
use crate::config::load_config;
use crate::core::sync::{CursorStore, FileCursorStore};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking sync status");

        println!("📊 Sync Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let store = FileCursorStore::new(&config.sync.cursor_path);
        if !store.path().exists() {
            println!("No sync history found.");
            println!("Run 'smart-bridge sync' to start syncing.");
            return Ok(0);
        }

        let cursor = store.load().await;
        println!("  Cursor file: {}", store.path().display());
        println!("  Server version: {cursor}");
        println!("  Mode: {}", config.sync.mode);
        println!("  Page size: {}", config.sync.page_size);
        println!();
        Ok(0)
    }
}
