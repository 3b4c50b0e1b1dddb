//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the bridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Smart Bridge - UCS/FHIR patient sync bridge
#[derive(Parser, Debug)]
#[command(name = "smart-bridge")]
#[command(version, about, long_about = None)]
#[command(author = "Smart Bridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.toml", env = "BRIDGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync changed UCS clients into the FHIR server
    Sync(commands::sync::SyncArgs),

    /// Sync changed FHIR Patients back into UCS
    ReverseSync(commands::reverse_sync::ReverseSyncArgs),

    /// Show the persisted sync cursor
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
