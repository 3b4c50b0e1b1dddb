//! Logging and observability
//!
//! Structured logging with:
//! - JSON-formatted file logs
//! - Configurable log levels
//! - Local file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use smart_bridge::logging::init_logging;
//! use smart_bridge::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Bridge started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a sync run
///
/// # Example
///
/// ```no_run
/// use smart_bridge::log_sync_start;
///
/// log_sync_start!("incremental", 1200);
/// ```
#[macro_export]
macro_rules! log_sync_start {
    ($mode:expr, $cursor:expr) => {
        tracing::info!(
            mode = %$mode,
            cursor = %$cursor,
            "Starting sync"
        );
    };
}

/// Log the completion of a sync run
///
/// # Example
///
/// ```no_run
/// use smart_bridge::log_sync_complete;
/// use std::time::Duration;
///
/// log_sync_complete!(42, 2, Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_sync_complete {
    ($succeeded:expr, $failed:expr, $duration:expr) => {
        tracing::info!(
            succeeded = $succeeded,
            failed = $failed,
            duration_ms = $duration.as_millis() as u64,
            "Sync completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use smart_bridge::log_error_with_context;
/// use smart_bridge::domain::BridgeError;
///
/// let error = BridgeError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use smart_bridge::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
