//! Structured logging setup using tracing
//!
//! Console output is always on. With `logging.local_enabled` a JSON copy of
//! every event goes to a rolling file under `logging.local_path`.

use crate::config::LoggingConfig;
use crate::domain::{BridgeError, Result};
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log file name prefix inside `logging.local_path`
const LOG_FILE_PREFIX: &str = "smart-bridge.log";

/// HTTP stack crates that are only interesting at warn and above
const QUIET_TARGETS: &[&str] = &["reqwest", "hyper", "rustls", "mio"];

/// Keeps the non-blocking file writer alive; drop it last so buffered events flush
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system based on configuration
///
/// `RUST_LOG` takes precedence over `log_level` when set.
///
/// # Example
///
/// ```no_run
/// use smart_bridge::logging::init_logging;
/// use smart_bridge::config::LoggingConfig;
///
/// let config = LoggingConfig::default();
/// let _guard = init_logging("info", &config).expect("Failed to initialize logging");
/// // Keep _guard alive for the duration of the program
/// ```
pub fn init_logging(log_level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let level = parse_log_level(log_level)?;
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_filter(filter())
        .boxed();

    let (file, file_guard) = if config.local_enabled {
        let path = Path::new(&config.local_path);
        std::fs::create_dir_all(path).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to create log directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let appender = RollingFileAppender::new(
            parse_rotation(&config.local_rotation),
            path,
            LOG_FILE_PREFIX,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(writer)
            .with_filter(filter())
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // A second init (e.g. in tests) keeps the first subscriber
    if tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }

    tracing::debug!(
        level = %level,
        file_logging = config.local_enabled,
        path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `smart_bridge=<level>` plus warn-level caps for the HTTP stack
fn default_directives(level: Level) -> String {
    let mut directives = vec![format!("smart_bridge={level}")];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    level.trim().parse::<Level>().map_err(|_| {
        BridgeError::Configuration(format!(
            "Invalid log level: {level}. Must be one of: trace, debug, info, warn, error"
        ))
    })
}
