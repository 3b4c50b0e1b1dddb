//! Audit trail of transformations and flow errors
//!
//! Audit calls are fire-and-forget: an audit sink that fails logs a warning
//! and the sync carries on.

use crate::config::AuditConfig;
use crate::domain::{BridgeError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Receives audit events from the pipelines
pub trait AuditLogger: Send + Sync {
    /// Records one record moving from `source_system` to `target_system`
    #[allow(clippy::too_many_arguments)]
    fn log_transformation(
        &self,
        source_system: &str,
        target_system: &str,
        operation: &str,
        source_id: &str,
        target_id: Option<&str>,
        success: bool,
        detail: &str,
    );

    /// Records a failed flow step
    fn log_error(&self, component: &str, operation: &str, code: &str, detail: &str, context: &str);
}

/// Builds the audit sink described by `config`
///
/// # Errors
///
/// Returns `BridgeError::Io` if the audit directory cannot be created.
pub fn audit_logger_from_config(config: &AuditConfig) -> Result<Arc<dyn AuditLogger>> {
    if config.enabled {
        let logger = FileAuditLogger::new(PathBuf::from(&config.path), config.json_format)?;
        Ok(Arc::new(logger))
    } else {
        Ok(Arc::new(TracingAuditLogger))
    }
}

/// Writes audit events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log_transformation(
        &self,
        source_system: &str,
        target_system: &str,
        operation: &str,
        source_id: &str,
        target_id: Option<&str>,
        success: bool,
        detail: &str,
    ) {
        tracing::info!(
            target: "smart_bridge::audit",
            source_system = source_system,
            target_system = target_system,
            operation = operation,
            source_id = source_id,
            target_id = ?target_id,
            success = success,
            detail = detail,
            "Transformation audited"
        );
    }

    fn log_error(&self, component: &str, operation: &str, code: &str, detail: &str, context: &str) {
        tracing::warn!(
            target: "smart_bridge::audit",
            component = component,
            operation = operation,
            code = code,
            detail = detail,
            context = context,
            "Error audited"
        );
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
enum AuditEntry {
    Transformation {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        source_system: String,
        target_system: String,
        operation: String,
        /// SHA-256 of the source identifier (never log plaintext identifiers)
        source_id_hash: String,
        target_id_hash: Option<String>,
        success: bool,
        detail: String,
    },
    Error {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        component: String,
        operation: String,
        code: String,
        detail: String,
        context_hash: String,
    },
}

/// Appends audit events to a file as JSON lines or plain text
pub struct FileAuditLogger {
    log_path: PathBuf,
    json_format: bool,
    write_lock: Mutex<()>,
}

impl FileAuditLogger {
    /// Creates the logger, creating the parent directory if needed
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Io` if the directory cannot be created.
    pub fn new(log_path: PathBuf, json_format: bool) -> Result<Self> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Io(format!(
                    "Failed to create audit log directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        Ok(Self {
            log_path,
            json_format,
            write_lock: Mutex::new(()),
        })
    }

    fn hash_identifier(value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn format_line(&self, entry: &AuditEntry) -> std::result::Result<String, serde_json::Error> {
        if self.json_format {
            return serde_json::to_string(entry);
        }
        Ok(match entry {
            AuditEntry::Transformation {
                timestamp,
                source_system,
                target_system,
                operation,
                source_id_hash,
                success,
                detail,
                ..
            } => format!(
                "[{}] TRANSFORMATION {} -> {} | {} | source: {} | success: {} | {}",
                timestamp.to_rfc3339(),
                source_system,
                target_system,
                operation,
                source_id_hash,
                success,
                detail
            ),
            AuditEntry::Error {
                timestamp,
                component,
                operation,
                code,
                detail,
                context_hash,
                ..
            } => format!(
                "[{}] ERROR {} | {} | {} | context: {} | {}",
                timestamp.to_rfc3339(),
                component,
                operation,
                code,
                context_hash,
                detail
            ),
        })
    }

    fn write_entry(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_write(entry) {
            tracing::warn!(
                path = %self.log_path.display(),
                error = %e,
                "Failed to write audit entry"
            );
        }
    }

    fn try_write(&self, entry: &AuditEntry) -> std::result::Result<(), String> {
        let line = self.format_line(entry).map_err(|e| e.to_string())?;
        // A poisoned lock only means another writer panicked mid-line
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| e.to_string())?;
        writeln!(file, "{line}").map_err(|e| e.to_string())
    }
}

impl AuditLogger for FileAuditLogger {
    fn log_transformation(
        &self,
        source_system: &str,
        target_system: &str,
        operation: &str,
        source_id: &str,
        target_id: Option<&str>,
        success: bool,
        detail: &str,
    ) {
        self.write_entry(&AuditEntry::Transformation {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_system: source_system.to_string(),
            target_system: target_system.to_string(),
            operation: operation.to_string(),
            source_id_hash: Self::hash_identifier(source_id),
            target_id_hash: target_id.map(Self::hash_identifier),
            success,
            detail: detail.to_string(),
        });
    }

    fn log_error(&self, component: &str, operation: &str, code: &str, detail: &str, context: &str) {
        self.write_entry(&AuditEntry::Error {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: operation.to_string(),
            code: code.to_string(),
            detail: detail.to_string(),
            context_hash: Self::hash_identifier(context),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_hash_identifier_is_stable() {
        let a = FileAuditLogger::hash_identifier("OPENSRP-1");
        assert_eq!(a, FileAuditLogger::hash_identifier("OPENSRP-1"));
        assert_ne!(a, FileAuditLogger::hash_identifier("OPENSRP-2"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_json_lines_never_contain_plain_identifiers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.log");
        let logger = FileAuditLogger::new(path.clone(), true).unwrap();

        logger.log_transformation(
            "FHIR",
            "UCS",
            "CREATE",
            "patient-123",
            Some("OPENSRP-1"),
            true,
            "stored",
        );
        logger.log_error(
            "ReverseSyncOrchestrator",
            "STORE",
            "UCS_STORAGE_FAILED",
            "registry down",
            "patient-123",
        );

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "TRANSFORMATION");
        assert_eq!(lines[1]["code"], "UCS_STORAGE_FAILED");
        assert!(!content.contains("patient-123"));
        assert!(!content.contains("OPENSRP-1"));
    }

    #[test]
    fn test_plain_text_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let logger = FileAuditLogger::new(path.clone(), false).unwrap();

        logger.log_transformation("UCS", "FHIR", "UPDATE", "OPENSRP-9", None, false, "boom");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("TRANSFORMATION UCS -> FHIR | UPDATE"));
        assert!(content.contains("success: false"));
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending
        let logger = FileAuditLogger::new(dir.path().to_path_buf(), true).unwrap();
        logger.log_error("c", "op", "CODE", "detail", "ctx");
    }
}
