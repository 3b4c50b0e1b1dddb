//! Configuration schema types
//!
//! This module defines the configuration structure for the bridge.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main bridge configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// UCS client registry connection
    pub ucs: UcsConfig,

    /// FHIR server connection
    pub fhir: FhirConfig,

    /// Bulk/incremental sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Worker pools and batch timeout
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.ucs.validate(&self.environment)?;
        self.fhir.validate(&self.environment)?;
        self.sync.validate()?;
        self.executor.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (transform and log, but never write to either system)
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add up to 10% random jitter to each delay
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    fn validate(&self, section: &str) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err(format!("{section}.retry.max_retries must be >= 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "{section}.retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "{section}.retry.initial_delay_ms must not exceed max_delay_ms"
            ));
        }
        Ok(())
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds to stay open before allowing a probe call
    #[serde(default = "default_open_timeout_seconds")]
    pub open_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_seconds: default_open_timeout_seconds(),
        }
    }
}

impl CircuitBreakerConfig {
    fn validate(&self, section: &str) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err(format!(
                "{section}.circuit_breaker.failure_threshold must be > 0"
            ));
        }
        if self.success_threshold == 0 {
            return Err(format!(
                "{section}.circuit_breaker.success_threshold must be > 0"
            ));
        }
        Ok(())
    }
}

/// UCS client registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UcsConfig {
    /// Base URL of the registry REST API
    pub base_url: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    ///
    /// **SECURITY WARNING**: only disable in development/testing environments.
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for UcsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/opensrp/rest".to_string(),
            username: None,
            password: None,
            timeout_seconds: default_timeout_seconds(),
            tls_verify: true,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl UcsConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        validate_base_url("ucs", &self.base_url)?;

        if self.username.is_some()
            && self
                .password
                .as_ref()
                .map(|s| s.expose_secret().is_empty())
                .unwrap_or(true)
        {
            return Err("ucs.password cannot be empty when ucs.username is set".to_string());
        }

        validate_tls("ucs", self.tls_verify, environment)?;
        self.retry.validate("ucs")?;
        self.circuit_breaker.validate("ucs")?;
        Ok(())
    }
}

/// FHIR server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    /// Base URL of the FHIR R4 endpoint (e.g. `https://hapi.example.org/fhir`)
    pub base_url: String,

    /// Authentication type (none, basic, bearer)
    #[serde(default = "default_fhir_auth_type")]
    pub auth_type: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Bearer token
    #[serde(default)]
    pub token: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090/fhir".to_string(),
            auth_type: default_fhir_auth_type(),
            username: None,
            password: None,
            token: None,
            timeout_seconds: default_timeout_seconds(),
            tls_verify: true,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl FhirConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        validate_base_url("fhir", &self.base_url)?;

        match self.auth_type.as_str() {
            "none" => {}
            "basic" => {
                if self.username.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
                    return Err(
                        "fhir.username cannot be empty when auth_type is 'basic'".to_string()
                    );
                }
                if self
                    .password
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(
                        "fhir.password cannot be empty when auth_type is 'basic'".to_string()
                    );
                }
            }
            "bearer" => {
                if self
                    .token
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err("fhir.token cannot be empty when auth_type is 'bearer'".to_string());
                }
            }
            other => {
                return Err(format!(
                    "Invalid fhir.auth_type '{other}'. Must be one of: none, basic, bearer"
                ))
            }
        }

        validate_tls("fhir", self.tls_verify, environment)?;
        self.retry.validate("fhir")?;
        self.circuit_breaker.validate("fhir")?;
        Ok(())
    }
}

/// Bulk/incremental sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Sync mode (incremental or bulk)
    #[serde(default = "default_sync_mode")]
    pub mode: String,

    /// Records requested per page of the UCS change feed
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// File holding the last processed server version
    #[serde(default = "default_cursor_path")]
    pub cursor_path: String,

    /// Source tag for records pulled from UCS
    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    /// Seconds between runs in watch mode (0 = run once)
    #[serde(default)]
    pub poll_interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: default_sync_mode(),
            page_size: default_page_size(),
            cursor_path: default_cursor_path(),
            source_tag: default_source_tag(),
            poll_interval_seconds: 0,
        }
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_modes = ["incremental", "bulk"];
        if !valid_modes.contains(&self.mode.as_str()) {
            return Err(format!(
                "Invalid sync.mode '{}'. Must be one of: {}",
                self.mode,
                valid_modes.join(", ")
            ));
        }

        if !(1..=5000).contains(&self.page_size) {
            return Err(format!(
                "sync.page_size must be between 1 and 5000, got {}",
                self.page_size
            ));
        }

        if self.cursor_path.trim().is_empty() {
            return Err("sync.cursor_path cannot be empty".to_string());
        }

        if self.source_tag.trim().is_empty() {
            return Err("sync.source_tag cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrently executing tasks
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Tasks allowed to wait for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What happens when the queue is full (run_inline, block, reject)
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            overflow_policy: default_overflow_policy(),
        }
    }
}

impl PoolConfig {
    fn validate(&self, section: &str) -> Result<(), String> {
        if self.workers == 0 || self.workers > 256 {
            return Err(format!(
                "executor.{section}.workers must be between 1 and 256, got {}",
                self.workers
            ));
        }

        let valid_policies = ["run_inline", "block", "reject"];
        if !valid_policies.contains(&self.overflow_policy.as_str()) {
            return Err(format!(
                "Invalid executor.{section}.overflow_policy '{}'. Must be one of: {}",
                self.overflow_policy,
                valid_policies.join(", ")
            ));
        }
        Ok(())
    }
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Time a batch transformation may take before outstanding tasks time out
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Pool running forward (UCS -> FHIR) transformations
    #[serde(default)]
    pub forward_pool: PoolConfig,

    /// Pool running reverse sync flows
    #[serde(default)]
    pub reverse_pool: PoolConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_timeout_ms: default_batch_timeout_ms(),
            forward_pool: PoolConfig::default(),
            reverse_pool: PoolConfig::default(),
        }
    }
}

impl ExecutorConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_timeout_ms == 0 {
            return Err("executor.batch_timeout_ms must be > 0".to_string());
        }
        self.forward_pool.validate("forward_pool")?;
        self.reverse_pool.validate("reverse_pool")?;
        Ok(())
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Write audit events to a file (otherwise they go to the tracing log)
    #[serde(default)]
    pub enabled: bool,

    /// Audit file path
    #[serde(default = "default_audit_path")]
    pub path: String,

    /// JSON lines instead of plain text
    #[serde(default = "default_true")]
    pub json_format: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_audit_path(),
            json_format: true,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.path.trim().is_empty() {
            return Err("audit.path cannot be empty when audit is enabled".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn validate_base_url(section: &str, base_url: &str) -> Result<(), String> {
    if base_url.is_empty() {
        return Err(format!("{section}.base_url cannot be empty"));
    }
    let parsed = url::Url::parse(base_url)
        .map_err(|e| format!("{section}.base_url is not a valid URL: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!(
            "{section}.base_url must start with http:// or https://"
        ));
    }
    Ok(())
}

// Disabling TLS verification exposes patient data to man-in-the-middle attacks
fn validate_tls(section: &str, tls_verify: bool, environment: &Environment) -> Result<(), String> {
    if *environment == Environment::Production && !tls_verify {
        return Err(format!(
            "TLS certificate verification cannot be disabled in production environments. \
            Set '{section}.tls_verify = true' or use environment = \"development\" or \"staging\"."
        ));
    }
    Ok(())
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout_seconds() -> u64 {
    30
}

fn default_fhir_auth_type() -> String {
    "none".to_string()
}

fn default_sync_mode() -> String {
    "incremental".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_cursor_path() -> String {
    "./state/ucs_server_version.txt".to_string()
}

fn default_source_tag() -> String {
    "UCS".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    100
}

fn default_overflow_policy() -> String {
    "run_inline".to_string()
}

fn default_batch_timeout_ms() -> u64 {
    30000
}

fn default_audit_path() -> String {
    "./logs/audit.log".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
