//! Configuration management for the bridge.
//!
//! TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! The bridge reads a TOML file (default `bridge.toml`) with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BRIDGE_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`UcsConfig`] - UCS registry connection, retry and circuit breaker
//! - [`FhirConfig`] - FHIR server connection and authentication
//! - [`SyncConfig`] - Sync mode, page size and cursor location
//! - [`ExecutorConfig`] - Worker pools and batch timeout
//! - [`AuditConfig`] - Audit trail output
//! - [`LoggingConfig`] - Local log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [ucs]
//! base_url = "https://ucs.example.org/opensrp/rest"
//! username = "bridge"
//! password = "${BRIDGE_UCS_PASSWORD}"
//!
//! [fhir]
//! base_url = "https://fhir.example.org/fhir"
//! auth_type = "bearer"
//! token = "${BRIDGE_FHIR_TOKEN}"
//!
//! [sync]
//! mode = "incremental"
//! page_size = 100
//! ```
//!
//! ```rust,no_run
//! use smart_bridge::config::load_config;
//!
//! # fn example() {
//! match load_config("bridge.toml") {
//!     Ok(config) => println!("UCS at {}", config.ucs.base_url),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, AuditConfig, BridgeConfig, CircuitBreakerConfig, Environment, ExecutorConfig,
    FhirConfig, LoggingConfig, PoolConfig, RetryConfig, SyncConfig, UcsConfig,
};
pub use secret::{basic_auth_header, bearer_auth_header, secret_string, SecretString, SecretValue};
