//! CLI command implementations
//!
//! This module contains all CLI command implementations and the wiring of
//! clients shared between them.

pub mod reverse_sync;
pub mod status;
pub mod sync;
pub mod validate;

use crate::adapters::fhir::{FhirClientApi, HttpFhirClient};
use crate::adapters::ucs::{HttpUcsClient, UcsClientApi};
use crate::config::BridgeConfig;
use crate::core::resilience::{CircuitBreaker, ResilientFhirClient, ResilientUcsClient, RetryPolicy};
use crate::domain::Result;
use std::sync::Arc;

/// Exit code: completed with record failures
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code: configuration error
pub const EXIT_CONFIG: i32 = 2;
/// Exit code: connection error
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code: fatal error
pub const EXIT_FATAL: i32 = 5;

/// UCS client behind circuit breaker and retry
pub(crate) fn build_ucs_client(config: &BridgeConfig) -> Result<Arc<dyn UcsClientApi>> {
    let http = HttpUcsClient::new(&config.ucs)?;
    Ok(Arc::new(ResilientUcsClient::new(
        Arc::new(http),
        CircuitBreaker::from_config("ucs", &config.ucs.circuit_breaker),
        RetryPolicy::from_config(&config.ucs.retry),
    )))
}

/// FHIR client behind circuit breaker and retry
pub(crate) fn build_fhir_client(config: &BridgeConfig) -> Result<Arc<dyn FhirClientApi>> {
    let http = HttpFhirClient::new(&config.fhir)?;
    Ok(Arc::new(ResilientFhirClient::new(
        Arc::new(http),
        CircuitBreaker::from_config("fhir", &config.fhir.circuit_breaker),
        RetryPolicy::from_config(&config.fhir.retry),
    )))
}
