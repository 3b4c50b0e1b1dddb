//! Resilience primitives wrapping every outbound call
//!
//! - [`CircuitBreaker`] - lock-free CLOSED/OPEN/HALF_OPEN breaker
//! - [`RetryPolicy`] - exponential backoff with optional jitter
//! - [`ResilientUcsClient`], [`ResilientFhirClient`] - client decorators
//!
//! ```rust,no_run
//! use smart_bridge::adapters::ucs::HttpUcsClient;
//! use smart_bridge::config::UcsConfig;
//! use smart_bridge::core::resilience::{CircuitBreaker, ResilientUcsClient, RetryPolicy};
//! use std::sync::Arc;
//!
//! # fn example() -> smart_bridge::domain::Result<()> {
//! let config = UcsConfig::default();
//! let client = ResilientUcsClient::new(
//!     Arc::new(HttpUcsClient::new(&config)?),
//!     CircuitBreaker::from_config("ucs", &config.circuit_breaker),
//!     RetryPolicy::from_config(&config.retry),
//! );
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod clients;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use clients::{ResilientFhirClient, ResilientUcsClient};
pub use retry::RetryPolicy;
