// Smart Bridge - UCS/FHIR patient sync bridge
// Copyright (c) 2025 Smart Bridge Contributors
// Licensed under the MIT License

//! # Smart Bridge - UCS/FHIR patient sync
//!
//! Smart Bridge keeps patient demographics consistent between a legacy UCS
//! clinic registry (OpenSRP REST API) and a FHIR R4 server, in both
//! directions.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Forward sync**: paging the UCS change feed, transforming client records
//!   to FHIR Patients and ingesting them with create-or-update semantics
//! - **Reverse sync**: pushing FHIR Patient changes back to UCS through a
//!   state machine with conflict detection and loop prevention
//! - **Resilience**: retry with exponential backoff and per-endpoint circuit breakers
//! - **Concurrency**: bounded worker pools with named overflow policies
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (transform, executor, resilience, sync, reverse sync)
//! - [`adapters`] - External integrations (UCS, FHIR)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smart_bridge::core::transform::ForwardTransformer;
//! use smart_bridge::domain::UcsClient;
//!
//! # fn example(client: &UcsClient) -> Result<(), Box<dyn std::error::Error>> {
//! let transformed = ForwardTransformer::new().transform(client)?;
//! println!("Patient id: {:?}", transformed.resource.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Loop Prevention
//!
//! Resources written by the bridge carry a provenance tag. The reverse sync
//! skips any resource it has already processed at the same or a newer
//! `lastUpdated`, and any update carrying a UCS or ingestion tag, so a change
//! never echoes back to the system it came from.
//!
//! ## Error Handling
//!
//! Library code returns [`domain::BridgeError`]; adapter and transformation
//! failures keep their own typed errors and convert with `?`:
//!
//! ```rust,no_run
//! use smart_bridge::domain::BridgeError;
//!
//! fn example() -> Result<(), BridgeError> {
//!     let config = smart_bridge::config::load_config("bridge.toml")?;
//!     println!("FHIR server: {}", config.fhir.base_url);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
