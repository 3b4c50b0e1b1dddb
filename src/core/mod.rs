//! Core business logic of the bridge.
//!
//! # Modules
//!
//! - [`transform`] - Forward (UCS to FHIR) and reverse (FHIR to UCS) transformers and validators
//! - [`executor`] - Bounded worker pools and concurrent batch transformation
//! - [`resilience`] - Circuit breaker, retry policy and resilient client decorators
//! - [`reverse_sync`] - Reverse sync state machine with conflict detection
//! - [`sync`] - Bulk/incremental forward sync driven by the UCS change feed
//! - [`change_detection`] - Routing of FHIR changes to handlers
//! - [`audit`] - Audit trail of transformations and errors
//!
//! # Forward Workflow
//!
//! 1. **Load Cursor**: Read the persisted server version
//! 2. **Fetch**: Pull one page of the UCS change feed
//! 3. **Transform**: Map records to FHIR Patients on the forward pool
//! 4. **Ingest**: Create or update each Patient on the FHIR server
//! 5. **Checkpoint**: Persist the highest server version of the page
//!
//! # Example
//!
//! ```rust,no_run
//! use smart_bridge::adapters::ucs::HttpUcsClient;
//! use smart_bridge::adapters::fhir::HttpFhirClient;
//! use smart_bridge::config::load_config;
//! use smart_bridge::core::audit::TracingAuditLogger;
//! use smart_bridge::core::executor::{TransformationExecutor, WorkerPool};
//! use smart_bridge::core::sync::{FileCursorStore, ForwardIngestion, SyncDriver, SyncMode};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("bridge.toml")?;
//!
//! let pool = Arc::new(WorkerPool::from_config("forward", &config.executor.forward_pool)?);
//! let executor = Arc::new(TransformationExecutor::new(pool, Duration::from_secs(30)));
//! let ingestion = ForwardIngestion::new(
//!     Arc::new(HttpFhirClient::new(&config.fhir)?),
//!     Arc::new(TracingAuditLogger),
//!     false,
//! );
//! let driver = SyncDriver::new(
//!     Arc::new(HttpUcsClient::new(&config.ucs)?),
//!     executor,
//!     ingestion,
//!     Arc::new(FileCursorStore::new(&config.sync.cursor_path)),
//!     &config.sync,
//!     false,
//! );
//!
//! let summary = driver.run(SyncMode::Incremental).await?;
//! println!("Synced: {}", summary.successful);
//! println!("Failed: {}", summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod change_detection;
pub mod executor;
pub mod resilience;
pub mod reverse_sync;
pub mod sync;
pub mod transform;
