//! Reverse sync: externally changed FHIR resources into the UCS registry
//!
//! - [`ReverseSyncOrchestrator`] - per-resource state machine with in-flight deduplication
//! - [`ConflictDetector`] / [`ConflictResolver`] - replay and echo suppression
//! - [`VersionStore`] - last-synced version per resource id
//! - [`ReverseSyncResult`] - outcome with the visited state trace

pub mod conflict;
pub mod orchestrator;
pub mod result;
pub mod version_store;

pub use conflict::{ConflictDetector, ConflictResolver, Resolution};
pub use orchestrator::{ReverseSyncOrchestrator, ReverseSyncStats};
pub use result::{ConflictKind, FlowError, FlowErrorCode, FlowState, ReverseSyncResult, SyncStatus};
pub use version_store::{InMemoryVersionStore, ResourceVersion, VersionStore};
