//! Domain models and types for the bridge.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **The UCS client record** ([`UcsClient`]) and its sub-structures
//! - **The FHIR Patient resource** ([`FhirPatient`]) and generic resources ([`FhirResource`])
//! - **Strongly-typed identifiers** ([`ResourceId`], [`ServerVersion`])
//! - **Error types** ([`BridgeError`], [`UcsError`], [`FhirError`], [`TransformError`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use smart_bridge::domain::{FhirResource, ResourceKind};
//! use serde_json::json;
//!
//! let resource = FhirResource::from_value(json!({
//!     "resourceType": "Patient",
//!     "id": "p-1",
//!     "gender": "male"
//! })).unwrap();
//! assert_eq!(resource.kind(), Some(ResourceKind::Patient));
//! ```

pub mod client;
pub mod errors;
pub mod ids;
pub mod patient;
pub mod resource;
pub mod result;

// Re-export commonly used types for convenience
pub use client::{
    ClientMetadata, ClinicalData, Demographics, Identifiers, LegacyGender, UcsAddress, UcsClient,
};
pub use errors::{
    BridgeError, CircuitOpenError, FhirError, PoolError, Retryable, TransformError,
    TransformErrorCode, UcsError,
};
pub use ids::{ResourceId, ServerVersion};
pub use patient::{
    Address, AdministrativeGender, Coding, FhirPatient, HumanName, Identifier, Meta,
    NATIONAL_ID_SYSTEM, OPENSRP_ID_SYSTEM, PROVENANCE_INGESTION, PROVENANCE_TAG_SYSTEM,
    PROVENANCE_UCS,
};
pub use resource::{FhirResource, OperationKind, OtherResource, ResourceKind, TransformedResource};
pub use result::Result;
