//! FHIR R4 server integration
//!
//! - [`FhirClientApi`] - operations the pipelines use
//! - [`HttpFhirClient`] - REST implementation
//! - [`Bundle`] - search result paging and input file parsing

pub mod bundle;
pub mod client;

pub use bundle::{resources_from_json, Bundle, BundleEntry, BundleLink};
pub use client::{FhirClientApi, HttpFhirClient};
