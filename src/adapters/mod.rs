//! External system integrations.
//!
//! - [`ucs`] - UCS legacy clinic registry (OpenSRP REST API)
//! - [`fhir`] - FHIR R4 server
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind async traits
//! ([`ucs::UcsClientApi`], [`fhir::FhirClientApi`]) so the pipelines can be
//! wrapped with resilience decorators and tested with in-memory fakes.
//! HTTP errors are converted to [`crate::domain::UcsError`] /
//! [`crate::domain::FhirError`] at this boundary.
//!
//! ```rust,no_run
//! use smart_bridge::adapters::fhir::{FhirClientApi, HttpFhirClient};
//! use smart_bridge::config::FhirConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpFhirClient::new(&FhirConfig::default())?;
//! let patient = client.get_patient("p-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod fhir;
pub mod ucs;

use crate::domain::{BridgeError, Result};
use url::Url;

/// Parses a configured base URL for building endpoint paths
pub(crate) fn parse_base_url(section: &str, base_url: &str) -> Result<Url> {
    Url::parse(base_url)
        .map_err(|e| BridgeError::Configuration(format!("Invalid {section}.base_url: {e}")))
}

/// Appends `segments` to `base`, percent-encoding each one
///
/// An id such as `A/1` stays a single path segment (`A%2F1`).
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Only fails for cannot-be-a-base URLs, which config validation rejects
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_each_segment() {
        let base = parse_base_url("ucs", "http://registry.local/opensrp/rest/").unwrap();
        assert_eq!(
            endpoint(&base, &["clients", "A/1?x#y"]).as_str(),
            "http://registry.local/opensrp/rest/clients/A%2F1%3Fx%23y"
        );
        assert_eq!(
            endpoint(&base, &["clients", "sync"]).path(),
            "/opensrp/rest/clients/sync"
        );
    }

    #[test]
    fn test_endpoint_on_bare_host() {
        let base = parse_base_url("fhir", "http://127.0.0.1:8090").unwrap();
        assert_eq!(endpoint(&base, &["Patient"]).as_str(), "http://127.0.0.1:8090/Patient");
        assert!(parse_base_url("fhir", "not a url").is_err());
    }
}
