//! Domain identifier types with validation
//!
//! Newtype wrappers keep FHIR resource ids and UCS server-version cursors from
//! being mixed up with arbitrary strings and integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR resource identifier newtype wrapper
///
/// The logical id of a resource on the FHIR server; the key of both the version
/// tracking map and the in-flight map of the reverse sync orchestrator.
///
/// # Examples
///
/// ```
/// use smart_bridge::domain::ids::ResourceId;
/// use std::str::FromStr;
///
/// let id = ResourceId::from_str("patient-123").unwrap();
/// assert_eq!(id.as_str(), "patient-123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a new ResourceId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(ResourceId)` if the id is non-blank, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Resource ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the resource id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Server version cursor of the UCS change feed
///
/// A monotonically increasing marker; never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ServerVersion(i64);

impl ServerVersion {
    /// The start of the feed
    pub const ZERO: ServerVersion = ServerVersion(0);

    /// Creates a new cursor value
    pub fn new(value: i64) -> Result<Self, String> {
        if value < 0 {
            return Err(format!("Server version cannot be negative, got {value}"));
        }
        Ok(Self(value))
    }

    /// Returns the raw value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("Invalid server version '{}': {}", s.trim(), e))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_valid() {
        let id = ResourceId::new("abc-1").unwrap();
        assert_eq!(id.as_str(), "abc-1");
        assert_eq!(id.to_string(), "abc-1");
    }

    #[test]
    fn test_resource_id_empty() {
        assert!(ResourceId::new("").is_err());
        assert!(ResourceId::new("   ").is_err());
    }

    #[test]
    fn test_server_version_parse() {
        assert_eq!(ServerVersion::from_str("42").unwrap().value(), 42);
        assert_eq!(ServerVersion::from_str(" 7\n").unwrap().value(), 7);
        assert!(ServerVersion::from_str("-1").is_err());
        assert!(ServerVersion::from_str("garbage").is_err());
    }

    #[test]
    fn test_server_version_ordering() {
        let a = ServerVersion::new(5).unwrap();
        let b = ServerVersion::new(9).unwrap();
        assert!(a < b);
        assert_eq!(a.max(b), b);
        assert_eq!(ServerVersion::default(), ServerVersion::ZERO);
    }
}
