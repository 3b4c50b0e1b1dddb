//! Domain error types
//!
//! This module defines the error hierarchy for the bridge. Client errors never
//! expose third-party HTTP types; transformation errors always carry a named code.

use std::fmt;
use thiserror::Error;

/// Main bridge error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// UCS client registry errors
    #[error("UCS error: {0}")]
    Ucs(#[from] UcsError),

    /// FHIR server errors
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// Record transformation errors
    #[error("Transformation error: {0}")]
    Transformation(#[from] TransformError),

    /// Worker pool errors
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// State management errors (cursor, version tracking)
    #[error("State management error: {0}")]
    State(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Marker error produced when a circuit breaker rejects a call.
///
/// Client error types convert it into their own `CircuitOpen` variant so callers
/// see the same error type whichever resilience layer tripped.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{name}' is open")]
pub struct CircuitOpenError {
    /// Name of the breaker that rejected the call
    pub name: String,
}

/// Errors that can be classified as transient.
pub trait Retryable {
    /// Whether repeating the same call may succeed
    fn is_retryable(&self) -> bool;
}

/// UCS client registry errors
#[derive(Debug, Clone, Error)]
pub enum UcsError {
    /// Failed to connect to the registry
    #[error("Failed to connect to UCS: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Client record not found
    #[error("Client not found: {0}")]
    NotFound(String),

    /// Invalid response from the registry
    #[error("Invalid response from UCS: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Circuit breaker is open
    #[error("UCS unavailable: {0}")]
    CircuitOpen(String),
}

impl Retryable for UcsError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            UcsError::ConnectionFailed(_) | UcsError::ServerError { .. } | UcsError::Timeout(_)
        )
    }
}

impl From<CircuitOpenError> for UcsError {
    fn from(err: CircuitOpenError) -> Self {
        UcsError::CircuitOpen(err.to_string())
    }
}

/// FHIR server errors
#[derive(Debug, Clone, Error)]
pub enum FhirError {
    /// Failed to connect to the FHIR server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid response from server
    #[error("Invalid response from FHIR server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Circuit breaker is open
    #[error("FHIR server unavailable: {0}")]
    CircuitOpen(String),
}

impl Retryable for FhirError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            FhirError::ConnectionFailed(_) | FhirError::ServerError { .. } | FhirError::Timeout(_)
        )
    }
}

impl From<CircuitOpenError> for FhirError {
    fn from(err: CircuitOpenError) -> Self {
        FhirError::CircuitOpen(err.to_string())
    }
}

/// Named transformation failure codes, shared by both transform directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformErrorCode {
    MissingIdentifier,
    MissingOpensrpId,
    MissingDemographics,
    MissingName,
    MissingGivenName,
    MissingFamilyName,
    MissingGender,
    UnsupportedResourceType,
    ValidationFailed,
    TransformationError,
}

impl TransformErrorCode {
    /// Wire form of the code, e.g. `MISSING_OPENSRP_ID`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "MISSING_IDENTIFIER",
            Self::MissingOpensrpId => "MISSING_OPENSRP_ID",
            Self::MissingDemographics => "MISSING_DEMOGRAPHICS",
            Self::MissingName => "MISSING_NAME",
            Self::MissingGivenName => "MISSING_GIVEN_NAME",
            Self::MissingFamilyName => "MISSING_FAMILY_NAME",
            Self::MissingGender => "MISSING_GENDER",
            Self::UnsupportedResourceType => "UNSUPPORTED_RESOURCE_TYPE",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::TransformationError => "TRANSFORMATION_ERROR",
        }
    }
}

impl fmt::Display for TransformErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed transformation of a single record or resource.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct TransformError {
    /// Named failure code
    pub code: TransformErrorCode,

    /// Human-readable description
    pub message: String,

    /// Description of the underlying cause, when the failure wraps another error
    pub cause: Option<String>,
}

impl TransformError {
    /// Creates a new transformation error
    pub fn new(code: TransformErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps an unexpected failure as `TRANSFORMATION_ERROR`, keeping its cause
    pub fn wrap(message: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            code: TransformErrorCode::TransformationError,
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }
}

/// Worker pool errors
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The pool queue is full and the overflow policy rejects new work
    #[error("Worker pool '{0}' is saturated")]
    Saturated(String),

    /// The task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_ucs_error_conversion() {
        let ucs_err = UcsError::ConnectionFailed("Network error".to_string());
        let err: BridgeError = ucs_err.into();
        assert!(matches!(err, BridgeError::Ucs(_)));
    }

    #[test]
    fn test_circuit_open_translates_to_client_error() {
        let open = CircuitOpenError {
            name: "ucs".to_string(),
        };
        let ucs: UcsError = open.clone().into();
        let fhir: FhirError = open.into();
        assert!(matches!(ucs, UcsError::CircuitOpen(_)));
        assert!(matches!(fhir, FhirError::CircuitOpen(_)));
        assert!(!ucs.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(UcsError::Timeout("5s".to_string()).is_retryable());
        assert!(UcsError::ServerError {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!UcsError::NotFound("OPENSRP-1".to_string()).is_retryable());
        assert!(!FhirError::ClientError {
            status: 400,
            message: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_transform_error_display_includes_code() {
        let err = TransformError::new(TransformErrorCode::MissingGender, "Gender is required");
        assert_eq!(err.to_string(), "[MISSING_GENDER] Gender is required");
    }

    #[test]
    fn test_transform_error_wrap_keeps_cause() {
        let err = TransformError::wrap("Invalid birth date", "premature end of input");
        assert_eq!(err.code, TransformErrorCode::TransformationError);
        assert_eq!(err.cause.as_deref(), Some("premature end of input"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: BridgeError = toml_err.into();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
