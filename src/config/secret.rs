//! Credential handling for registry and FHIR server secrets
//!
//! Passwords and bearer tokens are wrapped in [`secrecy::Secret`], which zeroes
//! memory on drop and redacts the value from `Debug` output. Credentials only
//! reach the wire through [`basic_auth_header`] and [`bearer_auth_header`].
//!
//! # Example
//!
//! ```rust
//! use smart_bridge::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("bearer-token".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "bearer-token");
//! assert!(!format!("{token:?}").contains("bearer-token"));
//! ```

use base64::{engine::general_purpose, Engine as _};
use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A password or token held in zeroizing, redacted storage
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// `Basic base64(username:password)`
pub fn basic_auth_header(username: &str, password: &SecretString) -> String {
    let credentials = format!("{}:{}", username, password.expose_secret().as_ref());
    format!("Basic {}", general_purpose::STANDARD.encode(credentials.as_bytes()))
}

/// `Bearer <token>`
pub fn bearer_auth_header(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret().as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_password_is_redacted_in_config_debug() {
        let mut ucs = crate::config::UcsConfig::default();
        ucs.username = Some("bridge".to_string());
        ucs.password = Some(secret_string("registry-password".to_string()));

        let rendered = format!("{ucs:?}");
        assert!(!rendered.contains("registry-password"));
        assert_eq!(
            ucs.password.as_ref().map(|p| p.expose_secret().as_ref()),
            Some("registry-password")
        );
    }

    #[test]
    fn test_empty_secret() {
        assert!(secret_string(String::new()).expose_secret().is_empty());
    }

    #[test]
    fn test_auth_headers() {
        // base64("bridge:s3cret")
        let password = secret_string("s3cret".to_string());
        assert_eq!(
            basic_auth_header("bridge", &password),
            "Basic YnJpZGdlOnMzY3JldA=="
        );
        assert_eq!(
            bearer_auth_header(&secret_string("tok-123".to_string())),
            "Bearer tok-123"
        );
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Credentials {
            token: SecretString,
        }

        let creds: Credentials = toml::from_str("token = \"abc123\"").unwrap();
        assert_eq!(creds.token.expose_secret(), "abc123");
    }
}
