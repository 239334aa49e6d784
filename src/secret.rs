//! Redacted string handling for credentials.
//!
//! [`SecretString`] wraps raw bearer tokens and client secrets so they never
//! show up in `Debug`/`Display` output, and therefore never in `tracing`
//! fields or error messages.
//!
//! ```rust
//! use mcp_oauth_gate::SecretString;
//!
//! let secret = SecretString::with_label("s3cr3t", "CLIENT_SECRET");
//! assert_eq!(format!("{:?}", secret), "[CLIENT_SECRET]");
//! assert_eq!(secret.expose(), "s3cr3t");
//! ```

use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DEFAULT_LABEL: &str = "REDACTED";

/// A string whose contents are hidden from formatting.
#[derive(Clone)]
pub struct SecretString {
    value: String,
    label: Cow<'static, str>,
}

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            value: s.into(),
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }

    /// Create a secret that formats as `[LABEL]`.
    pub fn with_label(s: impl Into<String>, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            value: s.into(),
            label: label.into(),
        }
    }

    /// Expose the underlying value.
    ///
    /// Only call this at the point of use (an outgoing HTTP request, a
    /// cache key). Never pass the result to a log macro.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl Display for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let secret = SecretString::new("client-secret");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_custom_label() {
        let token = SecretString::with_label("eyJhbGciOi", "BEARER_TOKEN");
        assert_eq!(format!("{:?}", token), "[BEARER_TOKEN]");
        assert_eq!(token.label(), "BEARER_TOKEN");
        assert_eq!(token.expose(), "eyJhbGciOi");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert!(SecretString::new("   ").is_empty());
        assert!(SecretString::default().is_empty());
        assert!(!SecretString::new("x").is_empty());
    }

    #[test]
    fn test_equality_ignores_label() {
        let a = SecretString::new("same");
        let b = SecretString::with_label("same", "CLIENT_SECRET");
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let parsed: SecretString = serde_json::from_str("\"from-config\"").unwrap();
        assert_eq!(parsed.expose(), "from-config");
        assert_eq!(parsed.label(), "REDACTED");
    }

    #[test]
    fn test_struct_debug_hides_secret() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct Credentials {
            client_id: String,
            client_secret: SecretString,
        }

        let creds = Credentials {
            client_id: "mcp-server".to_string(),
            client_secret: SecretString::new("hunter2"),
        };
        let output = format!("{:?}", creds);
        assert!(output.contains("mcp-server"));
        assert!(!output.contains("hunter2"));
    }
}
