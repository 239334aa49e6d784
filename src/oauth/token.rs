//! Verified access tokens and raw JWT claims.
//!
//! [`AccessToken`] is the only outcome of a successful verification.
//! [`TokenClaims`] is the wire shape of a JWT payload before it has been
//! turned into an `AccessToken`.

use std::collections::{BTreeSet, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::secret::SecretString;

/// Current unix time in fractional seconds.
pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Deserialize an optional NumericDate, accepting fractional seconds.
///
/// Fractions are truncated; negative and non-finite values are treated as absent.
pub(crate) fn numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64))
}

/// Split a space-delimited OAuth scope string.
pub fn split_scopes(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(String::from).collect()
}

/// The verified identity and grants behind a bearer token.
///
/// An `AccessToken` always has a non-empty subject. It is immutable once
/// created; a fresh one is derived when the cached copy expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: SecretString,
    client_id: String,
    scopes: BTreeSet<String>,
    expires_at: u64,
    subject: String,
}

impl AccessToken {
    /// Build an access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Claims`] if `subject` is empty or whitespace.
    pub fn new(
        token: impl Into<String>,
        subject: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
        expires_at: u64,
    ) -> Result<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(Error::claims("subject must not be empty"));
        }
        Ok(Self {
            token: SecretString::with_label(token, "BEARER_TOKEN"),
            client_id: String::new(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            expires_at,
            subject,
        })
    }

    /// Set the OAuth client the token was issued to.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// The raw bearer token.
    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Expiry as unix seconds.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_expired(&self) -> bool {
        unix_now() >= self.expires_at as f64
    }
}

/// Audience claim value, which can be a single string or array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenAudience {
    Single(String),
    Multiple(Vec<String>),
}

impl TokenAudience {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            TokenAudience::Single(s) => s == value,
            TokenAudience::Multiple(v) => v.iter().any(|s| s == value),
        }
    }

    /// True if any audience in the claim is in `accepted`.
    pub fn intersects(&self, accepted: &[String]) -> bool {
        accepted.iter().any(|a| self.contains(a))
    }
}

/// Claims carried in a JWT access token payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<TokenAudience>,

    /// Expiration time (unix seconds).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<u64>,

    /// Issued-at time (unix seconds).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<u64>,

    /// Space-delimited scope string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Authorized party; some providers put the client id here instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    pub fn scopes(&self) -> BTreeSet<String> {
        split_scopes(self.scope.as_deref().unwrap_or(""))
    }

    /// The client the token was issued to, preferring `client_id` over `azp`.
    pub fn client(&self) -> &str {
        self.client_id
            .as_deref()
            .or(self.azp.as_deref())
            .unwrap_or("")
    }
}
