//! Verifier configuration.
//!
//! [`VerifierConfig`] describes which identity provider endpoints are
//! available. It can be built fluently, deserialized with serde, or read from
//! `OAUTH_*` environment variables via [`VerifierConfig::from_env`].
//!
//! ```rust
//! use std::time::Duration;
//! use mcp_oauth_gate::VerifierConfig;
//!
//! let config = VerifierConfig::new("https://idp.example.com")
//!     .resource("https://mcp.example.com")
//!     .jwks_uri("https://idp.example.com/jwks")
//!     .userinfo_uri("https://idp.example.com/userinfo")
//!     .with_cache_ttl(Duration::from_secs(600));
//!
//! assert_eq!(config.cache_ttl(), Duration::from_secs(600));
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::secret::SecretString;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

/// How the userinfo strategy derives scopes when the provider omits an
/// explicit `scope` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeInference {
    /// Infer scopes from which claims are present (`email` grants "email",
    /// name/picture claims grant "profile", `roles`/`groups` values are
    /// granted verbatim). This is a heuristic and may over- or under-grant.
    #[default]
    ClaimPresence,
    /// Only grant "openid" when no explicit `scope` claim is returned.
    Disabled,
}

impl FromStr for ScopeInference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim_presence" | "claims" | "infer" => Ok(ScopeInference::ClaimPresence),
            "disabled" | "off" | "none" => Ok(ScopeInference::Disabled),
            other => Err(Error::config(format!("unknown scope inference policy: {other}"))),
        }
    }
}

/// Construction-time settings for [`TokenVerifier`](crate::oauth::TokenVerifier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Expected `iss` claim. Issuer validation is skipped when unset.
    #[serde(default)]
    pub issuer: Option<String>,

    /// This resource server's identifier (RFC 9728 `resource`).
    #[serde(default)]
    pub resource: String,

    #[serde(default)]
    pub jwks_uri: Option<String>,

    #[serde(default)]
    pub introspection_uri: Option<String>,

    /// Client id used for introspection and accepted as a token audience.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<SecretString>,

    #[serde(default)]
    pub userinfo_uri: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Per-request timeout applied to every identity provider call.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Extra audiences accepted in addition to `resource` and `client_id`.
    #[serde(default)]
    pub accepted_audiences: Vec<String>,

    #[serde(default)]
    pub scope_inference: ScopeInference,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            resource: String::new(),
            jwks_uri: None,
            introspection_uri: None,
            client_id: None,
            client_secret: None,
            userinfo_uri: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            accepted_audiences: Vec::new(),
            scope_inference: ScopeInference::default(),
        }
    }
}

impl VerifierConfig {
    /// Create a configuration for the given issuer with default timings.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: Some(issuer.into()),
            ..Self::default()
        }
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Configure RFC 7662 introspection with client credentials.
    pub fn introspection(
        mut self,
        uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.introspection_uri = Some(uri.into());
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::with_label(
            client_secret.into(),
            "CLIENT_SECRET",
        ));
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn userinfo_uri(mut self, uri: impl Into<String>) -> Self {
        self.userinfo_uri = Some(uri.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = timeout.as_secs();
        self
    }

    pub fn accepted_audience(mut self, audience: impl Into<String>) -> Self {
        self.accepted_audiences.push(audience.into());
        self
    }

    pub fn scope_inference(mut self, policy: ScopeInference) -> Self {
        self.scope_inference = policy;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Audiences a JWT may carry: the resource itself, the backend client,
    /// and anything listed in `accepted_audiences`. Order is preserved and
    /// duplicates removed.
    pub fn audiences(&self) -> Vec<String> {
        let mut audiences: Vec<String> = Vec::new();
        let candidates = std::iter::once(self.resource.as_str())
            .chain(self.client_id.as_deref())
            .chain(self.accepted_audiences.iter().map(String::as_str));
        for audience in candidates {
            let audience = audience.trim();
            if !audience.is_empty() && !audiences.iter().any(|a| a == audience) {
                audiences.push(audience.to_string());
            }
        }
        audiences
    }

    /// Returns `(uri, client_id, client_secret)` when introspection is fully
    /// configured. Any missing or blank piece disables introspection.
    pub fn introspection_credentials(&self) -> Option<(&str, &str, &SecretString)> {
        let uri = non_blank(self.introspection_uri.as_deref())?;
        let client_id = non_blank(self.client_id.as_deref())?;
        let secret = self.client_secret.as_ref().filter(|s| !s.is_empty())?;
        Some((uri, client_id, secret))
    }

    /// True when an introspection endpoint is set but credentials are not.
    pub fn introspection_partially_configured(&self) -> bool {
        non_blank(self.introspection_uri.as_deref()).is_some()
            && self.introspection_credentials().is_none()
    }

    /// Reject settings that cannot produce a working verifier.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(Error::config("cache_ttl_secs must be greater than zero"));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::config("http_timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Read configuration from `OAUTH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_secs = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::config(format!("{key} must be a whole number of seconds"))),
                None => Ok(default),
            }
        };

        let config = Self {
            issuer: get("OAUTH_ISSUER"),
            resource: get("OAUTH_RESOURCE").unwrap_or_default(),
            jwks_uri: get("OAUTH_JWKS_URI"),
            introspection_uri: get("OAUTH_INTROSPECTION_URI"),
            client_id: get("OAUTH_CLIENT_ID"),
            client_secret: get("OAUTH_CLIENT_SECRET")
                .map(|s| SecretString::with_label(s, "CLIENT_SECRET")),
            userinfo_uri: get("OAUTH_USERINFO_URI"),
            cache_ttl_secs: parse_secs("OAUTH_CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?,
            http_timeout_secs: parse_secs("OAUTH_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT_SECS)?,
            accepted_audiences: get("OAUTH_ACCEPTED_AUDIENCES")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            scope_inference: match get("OAUTH_SCOPE_INFERENCE") {
                Some(raw) => raw.parse()?,
                None => ScopeInference::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
