//! Protected Resource Metadata (RFC 9728 Section 3).
//!
//! Defines the metadata document served at `/.well-known/oauth-protected-resource`
//! so clients can discover the authorization server and the scopes to request.

use axum::Router;
use axum::routing::get;
use serde::{Deserialize, Serialize};

use super::scope::ScopeCatalog;
use crate::registry::ScopeRegistry;

/// Protected Resource Metadata per RFC 9728 Section 3.
///
/// # Example
///
/// ```rust
/// use mcp_oauth_gate::oauth::ProtectedResourceMetadata;
///
/// let metadata = ProtectedResourceMetadata::new("https://mcp.example.com")
///     .authorization_server("https://auth.example.com")
///     .scope("notes:read")
///     .scope("notes:write")
///     .resource_documentation("https://docs.example.com/mcp");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource server's identifier URL.
    pub resource: String,

    /// Authorization server issuer URLs that can issue tokens for this resource.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization_servers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Defaults to `["header"]`.
    #[serde(default = "default_bearer_methods")]
    pub bearer_methods_supported: Vec<String>,

    /// JWS algorithms the resource accepts on access tokens.
    #[serde(default = "default_signing_algs")]
    pub resource_signing_alg_values_supported: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

fn default_bearer_methods() -> Vec<String> {
    vec!["header".to_string()]
}

fn default_signing_algs() -> Vec<String> {
    vec!["RS256".to_string()]
}

impl ProtectedResourceMetadata {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            authorization_servers: Vec::new(),
            scopes_supported: Vec::new(),
            bearer_methods_supported: default_bearer_methods(),
            resource_signing_alg_values_supported: default_signing_algs(),
            resource_documentation: None,
        }
    }

    /// Build the document from every scope the registry can ask for.
    ///
    /// `scopes_supported` is [`ScopeCatalog::discover_all`], so it always
    /// includes the baseline OIDC scopes.
    pub fn from_catalog(
        resource: impl Into<String>,
        authorization_servers: impl IntoIterator<Item = impl Into<String>>,
        registry: &ScopeRegistry,
    ) -> Self {
        let mut metadata = Self::new(resource);
        metadata.authorization_servers = authorization_servers.into_iter().map(Into::into).collect();
        metadata.scopes_supported = ScopeCatalog::discover_all(registry);
        metadata
    }

    /// Add an authorization server issuer URL.
    pub fn authorization_server(mut self, issuer_url: impl Into<String>) -> Self {
        self.authorization_servers.push(issuer_url.into());
        self
    }

    /// Add a supported scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes_supported.contains(&scope) {
            self.scopes_supported.push(scope);
        }
        self
    }

    pub fn resource_documentation(mut self, url: impl Into<String>) -> Self {
        self.resource_documentation = Some(url.into());
        self
    }

    pub fn bearer_methods(mut self, methods: Vec<String>) -> Self {
        self.bearer_methods_supported = methods;
        self
    }

    /// The well-known path the metadata is served at.
    pub fn well_known_path() -> &'static str {
        "/.well-known/oauth-protected-resource"
    }

    /// Absolute URL of the metadata document, for `WWW-Authenticate`.
    pub fn metadata_url(&self) -> String {
        format!(
            "{}{}",
            self.resource.trim_end_matches('/'),
            Self::well_known_path()
        )
    }
}

/// A router serving `metadata` at the well-known path.
///
/// Merge it into the application router; the path is always public under
/// [`OAuthLayer`](super::OAuthLayer).
pub fn metadata_router(metadata: ProtectedResourceMetadata) -> Router {
    Router::new().route(
        ProtectedResourceMetadata::well_known_path(),
        get(move || {
            let metadata = metadata.clone();
            async move { axum::Json(metadata) }
        }),
    )
}
