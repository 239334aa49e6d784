//! # mcp-oauth-gate
//!
//! Bearer token verification and scope-based tool authorization for MCP
//! resource servers.
//!
//! An MCP server that sits behind an OAuth identity provider has to answer
//! two questions for every request:
//!
//! 1. **Who is calling?** [`TokenVerifier`] turns a raw bearer token into a
//!    verified [`AccessToken`] (subject, scopes, expiry), trying local JWT
//!    verification, RFC 7662 introspection and OIDC userinfo in that order,
//!    with a cache in front.
//! 2. **What may they do?** [`ScopeAuthorizer`] compares the token's scopes
//!    with the requirement each tool declared in the [`ScopeRegistry`], both
//!    when a tool is invoked and when the tool catalog is listed.
//!
//! The [`oauth::OAuthLayer`] tower middleware wires the first half into an
//! axum application and hands handlers a [`CallerContext`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcp_oauth_gate::{
//!     BoxError, CallerContext, ScopeAuthorizer, ScopeRegistry, TokenVerifier, VerifierConfig,
//! };
//! use mcp_oauth_gate::oauth::{OAuthLayer, ProtectedResourceMetadata, metadata_router};
//! use axum::{Router, routing::post};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let registry = Arc::new(ScopeRegistry::new());
//!     registry.declare_requirement("notes_create_note", ["notes:write"]);
//!     let authorizer = ScopeAuthorizer::new(registry.clone());
//!
//!     let config = VerifierConfig::from_env()?;
//!     let verifier = Arc::new(TokenVerifier::from_config(&config)?);
//!     let metadata = ProtectedResourceMetadata::from_catalog(
//!         config.resource.clone(),
//!         config.issuer.clone(),
//!         &registry,
//!     );
//!
//!     let app: Router = Router::new()
//!         .route(
//!             "/tools/notes_create_note",
//!             post(move |caller: CallerContext| async move {
//!                 match authorizer.enforce_tool("notes_create_note", caller.token()) {
//!                     Ok(()) => "created".into_response(),
//!                     Err(e) => e.into_response(),
//!                 }
//!             }),
//!         )
//!         .layer(OAuthLayer::new(verifier, metadata.clone()))
//!         .merge(metadata_router(metadata));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! # use axum::response::IntoResponse;
//! ```
//!
//! ## Failure semantics
//!
//! [`TokenVerifier::verify`] never returns an error. Every failure (network,
//! signature, expiry, inactive token) is logged with its reason and collapses
//! to `None`, which the middleware turns into a uniform `401`. Scope failures
//! are `403` with `error="insufficient_scope"` and the missing scopes, so a
//! client can request a token with more scopes and retry.

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod oauth;
pub mod registry;
pub mod secret;

// Re-exports
pub use config::{ScopeInference, VerifierConfig};
pub use context::CallerContext;
pub use error::{BoxError, Error, Result};
pub use filter::{Filterable, ToolDescriptor};
pub use oauth::{
    AccessToken, OAuthError, ScopeAuthorizer, ScopeCatalog, ScopeRequirement, TokenVerifier,
    VerificationStrategy, check_scopes,
};
pub use registry::ScopeRegistry;
pub use secret::SecretString;
