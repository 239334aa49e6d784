//! OAuth 2.1 resource server support for MCP.
//!
//! The MCP server acts as a **resource server**: it verifies bearer tokens
//! issued by an external identity provider and decides, per caller, which
//! tools may be listed and invoked.
//!
//! # Architecture
//!
//! - **Verification** ([`TokenVerifier`]): a [`TokenCache`] in front of an
//!   ordered chain of [`VerificationStrategy`] implementations:
//!   [`JwtStrategy`] (signature check against the provider's JWKS),
//!   [`IntrospectionStrategy`] (RFC 7662) and [`UserinfoStrategy`] (OIDC
//!   userinfo). The first strategy that vouches for a token wins.
//!
//! - **Authorization** ([`ScopeAuthorizer`]): checks the verified token's
//!   scopes against the requirement declared for each tool in the
//!   [`ScopeRegistry`](crate::ScopeRegistry), on invocation and when the
//!   catalog is listed.
//!
//! - **Discovery** ([`ProtectedResourceMetadata`], [`ScopeCatalog`]): the
//!   RFC 9728 document served at `/.well-known/oauth-protected-resource`,
//!   advertising every scope the server may ask for.
//!
//! - **HTTP Middleware** ([`OAuthLayer`]/[`OAuthService`]): Tower middleware
//!   that extracts bearer tokens, verifies them, and injects a
//!   [`CallerContext`](crate::CallerContext) into request extensions.
//!
//! # Discovery Flow
//!
//! 1. Client requests an MCP endpoint without a token
//! 2. Server returns `401` with `WWW-Authenticate: Bearer resource_metadata="..."`
//! 3. Client fetches `/.well-known/oauth-protected-resource` to discover the
//!    authorization server and the supported scopes
//! 4. Client obtains a token and retries with `Authorization: Bearer <token>`
//! 5. A tool call the token's scopes do not cover returns `403` with
//!    `error="insufficient_scope"` and the missing scopes, so the client can
//!    request a token with more scopes

pub mod cache;
pub mod error;
pub mod introspection;
pub mod jwks;
pub mod jwt;
pub mod metadata;
pub mod middleware;
pub mod scope;
pub mod strategy;
pub mod token;
pub mod userinfo;
pub mod verifier;

// Re-exports
pub use cache::TokenCache;
pub use error::OAuthError;
pub use introspection::IntrospectionStrategy;
pub use jwks::JwksClient;
pub use jwt::{JwtStrategy, is_jwt_shaped};
pub use metadata::{ProtectedResourceMetadata, metadata_router};
pub use middleware::{OAuthLayer, OAuthService};
pub use scope::{BASELINE_SCOPES, ScopeAuthorizer, ScopeCatalog, ScopeRequirement, check_scopes};
pub use strategy::VerificationStrategy;
pub use token::{AccessToken, TokenAudience, TokenClaims, split_scopes};
pub use userinfo::{UserinfoStrategy, scopes_from_userinfo};
pub use verifier::TokenVerifier;
