//! The verification strategy seam.
//!
//! A [`TokenVerifier`](super::TokenVerifier) holds an ordered list of
//! strategies and asks each one in turn until one produces an
//! [`AccessToken`]. Adding or reordering a verification method is a list
//! edit.

use async_trait::async_trait;

use super::token::AccessToken;

/// One way of turning a raw bearer token into an [`AccessToken`].
///
/// Implementations must not panic and must not surface errors: every
/// failure (network, cryptographic, claim validation) is logged by the
/// strategy and reported as `None` so the next strategy can run.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use mcp_oauth_gate::oauth::{AccessToken, VerificationStrategy};
///
/// struct StaticToken;
///
/// #[async_trait]
/// impl VerificationStrategy for StaticToken {
///     fn name(&self) -> &'static str {
///         "static"
///     }
///
///     async fn attempt(&self, token: &str) -> Option<AccessToken> {
///         (token == "let-me-in")
///             .then(|| AccessToken::new(token, "service", ["notes:read"], u64::MAX).ok())
///             .flatten()
///     }
/// }
/// ```
#[async_trait]
pub trait VerificationStrategy: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy should be tried for `token` at all.
    ///
    /// A `false` here is a skip, not a failure.
    fn applies(&self, _token: &str) -> bool {
        true
    }

    /// Try to verify `token`.
    async fn attempt(&self, token: &str) -> Option<AccessToken>;
}

/// Build the HTTP client a strategy uses to reach the identity provider.
pub(crate) fn http_client(timeout: std::time::Duration) -> crate::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("mcp-oauth-gate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}
