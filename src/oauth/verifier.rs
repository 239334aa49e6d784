//! Token verification coordinator.
//!
//! [`TokenVerifier`] owns the [`TokenCache`] and an ordered chain of
//! [`VerificationStrategy`] implementations:
//!
//! ```text
//! verify(token)
//!   ├─ cache hit ───────────────────────────────► Some(AccessToken)
//!   └─ cache miss
//!        ├─ JwtStrategy          (JWKS configured, JWT-shaped token)
//!        ├─ IntrospectionStrategy (endpoint + client credentials)
//!        ├─ UserinfoStrategy      (userinfo endpoint)
//!        └─ nothing verified ────────────────────► None
//! ```
//!
//! JWT verification is tried first because it needs no network round trip
//! once keys are cached. Introspection handles opaque tokens for registered
//! clients. Userinfo is the most broadly compatible and the weakest.
//!
//! `verify` never fails and never says *why* a token was rejected; the
//! reason is only logged.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::cache::TokenCache;
use super::introspection::IntrospectionStrategy;
use super::jwks::JwksClient;
use super::jwt::JwtStrategy;
use super::strategy::{VerificationStrategy, http_client};
use super::token::{AccessToken, unix_now};
use super::userinfo::UserinfoStrategy;
use crate::config::VerifierConfig;
use crate::error::{Error, Result};

/// Verifies bearer tokens through a cache and a fallback strategy chain.
///
/// # Example
///
/// ```rust,no_run
/// use mcp_oauth_gate::{TokenVerifier, VerifierConfig};
///
/// # async fn run() -> Result<(), mcp_oauth_gate::Error> {
/// let config = VerifierConfig::new("https://idp.example.com")
///     .resource("https://mcp.example.com")
///     .jwks_uri("https://idp.example.com/jwks")
///     .userinfo_uri("https://idp.example.com/userinfo");
///
/// let verifier = TokenVerifier::from_config(&config)?;
/// match verifier.verify("eyJhbGciOi...").await {
///     Some(token) => println!("hello {}", token.subject()),
///     None => println!("401"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct TokenVerifier {
    cache: TokenCache,
    strategies: RwLock<Vec<Arc<dyn VerificationStrategy>>>,
    cache_ttl: Duration,
    strategy_timeout: Duration,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("strategies", &self.strategy_names())
            .field("cache_entries", &self.cache.len())
            .field("cache_ttl", &self.cache_ttl)
            .field("strategy_timeout", &self.strategy_timeout)
            .finish()
    }
}

impl TokenVerifier {
    /// Build the standard strategy chain from configuration.
    ///
    /// Introspection with incomplete client credentials is disabled with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or enables
    /// no strategy at all.
    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        config.validate()?;

        let cache_ttl = config.cache_ttl();
        let timeout = config.http_timeout();
        let mut strategies: Vec<Arc<dyn VerificationStrategy>> = Vec::new();

        if let Some(jwks_uri) = config.jwks_uri.as_deref().filter(|u| !u.trim().is_empty()) {
            let jwks = JwksClient::new(jwks_uri, http_client(timeout)?);
            let mut jwt = JwtStrategy::new(jwks, cache_ttl).accepted_audiences(config.audiences());
            if let Some(issuer) = &config.issuer {
                jwt = jwt.expected_issuer(issuer.clone());
            }
            strategies.push(Arc::new(jwt));
        }

        if let Some((uri, client_id, secret)) = config.introspection_credentials() {
            strategies.push(Arc::new(IntrospectionStrategy::new(
                uri,
                client_id,
                secret.clone(),
                http_client(timeout)?,
                cache_ttl,
            )));
        } else if config.introspection_partially_configured() {
            tracing::warn!(
                "Introspection endpoint configured without client id and secret; \
                 introspection is disabled"
            );
        }

        if let Some(userinfo_uri) = config.userinfo_uri.as_deref().filter(|u| !u.trim().is_empty())
        {
            strategies.push(Arc::new(
                UserinfoStrategy::new(userinfo_uri, http_client(timeout)?, cache_ttl)
                    .scope_inference(config.scope_inference),
            ));
        }

        let verifier = Self::with_strategies(strategies, cache_ttl)?;
        // A JWKS lookup may need a stale refresh plus a kid-miss refresh.
        let verifier = verifier.strategy_timeout(timeout * 2);
        tracing::info!(strategies = ?verifier.strategy_names(), "Token verifier configured");
        Ok(verifier)
    }

    /// Build a verifier over an explicit strategy chain, tried in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `strategies` is empty.
    pub fn with_strategies(
        strategies: Vec<Arc<dyn VerificationStrategy>>,
        cache_ttl: Duration,
    ) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::config(
                "no verification strategy configured: set a JWKS URI, an introspection \
                 endpoint with client credentials, or a userinfo endpoint",
            ));
        }
        Ok(Self {
            cache: TokenCache::new(),
            strategies: RwLock::new(strategies),
            cache_ttl,
            strategy_timeout: Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECS * 2),
        })
    }

    /// Upper bound on a single strategy attempt. A strategy that exceeds it
    /// counts as failed and the chain moves on.
    pub fn strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }

    /// Verify a raw bearer token.
    ///
    /// Returns `None` for any failure. Each strategy runs at most once per
    /// call and nothing is retried.
    pub async fn verify(&self, token: &str) -> Option<AccessToken> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Some(hit) = self.cache.get(token) {
            tracing::debug!(subject = %hit.subject(), "Token cache hit");
            return Some(hit);
        }

        let strategies = self.snapshot();
        for strategy in strategies {
            let name = strategy.name();
            if !strategy.applies(token) {
                tracing::debug!(strategy = name, "Strategy does not apply to token, skipping");
                continue;
            }

            match tokio::time::timeout(self.strategy_timeout, strategy.attempt(token)).await {
                Ok(Some(access)) => {
                    let expiry = (access.expires_at() as f64)
                        .min(unix_now() + self.cache_ttl.as_secs_f64());
                    self.cache.put(token, access.clone(), expiry);
                    tracing::info!(
                        strategy = name,
                        subject = %access.subject(),
                        scopes = access.scopes().len(),
                        "Bearer token verified"
                    );
                    return Some(access);
                }
                Ok(None) => {
                    tracing::debug!(strategy = name, "Strategy did not verify token");
                }
                Err(_) => {
                    tracing::warn!(
                        strategy = name,
                        timeout_ms = self.strategy_timeout.as_millis() as u64,
                        "Strategy timed out"
                    );
                }
            }
        }

        tracing::debug!("Bearer token rejected by every strategy");
        None
    }

    /// Names of the configured strategies, in the order they are tried.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|s| s.name()).collect()
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop the strategy chain and its HTTP clients, and clear the cache.
    ///
    /// After `close`, `verify` returns `None` for every token.
    pub fn close(&self) {
        self.cache.clear();
        self.strategies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        tracing::debug!("Token verifier closed");
    }

    fn snapshot(&self) -> Vec<Arc<dyn VerificationStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
