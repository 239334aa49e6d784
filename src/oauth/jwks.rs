//! Remote JSON Web Key Set client.
//!
//! Keys are fetched lazily on first use and cached by key id. A lookup for an
//! unknown `kid` triggers a refresh (key rotation), rate-limited by a minimum
//! refresh interval so a flood of tokens with bogus key ids cannot hammer the
//! identity provider. If a scheduled refresh fails the stale keys keep being
//! served.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;

use crate::error::{Error, Result};

/// How long a fetched key set is considered fresh.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between two fetches of the key set.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Default)]
struct KeyState {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    /// Keys published without a `kid`, in document order.
    anonymous: Vec<Arc<DecodingKey>>,
    fetched_at: Option<Instant>,
}

impl KeyState {
    fn lookup(&self, kid: Option<&str>) -> Option<Arc<DecodingKey>> {
        match kid {
            Some(kid) => self.by_kid.get(kid).cloned(),
            // Without a kid we can only pick a key when the choice is unambiguous.
            None => match (self.by_kid.len(), self.anonymous.len()) {
                (0, 1) => self.anonymous.first().cloned(),
                (1, 0) => self.by_kid.values().next().cloned(),
                _ => None,
            },
        }
    }
}

/// Fetches and caches signing keys from a JWKS endpoint.
pub struct JwksClient {
    uri: String,
    client: reqwest::Client,
    state: RwLock<KeyState>,
    key_ttl: Duration,
    min_refresh_interval: Duration,
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient")
            .field("uri", &self.uri)
            .field("key_ttl", &self.key_ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl JwksClient {
    pub fn new(uri: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            uri: uri.into(),
            client,
            state: RwLock::new(KeyState::default()),
            key_ttl: DEFAULT_KEY_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    pub fn key_ttl(mut self, ttl: Duration) -> Self {
        self.key_ttl = ttl;
        self
    }

    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Return the decoding key for `kid`, fetching the key set if needed.
    pub async fn key_for(&self, kid: Option<&str>) -> Result<Arc<DecodingKey>> {
        if self.is_stale() {
            if let Err(e) = self.refresh().await {
                // Keep serving whatever we already have.
                tracing::warn!(uri = %self.uri, error = %e, "JWKS refresh failed");
            }
        }

        if let Some(key) = self.read_state().lookup(kid) {
            return Ok(key);
        }

        if self.may_refresh() {
            tracing::debug!(uri = %self.uri, kid = ?kid, "Unknown key id, refreshing JWKS");
            self.refresh().await?;
            if let Some(key) = self.read_state().lookup(kid) {
                return Ok(key);
            }
        }

        Err(Error::Jwks(match kid {
            Some(kid) => format!("no signing key with kid {kid}"),
            None => "token has no kid and the key set is ambiguous".to_string(),
        }))
    }

    /// Fetch the key set and replace the cached keys.
    pub async fn refresh(&self) -> Result<()> {
        self.write_state().fetched_at = Some(Instant::now());

        let response = self.client.get(&self.uri).send().await?;
        if !response.status().is_success() {
            return Err(Error::Jwks(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }
        let set: JwkSet = serde_json::from_slice(&response.bytes().await?)?;

        let mut by_kid = HashMap::new();
        let mut anonymous = Vec::new();
        for jwk in &set.keys {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => Arc::new(key),
                Err(e) => {
                    tracing::debug!(kid = ?jwk.common.key_id, error = %e, "Skipping unusable JWK");
                    continue;
                }
            };
            match &jwk.common.key_id {
                Some(kid) => {
                    by_kid.insert(kid.clone(), key);
                }
                None => anonymous.push(key),
            }
        }

        tracing::debug!(
            uri = %self.uri,
            keys = by_kid.len() + anonymous.len(),
            "Fetched JWKS"
        );

        let mut state = self.write_state();
        state.by_kid = by_kid;
        state.anonymous = anonymous;
        Ok(())
    }

    fn is_stale(&self) -> bool {
        match self.read_state().fetched_at {
            None => true,
            Some(at) => at.elapsed() >= self.key_ttl,
        }
    }

    fn may_refresh(&self) -> bool {
        match self.read_state().fetched_at {
            None => true,
            Some(at) => at.elapsed() >= self.min_refresh_interval,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, KeyState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, KeyState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
