//! Verified token cache.
//!
//! Maps a raw bearer token to the [`AccessToken`] it verified to, together
//! with the instant (unix seconds) after which the entry must not be served.
//! Expired entries are evicted lazily by the read that observes them.

use std::collections::HashMap;
use std::sync::RwLock;

use super::token::{AccessToken, unix_now};

#[derive(Debug, Clone)]
struct CacheEntry {
    token: AccessToken,
    expiry: f64,
}

/// Concurrency-safe cache of verified tokens.
///
/// Writers for the same key race harmlessly: verification is deterministic
/// for a given token, so last-write-wins. Locks are never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a token, evicting it if it has expired.
    pub fn get(&self, token: &str) -> Option<AccessToken> {
        self.get_at(token, unix_now())
    }

    fn get_at(&self, token: &str, now: f64) -> Option<AccessToken> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(token) {
                None => return None,
                Some(entry) if now < entry.expiry => return Some(entry.token.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // Another writer may have refreshed the entry between the two locks.
        if let Some(entry) = entries.get(token) {
            if now < entry.expiry {
                return Some(entry.token.clone());
            }
        }
        if let Some(expired) = entries.remove(token) {
            tracing::debug!(subject = %expired.token.subject(), "Evicted expired token");
        }
        None
    }

    /// Cache a verified token until `expiry` (unix seconds).
    pub fn put(&self, token: impl Into<String>, access_token: AccessToken, expiry: f64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            token.into(),
            CacheEntry {
                token: access_token,
                expiry,
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of entries, including ones that have expired but not yet been read.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
