//! OIDC userinfo fallback.
//!
//! The weakest strategy: it only proves the identity provider still accepts
//! the token. When the provider does not return an explicit `scope` claim,
//! scopes are derived according to the configured [`ScopeInference`] policy.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::strategy::VerificationStrategy;
use super::token::{AccessToken, split_scopes, unix_now};
use crate::config::ScopeInference;
use crate::error::{Error, Result};

const PROFILE_CLAIMS: [&str; 4] = ["name", "given_name", "family_name", "picture"];

/// Derive scopes from a userinfo document.
///
/// An explicit `scope` claim (string or array) always wins. Otherwise the
/// result depends on `policy`; "openid" is always granted.
pub fn scopes_from_userinfo(claims: &Map<String, Value>, policy: ScopeInference) -> BTreeSet<String> {
    if let Some(explicit) = claims.get("scope") {
        let scopes = string_values(explicit);
        if !scopes.is_empty() {
            return scopes;
        }
        tracing::debug!(?policy, "Userinfo scope claim is empty, falling back to the inference policy");
    }

    let mut scopes = BTreeSet::from(["openid".to_string()]);
    if policy == ScopeInference::Disabled {
        return scopes;
    }

    if claims.contains_key("email") {
        scopes.insert("email".to_string());
    }
    if PROFILE_CLAIMS.iter().any(|c| claims.contains_key(*c)) {
        scopes.insert("profile".to_string());
    }
    for key in ["roles", "groups"] {
        if let Some(value) = claims.get(key) {
            scopes.extend(string_values(value));
        }
    }
    scopes
}

/// Collect whitespace-separated strings or arrays of strings.
fn string_values(value: &Value) -> BTreeSet<String> {
    match value {
        Value::String(s) => split_scopes(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(split_scopes)
            .collect(),
        _ => BTreeSet::new(),
    }
}

/// Verifies a token by calling the provider's userinfo endpoint with it.
#[derive(Debug)]
pub struct UserinfoStrategy {
    endpoint: String,
    client: reqwest::Client,
    cache_ttl: Duration,
    inference: ScopeInference,
}

impl UserinfoStrategy {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client, cache_ttl: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            cache_ttl,
            inference: ScopeInference::default(),
        }
    }

    pub fn scope_inference(mut self, policy: ScopeInference) -> Self {
        self.inference = policy;
        self
    }

    async fn fetch(&self, token: &str) -> Result<AccessToken> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::claims(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let claims: Map<String, Value> = serde_json::from_slice(&response.bytes().await?)?;
        let subject = ["sub", "preferred_username"]
            .iter()
            .filter_map(|key| claims.get(*key).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::claims("userinfo has neither sub nor preferred_username"))?
            .to_string();

        if !claims.contains_key("scope") && self.inference == ScopeInference::ClaimPresence {
            tracing::debug!(subject = %subject, "Inferring scopes from userinfo claims");
        }
        let scopes = scopes_from_userinfo(&claims, self.inference);
        let expires_at = (unix_now() as u64).saturating_add(self.cache_ttl.as_secs());

        AccessToken::new(token, subject, scopes, expires_at)
    }
}

#[async_trait]
impl VerificationStrategy for UserinfoStrategy {
    fn name(&self) -> &'static str {
        "userinfo"
    }

    async fn attempt(&self, token: &str) -> Option<AccessToken> {
        match self.fetch(token).await {
            Ok(access) => {
                tracing::debug!(subject = %access.subject(), "Token verified via userinfo");
                Some(access)
            }
            Err(e) => {
                tracing::warn!(strategy = "userinfo", endpoint = %self.endpoint, error = %e, "Userinfo verification failed");
                None
            }
        }
    }
}
