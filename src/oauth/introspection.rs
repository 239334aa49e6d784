//! RFC 7662 token introspection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::strategy::VerificationStrategy;
use super::token::{AccessToken, numeric_date, split_scopes, unix_now};
use crate::error::{Error, Result};
use crate::secret::SecretString;

/// Introspection response body (RFC 7662 Section 2.2).
#[derive(Debug, Default, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    exp: Option<u64>,
}

/// Asks the authorization server whether an (opaque) token is active.
///
/// Authenticates to the introspection endpoint with HTTP basic client
/// credentials. An inactive token, a rejected client, or any transport
/// failure is "not verified" and the chain moves on.
#[derive(Debug)]
pub struct IntrospectionStrategy {
    endpoint: String,
    client_id: String,
    client_secret: SecretString,
    client: reqwest::Client,
    cache_ttl: Duration,
}

impl IntrospectionStrategy {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        client: reqwest::Client,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret,
            client,
            cache_ttl,
        }
    }

    /// `Ok(None)` means the server answered but did not vouch for the token.
    async fn introspect(&self, token: &str) -> Result<Option<AccessToken>> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::warn!(
                    strategy = "introspection",
                    status = status.as_u16(),
                    client_id = %self.client_id,
                    "Introspection endpoint rejected the request; the client credentials \
                     may not match the client that issued the token"
                );
                return Ok(None);
            }
            _ => {
                tracing::warn!(
                    strategy = "introspection",
                    status = status.as_u16(),
                    "Unexpected introspection response"
                );
                return Ok(None);
            }
        }

        let body: IntrospectionResponse = serde_json::from_slice(&response.bytes().await?)?;
        if !body.active {
            tracing::debug!(strategy = "introspection", "Token is not active");
            return Ok(None);
        }

        let now = unix_now();
        let expires_at = match body.exp {
            Some(exp) if (exp as f64) <= now => {
                return Err(Error::claims("introspection reported an expired token"));
            }
            Some(exp) => exp,
            None => (now as u64).saturating_add(self.cache_ttl.as_secs()),
        };

        let Some(subject) = body
            .sub
            .or(body.username)
            .filter(|s| !s.trim().is_empty())
        else {
            return Err(Error::claims("active token has neither sub nor username"));
        };

        let scopes = split_scopes(body.scope.as_deref().unwrap_or(""));
        Ok(Some(
            AccessToken::new(token, subject, scopes, expires_at)?
                .with_client_id(body.client_id.unwrap_or_default()),
        ))
    }
}

#[async_trait]
impl VerificationStrategy for IntrospectionStrategy {
    fn name(&self) -> &'static str {
        "introspection"
    }

    async fn attempt(&self, token: &str) -> Option<AccessToken> {
        match self.introspect(token).await {
            Ok(Some(access)) => {
                tracing::debug!(subject = %access.subject(), "Token verified via introspection");
                Some(access)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(strategy = "introspection", endpoint = %self.endpoint, error = %e, "Introspection failed");
                None
            }
        }
    }
}
