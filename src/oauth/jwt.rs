//! Local JWT verification against the identity provider's JWKS.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, Validation};

use super::jwks::JwksClient;
use super::strategy::VerificationStrategy;
use super::token::{AccessToken, TokenClaims, unix_now};
use crate::error::{Error, Result};

/// Clock skew tolerated on `iat`. `exp` is enforced without leeway.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// True if `token` is structurally a compact JWS (three dot-separated parts).
pub fn is_jwt_shaped(token: &str) -> bool {
    token.bytes().filter(|b| *b == b'.').count() == 2
}

/// Verifies RS256-signed JWT access tokens without calling the identity
/// provider (beyond fetching its public keys).
///
/// Checks the signature, `exp`, `iat`, the issuer when one is configured,
/// and that `aud` intersects the accepted audience set. Tokens that are not
/// JWT-shaped are skipped so opaque tokens go straight to the next strategy.
#[derive(Debug)]
pub struct JwtStrategy {
    jwks: JwksClient,
    issuer: Option<String>,
    audiences: Vec<String>,
    cache_ttl: Duration,
    leeway: u64,
}

impl JwtStrategy {
    pub fn new(jwks: JwksClient, cache_ttl: Duration) -> Self {
        Self {
            jwks,
            issuer: None,
            audiences: Vec::new(),
            cache_ttl,
            leeway: DEFAULT_LEEWAY_SECS,
        }
    }

    pub fn expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Accept tokens whose `aud` contains any of these values.
    ///
    /// With an empty set audience checking is skipped.
    pub fn accepted_audiences(mut self, audiences: Vec<String>) -> Self {
        self.audiences = audiences;
        self
    }

    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    async fn verify_jwt(&self, token: &str) -> Result<AccessToken> {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(Error::claims(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let key = self.jwks.key_for(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        // Audience is an intersection test against several values, done below.
        validation.validate_aud = false;
        validation.leeway = 0;
        // A missing exp is tolerated and bounded by the cache TTL instead.
        validation.required_spec_claims.clear();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["iss"]);
        }

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)?.claims;
        let now = unix_now();

        // Checked here too so a fractional exp is truncated rather than rounded up.
        if claims.exp.is_some_and(|exp| exp as f64 <= now) {
            return Err(Error::claims("token has expired"));
        }

        if let Some(iat) = claims.iat {
            if iat as f64 > now + self.leeway as f64 {
                return Err(Error::claims("token issued in the future"));
            }
        }

        if !self.audiences.is_empty() {
            match &claims.aud {
                Some(aud) if aud.intersects(&self.audiences) => {}
                Some(_) => return Err(Error::claims("audience not accepted")),
                None => return Err(Error::claims("missing aud claim")),
            }
        }

        let subject = claims
            .sub
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::claims("missing sub claim"))?;

        let expires_at = match claims.exp {
            Some(exp) => exp,
            None => {
                tracing::warn!(
                    subject = %subject,
                    ttl_secs = self.cache_ttl.as_secs(),
                    "JWT has no exp claim, bounding it by the cache TTL"
                );
                (now as u64).saturating_add(self.cache_ttl.as_secs())
            }
        };

        Ok(AccessToken::new(token, subject, claims.scopes(), expires_at)?
            .with_client_id(claims.client()))
    }
}

#[async_trait]
impl VerificationStrategy for JwtStrategy {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn applies(&self, token: &str) -> bool {
        is_jwt_shaped(token)
    }

    async fn attempt(&self, token: &str) -> Option<AccessToken> {
        match self.verify_jwt(token).await {
            Ok(access) => {
                tracing::debug!(subject = %access.subject(), "JWT verified");
                Some(access)
            }
            Err(e) => {
                tracing::warn!(strategy = "jwt", jwks = %self.jwks.uri(), error = %e, "JWT verification failed");
                None
            }
        }
    }
}
