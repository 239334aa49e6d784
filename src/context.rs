//! The verified caller of the current request.
//!
//! [`OAuthLayer`](crate::oauth::OAuthLayer) inserts a [`CallerContext`] into
//! the request extensions once the bearer token is verified. Handlers take it
//! as an extractor and hand it to the authorization calls explicitly.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;

use crate::oauth::AccessToken;

/// Who is making the request, if anyone was authenticated.
///
/// An anonymous context means the server runs without OAuth, so
/// authorization checks allow everything.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    token: Option<Arc<AccessToken>>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(token: AccessToken) -> Self {
        Self {
            token: Some(Arc::new(token)),
        }
    }

    /// The verified token, or `None` for an anonymous caller.
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.token().map(AccessToken::subject)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The caller recorded in `extensions`, anonymous if there is none.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        extensions.get::<CallerContext>().cloned().unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous() {
        let ctx = CallerContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(ctx.token().is_none());
        assert!(ctx.subject().is_none());
    }

    #[test]
    fn test_from_extensions() {
        let mut extensions = Extensions::new();
        assert!(!CallerContext::from_extensions(&extensions).is_authenticated());

        let token = AccessToken::new("raw", "alice", ["notes:read"], u64::MAX).unwrap();
        extensions.insert(CallerContext::authenticated(token));

        let ctx = CallerContext::from_extensions(&extensions);
        assert_eq!(ctx.subject(), Some("alice"));
        assert!(ctx.token().unwrap().has_scope("notes:read"));
    }

    #[tokio::test]
    async fn test_extractor() {
        let token = AccessToken::new("raw", "bob", ["calendar:read"], u64::MAX).unwrap();
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/tools")
            .extension(CallerContext::authenticated(token))
            .body(())
            .unwrap()
            .into_parts();

        let ctx = CallerContext::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(ctx.subject(), Some("bob"));
    }
}
