//! Tower middleware for HTTP-level bearer token verification.
//!
//! Provides [`OAuthLayer`] and [`OAuthService`], which extract the bearer
//! token, verify it through a shared [`TokenVerifier`], and hand the verified
//! caller to downstream handlers as a [`CallerContext`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use tower::Layer;
use tower_service::Service;

use super::error::OAuthError;
use super::metadata::ProtectedResourceMetadata;
use super::scope::ScopeRequirement;
use super::verifier::TokenVerifier;
use crate::context::CallerContext;

/// Tower layer that wraps services with bearer token verification.
///
/// On success, injects a [`CallerContext`] and the verified
/// [`AccessToken`](super::AccessToken) into request extensions.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mcp_oauth_gate::{TokenVerifier, VerifierConfig};
/// use mcp_oauth_gate::oauth::{OAuthLayer, ProtectedResourceMetadata};
///
/// # fn build() -> Result<(), mcp_oauth_gate::Error> {
/// let config = VerifierConfig::new("https://auth.example.com")
///     .jwks_uri("https://auth.example.com/jwks");
/// let verifier = Arc::new(TokenVerifier::from_config(&config)?);
/// let metadata = ProtectedResourceMetadata::new("https://mcp.example.com")
///     .authorization_server("https://auth.example.com");
///
/// let layer = OAuthLayer::new(verifier, metadata).public_path("/health");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OAuthLayer {
    verifier: Arc<TokenVerifier>,
    metadata: ProtectedResourceMetadata,
    default_scopes: ScopeRequirement,
    public_paths: Vec<String>,
}

impl OAuthLayer {
    pub fn new(verifier: Arc<TokenVerifier>, metadata: ProtectedResourceMetadata) -> Self {
        Self {
            verifier,
            metadata,
            default_scopes: ScopeRequirement::new(),
            public_paths: vec![ProtectedResourceMetadata::well_known_path().to_string()],
        }
    }

    /// Scopes every authenticated request must carry, on top of per-tool
    /// requirements.
    pub fn default_scopes(mut self, requirement: ScopeRequirement) -> Self {
        self.default_scopes = requirement;
        self
    }

    /// Add a path that does not require authentication.
    ///
    /// Matching is exact. The `/.well-known/oauth-protected-resource` path is
    /// always public.
    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }
}

impl<S> Layer<S> for OAuthLayer {
    type Service = OAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OAuthService {
            inner,
            verifier: self.verifier.clone(),
            metadata_url: Arc::from(self.metadata.metadata_url()),
            default_scopes: self.default_scopes.clone(),
            public_paths: self.public_paths.clone().into(),
        }
    }
}

/// Tower service that verifies bearer tokens on HTTP requests.
///
/// Created by [`OAuthLayer`]. For each incoming request:
///
/// 1. Public paths pass straight through
/// 2. A missing `Authorization: Bearer` header is a 401
/// 3. A token the [`TokenVerifier`] rejects is a 401 with a uniform description
/// 4. A token lacking the default scopes is a 403
/// 5. Otherwise the caller is recorded in request extensions
#[derive(Debug, Clone)]
pub struct OAuthService<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
    metadata_url: Arc<str>,
    default_scopes: ScopeRequirement,
    public_paths: Arc<[String]>,
}

/// The bearer credential from an `Authorization` header value.
fn bearer_token(req: &Request<Body>) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Public paths match exactly; `/health` does not open `/health/admin`.
fn is_public(public_paths: &[String], path: &str) -> bool {
    public_paths.iter().any(|p| p == path)
}

impl<S> Service<Request<Body>> for OAuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<crate::BoxError> + Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let path = req.uri().path().to_string();
        let public_paths = self.public_paths.clone();
        let verifier = self.verifier.clone();
        let metadata_url = self.metadata_url.clone();
        let default_scopes = self.default_scopes.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if is_public(&public_paths, &path) {
                return inner.call(req).await;
            }

            let Some(token) = bearer_token(&req) else {
                tracing::debug!(path = %path, "Request without bearer token");
                return Ok(OAuthError::MissingToken.to_response(Some(&*metadata_url)));
            };

            let Some(access) = verifier.verify(&token).await else {
                return Ok(OAuthError::invalid_token().to_response(Some(&*metadata_url)));
            };

            if let Err(error) = default_scopes.check(&access) {
                tracing::info!(subject = %access.subject(), path = %path, "Default scopes not granted");
                return Ok(error.to_response(Some(&*metadata_url)));
            }

            req.extensions_mut().insert(access.clone());
            req.extensions_mut().insert(CallerContext::authenticated(access));
            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{AccessToken, VerificationStrategy};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Inner service that echoes the verified subject in a header.
    #[derive(Clone)]
    struct OkService;

    impl Service<Request<Body>> for OkService {
        type Response = Response;
        type Error = std::convert::Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Body>) -> Self::Future {
            let subject = CallerContext::from_extensions(req.extensions())
                .subject()
                .unwrap_or("anonymous")
                .to_string();
            Box::pin(async move {
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .header("x-subject", subject)
                    .body(Body::empty())
                    .unwrap())
            })
        }
    }

    /// Accepts `good-token` as alice with `notes:read`.
    struct StaticStrategy;

    #[async_trait]
    impl VerificationStrategy for StaticStrategy {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn attempt(&self, token: &str) -> Option<AccessToken> {
            (token == "good-token")
                .then(|| AccessToken::new(token, "alice", ["notes:read"], u64::MAX).ok())
                .flatten()
        }
    }

    fn test_layer() -> OAuthLayer {
        let verifier =
            TokenVerifier::with_strategies(vec![Arc::new(StaticStrategy)], Duration::from_secs(60))
                .unwrap();
        let metadata = ProtectedResourceMetadata::new("https://mcp.example.com")
            .authorization_server("https://auth.example.com");
        OAuthLayer::new(Arc::new(verifier), metadata)
    }

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/mcp");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn challenge(resp: &Response) -> String {
        resp.headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_missing_token_returns_401() {
        let mut service = test_layer().layer(OkService);

        let resp = service.ready().await.unwrap().call(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let www_auth = challenge(&resp);
        assert!(www_auth.contains(
            "resource_metadata=\"https://mcp.example.com/.well-known/oauth-protected-resource\""
        ));
        assert!(!www_auth.contains("error="));
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let mut service = test_layer().layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer good-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-subject"], "alice");
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let mut service = test_layer().layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("bearer good-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_token_returns_uniform_401() {
        let mut service = test_layer().layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer not-a-valid-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let www_auth = challenge(&resp);
        assert!(www_auth.contains("error=\"invalid_token\""));
        assert!(www_auth.contains(crate::oauth::error::INVALID_TOKEN_DESCRIPTION));
    }

    #[tokio::test]
    async fn test_basic_auth_is_not_a_bearer_token() {
        let mut service = test_layer().layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Basic Zm9vOmJhcg==")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(!challenge(&resp).contains("error="));
    }

    #[tokio::test]
    async fn test_well_known_path_is_public() {
        let mut service = test_layer().layer(OkService);

        let req = Request::builder()
            .uri("/.well-known/oauth-protected-resource")
            .body(Body::empty())
            .unwrap();

        let resp = service.ready().await.unwrap().call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-subject"], "anonymous");
    }

    #[tokio::test]
    async fn test_custom_public_path() {
        let mut service = test_layer().public_path("/health").layer(OkService);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = service.ready().await.unwrap().call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_default_scopes_returns_403() {
        let layer = test_layer().default_scopes(ScopeRequirement::one("notes:admin"));
        let mut service = layer.layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer good-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let www_auth = challenge(&resp);
        assert!(www_auth.contains("insufficient_scope"));
        assert!(www_auth.contains("scope=\"notes:admin\""));
    }

    #[tokio::test]
    async fn test_sufficient_default_scopes_pass() {
        let layer = test_layer().default_scopes(ScopeRequirement::one("notes:read"));
        let mut service = layer.layer(OkService);

        let resp = service
            .ready()
            .await
            .unwrap()
            .call(request(Some("Bearer good-token")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_nested_well_known_path_requires_token() {
        let mut service = test_layer().layer(OkService);

        for uri in [
            "/admin/.well-known/secret",
            "/.well-known/oauth-protected-resource/extra",
            "/.well-known/openid-configuration",
        ] {
            let resp = service.ready().await.unwrap().call(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_public_path_matches_exactly() {
        let mut service = test_layer().public_path("/health").layer(OkService);

        for uri in ["/healthx", "/health/admin"] {
            let resp = service.ready().await.unwrap().call(get(uri)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }

        let resp = service.ready().await.unwrap().call(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
