//! Mock identity provider shared by the integration tests.
//!
//! Serves a JWKS document, an RFC 7662 introspection endpoint and an OIDC
//! userinfo endpoint on `127.0.0.1:0`, counting every call so tests can
//! assert which strategies touched the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

pub const ISSUER: &str = "https://idp.test";
pub const RESOURCE: &str = "mcp-server";
pub const KID: &str = "test-key-1";
pub const CLIENT_ID: &str = "mcp-server";
pub const CLIENT_SECRET: &str = "s3cret";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Test-only RSA key pair (2048-bit); never used outside these tests.
pub fn encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(include_str!("../fixtures/rsa_private.pem").as_bytes()).unwrap()
}

pub fn public_jwk() -> Value {
    serde_json::from_str(include_str!("../fixtures/rsa_public.jwk.json")).unwrap()
}

/// Sign `claims` with the fixture key.
pub fn sign(claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(String::from);
    jsonwebtoken::encode(&header, claims, &encoding_key()).unwrap()
}

/// Claims for a well-formed token for `sub`, valid for `exp_offset` seconds.
pub fn claims(sub: &str, scope: &str, exp_offset: i64) -> Value {
    let now = now();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": [RESOURCE],
        "iat": now,
        "exp": (now as i64 + exp_offset) as u64,
        "scope": scope,
        "client_id": "desktop-client"
    })
}

#[derive(Default)]
pub struct IdpState {
    pub jwks: RwLock<Value>,
    /// Status the introspection endpoint answers with; 0 means 200.
    pub introspection_status: AtomicU16,
    /// Delay before the introspection endpoint answers, in milliseconds.
    pub introspection_delay_ms: AtomicU64,
    /// A raw 200 body served instead of the introspection lookup.
    pub introspection_raw: RwLock<Option<String>>,
    pub introspection: RwLock<HashMap<String, Value>>,
    pub userinfo: RwLock<HashMap<String, Value>>,
    pub jwks_calls: AtomicUsize,
    pub introspection_calls: AtomicUsize,
    pub userinfo_calls: AtomicUsize,
}

impl IdpState {
    pub fn jwks_calls(&self) -> usize {
        self.jwks_calls.load(Ordering::SeqCst)
    }

    pub fn introspection_calls(&self) -> usize {
        self.introspection_calls.load(Ordering::SeqCst)
    }

    pub fn userinfo_calls(&self) -> usize {
        self.userinfo_calls.load(Ordering::SeqCst)
    }

    pub fn set_jwks(&self, jwks: Value) {
        *self.jwks.write().unwrap() = jwks;
    }

    pub fn introspect_as(&self, token: &str, response: Value) {
        self.introspection
            .write()
            .unwrap()
            .insert(token.to_string(), response);
    }

    pub fn userinfo_for(&self, token: &str, claims: Value) {
        self.userinfo
            .write()
            .unwrap()
            .insert(token.to_string(), claims);
    }

    pub fn fail_introspection_with(&self, status: StatusCode) {
        self.introspection_status
            .store(status.as_u16(), Ordering::SeqCst);
    }

    pub fn delay_introspection(&self, delay: Duration) {
        self.introspection_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn introspection_body(&self, raw: &str) {
        *self.introspection_raw.write().unwrap() = Some(raw.to_string());
    }
}

pub struct MockIdp {
    pub base_url: String,
    pub state: Arc<IdpState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockIdp {
    pub fn jwks_uri(&self) -> String {
        format!("{}/jwks", self.base_url)
    }

    pub fn introspection_uri(&self) -> String {
        format!("{}/introspect", self.base_url)
    }

    pub fn userinfo_uri(&self) -> String {
        format!("{}/userinfo", self.base_url)
    }
}

async fn jwks(State(state): State<Arc<IdpState>>) -> Json<Value> {
    state.jwks_calls.fetch_add(1, Ordering::SeqCst);
    Json(state.jwks.read().unwrap().clone())
}

async fn introspect(
    State(state): State<Arc<IdpState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.introspection_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.introspection_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let raw = state.introspection_raw.read().unwrap().clone();
    if let Some(raw) = raw {
        return ([(header::CONTENT_TYPE, "application/json")], raw).into_response();
    }

    let status = state.introspection_status.load(Ordering::SeqCst);
    if status != 0 {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({"error": "invalid_client"}))).into_response();
    }

    let authenticated = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authenticated {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let token = form.get("token").cloned().unwrap_or_default();
    let body = state
        .introspection
        .read()
        .unwrap()
        .get(&token)
        .cloned()
        .unwrap_or_else(|| json!({"active": false}));
    Json(body).into_response()
}

async fn userinfo(State(state): State<Arc<IdpState>>, headers: HeaderMap) -> Response {
    state.userinfo_calls.fetch_add(1, Ordering::SeqCst);

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();

    match state.userinfo.read().unwrap().get(&token) {
        Some(claims) => Json(claims.clone()).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Start a mock identity provider serving the fixture key.
pub async fn start_idp() -> MockIdp {
    let state = Arc::new(IdpState::default());
    state.set_jwks(json!({ "keys": [public_jwk()] }));

    let app = Router::new()
        .route("/jwks", get(jwks))
        .route("/introspect", post(introspect))
        .route("/userinfo", get(userinfo))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://127.0.0.1:{}", addr.port());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockIdp {
        base_url,
        state,
        _handle: handle,
    }
}
