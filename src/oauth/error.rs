//! Bearer token error responses (RFC 6750 Section 3).
//!
//! Authentication failures (no token, or a token no strategy could verify)
//! map to 401. Authorization failures (a verified token without the scopes a
//! tool needs) map to 403 with the missing scopes, so the client can step up.

use std::fmt;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

/// JSON-RPC error code used for OAuth rejections.
pub const OAUTH_ERROR_CODE: i64 = -32001;

/// Description sent for every unverifiable token, whatever the reason.
pub const INVALID_TOKEN_DESCRIPTION: &str = "The access token is invalid or expired";

/// Authentication or authorization failure for a bearer-token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// No bearer token was provided in the request.
    MissingToken,

    /// The token could not be verified.
    InvalidToken { description: String },

    /// The token is valid but lacks scopes the operation requires.
    InsufficientScope {
        /// Required scopes absent from the token, in declaration order.
        missing: Vec<String>,
        /// Scopes present in the token.
        provided: Vec<String>,
    },
}

impl OAuthError {
    /// The uniform rejection for a token no strategy verified.
    pub fn invalid_token() -> Self {
        OAuthError::InvalidToken {
            description: INVALID_TOKEN_DESCRIPTION.to_string(),
        }
    }

    /// 401 for authentication failures, 403 for insufficient scope.
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::InsufficientScope { .. } => 403,
            _ => 401,
        }
    }

    /// Builds the `WWW-Authenticate` header value.
    ///
    /// When `resource_metadata_url` is provided, includes the RFC 9728
    /// `resource_metadata` parameter.
    pub fn www_authenticate(&self, resource_metadata_url: Option<&str>) -> String {
        let mut parts = Vec::new();

        if let Some(url) = resource_metadata_url {
            parts.push(format!("resource_metadata=\"{}\"", url));
        }

        match self {
            OAuthError::MissingToken => {
                // No error code when the request carried no credentials.
                if parts.is_empty() {
                    return "Bearer".to_string();
                }
            }
            OAuthError::InvalidToken { description } => {
                parts.push("error=\"invalid_token\"".to_string());
                parts.push(format!("error_description=\"{}\"", description));
            }
            OAuthError::InsufficientScope { missing, .. } => {
                parts.push("error=\"insufficient_scope\"".to_string());
                if !missing.is_empty() {
                    parts.push(format!("scope=\"{}\"", missing.join(" ")));
                }
            }
        }
        format!("Bearer {}", parts.join(", "))
    }

    /// The JSON-RPC error body sent with the HTTP response.
    pub fn to_jsonrpc(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "code": OAUTH_ERROR_CODE,
            "message": self.to_string(),
        });
        if let OAuthError::InsufficientScope { missing, .. } = self {
            error["data"] = serde_json::json!({ "missing_scopes": missing });
        }
        serde_json::json!({
            "jsonrpc": "2.0",
            "error": error,
            "id": null
        })
    }

    /// Build the full HTTP response, advertising `resource_metadata_url` in
    /// the `WWW-Authenticate` header.
    pub fn to_response(&self, resource_metadata_url: Option<&str>) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);

        let mut response = (status, axum::Json(self.to_jsonrpc())).into_response();
        let challenge = HeaderValue::from_str(&self.www_authenticate(resource_metadata_url))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge);
        response
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        self.to_response(None)
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::MissingToken => write!(f, "missing bearer token"),
            OAuthError::InvalidToken { description } => {
                write!(f, "invalid token: {}", description)
            }
            OAuthError::InsufficientScope { missing, provided } => write!(
                f,
                "insufficient scope: missing [{}], provided [{}]",
                missing.join(", "),
                provided.join(", ")
            ),
        }
    }
}

impl std::error::Error for OAuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_no_metadata() {
        let err = OAuthError::MissingToken;
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.www_authenticate(None), "Bearer");
    }

    #[test]
    fn test_missing_token_with_metadata() {
        let err = OAuthError::MissingToken;
        let header = err.www_authenticate(Some(
            "https://example.com/.well-known/oauth-protected-resource",
        ));
        assert_eq!(
            header,
            "Bearer resource_metadata=\"https://example.com/.well-known/oauth-protected-resource\""
        );
    }

    #[test]
    fn test_invalid_token_is_uniform() {
        let err = OAuthError::invalid_token();
        assert_eq!(err.status_code(), 401);
        let header = err.www_authenticate(None);
        assert!(header.contains("error=\"invalid_token\""));
        assert!(header.contains(INVALID_TOKEN_DESCRIPTION));
    }

    #[test]
    fn test_insufficient_scope() {
        let err = OAuthError::InsufficientScope {
            missing: vec!["notes:write".to_string(), "notes:admin".to_string()],
            provided: vec!["notes:read".to_string()],
        };
        assert_eq!(err.status_code(), 403);
        let header = err.www_authenticate(None);
        assert!(header.contains("error=\"insufficient_scope\""));
        assert!(header.contains("scope=\"notes:write notes:admin\""));
    }

    #[test]
    fn test_jsonrpc_body_lists_missing_scopes() {
        let err = OAuthError::InsufficientScope {
            missing: vec!["notes:write".to_string()],
            provided: vec![],
        };
        let body = err.to_jsonrpc();
        assert_eq!(body["error"]["code"], OAUTH_ERROR_CODE);
        assert_eq!(body["error"]["data"]["missing_scopes"][0], "notes:write");
        assert!(body["id"].is_null());

        let body = OAuthError::MissingToken.to_jsonrpc();
        assert!(body["error"].get("data").is_none());
    }

    #[test]
    fn test_into_response() {
        let response = OAuthError::InsufficientScope {
            missing: vec!["calendar:write".to_string()],
            provided: vec!["calendar:read".to_string()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.contains("scope=\"calendar:write\""));

        let response = OAuthError::MissingToken.to_response(Some("https://mcp.example.com/x"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_display() {
        assert_eq!(OAuthError::MissingToken.to_string(), "missing bearer token");
        assert_eq!(
            OAuthError::InsufficientScope {
                missing: vec!["a".to_string()],
                provided: vec!["b".to_string(), "c".to_string()],
            }
            .to_string(),
            "insufficient scope: missing [a], provided [b, c]"
        );
    }
}
