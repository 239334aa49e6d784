//! Error types for mcp-oauth-gate

/// Boxed error type used at the binary and transport edges.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// mcp-oauth-gate error type
///
/// These errors are raised at construction time and inside individual
/// verification strategies. They never escape
/// [`TokenVerifier::verify`](crate::oauth::TokenVerifier::verify), which
/// collapses every failure into "not verified".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JWKS error: {0}")]
    Jwks(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid claims: {0}")]
    Claims(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn claims(message: impl Into<String>) -> Self {
        Error::Claims(message.into())
    }
}

/// Result type alias for mcp-oauth-gate
pub type Result<T> = std::result::Result<T, Error>;
