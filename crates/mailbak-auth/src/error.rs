//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during credential resolution
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Authorization code was rejected, malformed, or missing
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Refresh token was rejected by the token endpoint
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Token file could not be parsed
    #[error("Token file error: {0}")]
    TokenFile(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
