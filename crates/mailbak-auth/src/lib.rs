//! Credential resolution for mailbak
//!
//! Resolves a usable access credential for the IMAP session: either a
//! static password passed through unchanged, or an OAuth2 access token
//! that is loaded from disk, refreshed through its refresh token when
//! expired, and persisted back after every refresh.

mod error;
mod oauth2;
mod provider;
mod token_store;

pub use error::{AuthError, AuthResult};
pub use oauth2::{OAuth2Config, OAuth2Flow, TokenPair};
pub use provider::{
    Credential, CredentialProvider, InteractiveAuthorizer, ResolvedCredential, StdinAuthorizer,
};
pub use token_store::TokenStore;

/// Gmail OAuth2 configuration
pub mod gmail {
    use super::OAuth2Config;

    /// Gmail OAuth2 scope for full mail access
    pub const MAIL_SCOPE: &str = "https://mail.google.com/";

    /// Create Gmail OAuth2 configuration
    pub fn oauth2_config(client_id: &str, client_secret: &str) -> OAuth2Config {
        OAuth2Config {
            client_id: client_id.to_string(),
            client_secret: Some(client_secret.to_string()),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![MAIL_SCOPE.to_string()],
        }
    }
}
