//! OAuth2 authorization-code flow with PKCE
//!
//! Implements the paste-the-code variant of the authorization code
//! flow (RFC 7636 PKCE): the user opens the authorization URL in a
//! browser and pastes the resulting code back into the terminal.

use crate::{AuthError, AuthResult};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};

/// OAuth2 provider configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret (optional for native apps using PKCE)
    pub client_secret: Option<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Required scopes
    pub scopes: Vec<String>,
}

/// Token pair containing access and refresh tokens
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenPair {
    /// Access token for protocol authentication
    pub access_token: String,
    /// Refresh token for obtaining new access tokens
    pub refresh_token: Option<String>,
    /// Token expiration timestamp (Unix seconds)
    pub expires_at: Option<i64>,
}

impl TokenPair {
    /// Check if the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let now = chrono::Utc::now().timestamp();
                // Consider expired if less than 5 minutes remaining
                expires_at - now < 300
            }
            None => false,
        }
    }
}

/// Manages an OAuth2 authorization flow
pub struct OAuth2Flow {
    config: OAuth2Config,
    client: BasicClient,
    pkce_verifier: Option<PkceCodeVerifier>,
}

impl OAuth2Flow {
    /// Create a new OAuth2 flow
    pub fn new(config: OAuth2Config) -> AuthResult<Self> {
        let client_id = ClientId::new(config.client_id.clone());
        let client_secret = config.client_secret.clone().map(ClientSecret::new);
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;

        // The code is pasted back by hand, so the redirect target is
        // never actually served
        let redirect_url = RedirectUrl::new("http://localhost".to_string())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URL: {}", e)))?;

        let client = BasicClient::new(client_id, client_secret, auth_url, Some(token_url))
            .set_redirect_uri(redirect_url);

        Ok(Self {
            config,
            client,
            pkce_verifier: None,
        })
    }

    /// Generate the authorization URL for the user to visit
    pub fn authorize_url(&mut self) -> String {
        // Generate PKCE challenge
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        // Offline access so the provider issues a refresh token
        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.config.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _csrf_token) = auth_request.url();

        self.pkce_verifier = Some(pkce_verifier);

        auth_url.to_string()
    }

    /// Exchange a pasted authorization code for an access/refresh token pair
    pub async fn exchange_code(&mut self, code: String) -> AuthResult<TokenPair> {
        let pkce_verifier = self
            .pkce_verifier
            .take()
            .ok_or_else(|| AuthError::InvalidConfig("Auth URL not generated".to_string()))?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let expires_at = token_response
            .expires_in()
            .map(|duration| chrono::Utc::now().timestamp() + duration.as_secs() as i64)
            // Clock-skew guard when the provider omits the expiry
            .or_else(|| Some(chrono::Utc::now().timestamp() + 3600));

        Ok(TokenPair {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            expires_at,
        })
    }

    /// Refresh an access token using a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let token_response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let expires_at = token_response
            .expires_in()
            .map(|duration| chrono::Utc::now().timestamp() + duration.as_secs() as i64);

        Ok(TokenPair {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response
                .refresh_token()
                .map(|t| t.secret().clone())
                // Providers often omit the refresh token on refresh
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        })
    }
}
