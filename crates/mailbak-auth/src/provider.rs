//! Credential provider
//!
//! Resolves the configured credential into something an IMAP session
//! can authenticate with. Password credentials pass straight through;
//! OAuth2 credentials go through load / interactive login / refresh,
//! with every refreshed token persisted before use.

use crate::{AuthError, AuthResult, OAuth2Flow, TokenPair, TokenStore};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use url::Url;

/// A configured credential, exactly one variant active per run
#[derive(Debug, Clone)]
pub enum Credential {
    /// Static email + password login
    Password { email: String, password: String },
    /// OAuth2 client with a file-persisted token
    OAuth2 {
        email: String,
        client_id: String,
        client_secret: String,
        token_file: PathBuf,
    },
}

impl Credential {
    /// Email address this credential belongs to
    pub fn email(&self) -> &str {
        match self {
            Credential::Password { email, .. } => email,
            Credential::OAuth2 { email, .. } => email,
        }
    }
}

/// A credential ready for protocol authentication
#[derive(Debug, Clone)]
pub enum ResolvedCredential {
    /// Plain LOGIN
    Password { email: String, password: String },
    /// XOAUTH2 bearer token
    Bearer { email: String, access_token: String },
}

/// Collaborator that handles the interactive part of a first-time
/// OAuth2 login: showing the authorization URL and collecting the
/// pasted code. Injected so headless and test environments can
/// substitute their own.
pub trait InteractiveAuthorizer: Send + Sync {
    /// Present the authorization URL to the user
    fn present_url(&self, url: &str);
    /// Read the authorization code the user pasted back
    fn read_code(&self) -> AuthResult<String>;
}

/// Terminal-backed authorizer reading the code from stdin
pub struct StdinAuthorizer;

impl InteractiveAuthorizer for StdinAuthorizer {
    fn present_url(&self, url: &str) {
        println!("\nOpen this URL in a browser, sign in, and copy the code from the redirect URL:");
        println!("{}", url);
        print!("\nEnter code: ");
        let _ = std::io::stdout().flush();
    }

    fn read_code(&self) -> AuthResult<String> {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// The OAuth2 operations credential resolution drives
#[async_trait]
pub(crate) trait TokenFlow: Send {
    /// Authorization URL for the interactive login
    fn authorize_url(&mut self) -> String;
    /// Exchange a pasted code for a token pair
    async fn exchange_code(&mut self, code: String) -> AuthResult<TokenPair>;
    /// Obtain a fresh token pair through a refresh token
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair>;
}

#[async_trait]
impl TokenFlow for OAuth2Flow {
    fn authorize_url(&mut self) -> String {
        OAuth2Flow::authorize_url(self)
    }

    async fn exchange_code(&mut self, code: String) -> AuthResult<TokenPair> {
        OAuth2Flow::exchange_code(self, code).await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        OAuth2Flow::refresh(self, refresh_token).await
    }
}

/// Resolves credentials, running the OAuth2 machinery when needed
pub struct CredentialProvider {
    credential: Credential,
    authorizer: Box<dyn InteractiveAuthorizer>,
}

impl CredentialProvider {
    /// Create a provider for the given credential
    pub fn new(credential: Credential, authorizer: Box<dyn InteractiveAuthorizer>) -> Self {
        Self {
            credential,
            authorizer,
        }
    }

    /// Resolve the credential into a protocol-ready form
    ///
    /// For OAuth2 this loads the persisted token, falls back to the
    /// interactive login when no token exists, refreshes an expired
    /// token through its refresh token, and persists every new token
    /// before returning. May block on stdin during a first-time login.
    pub async fn resolve(&mut self) -> AuthResult<ResolvedCredential> {
        match &self.credential {
            Credential::Password { email, password } => Ok(ResolvedCredential::Password {
                email: email.clone(),
                password: password.clone(),
            }),
            Credential::OAuth2 {
                email,
                client_id,
                client_secret,
                token_file,
            } => {
                let store = TokenStore::new(token_file.clone());
                let mut flow =
                    OAuth2Flow::new(crate::gmail::oauth2_config(client_id, client_secret))?;
                let token = resolve_token(&mut flow, &store, self.authorizer.as_ref()).await?;

                Ok(ResolvedCredential::Bearer {
                    email: email.clone(),
                    access_token: token.access_token,
                })
            }
        }
    }
}

/// Load, interactively obtain, or refresh the token pair
///
/// Every new token version is persisted before it is returned, so the
/// on-disk file is never older than the token handed to the protocol
/// layer.
async fn resolve_token(
    flow: &mut dyn TokenFlow,
    store: &TokenStore,
    authorizer: &dyn InteractiveAuthorizer,
) -> AuthResult<TokenPair> {
    let mut token = match store.load()? {
        Some(token) => token,
        None => {
            info!("No token file found, starting interactive login");
            let url = flow.authorize_url();
            authorizer.present_url(&url);
            let raw = authorizer.read_code()?;
            let code = extract_code(&raw)?;

            let token = flow.exchange_code(code).await?;
            store.save(&token)?;
            info!("Token saved to {}", store.path().display());
            token
        }
    };

    if token.is_expired() {
        debug!("Access token expired, refreshing");
        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            AuthError::RefreshFailed("token expired and no refresh token stored".into())
        })?;
        token = flow.refresh(&refresh_token).await?;
        store.save(&token)?;
        info!("Refreshed access token persisted");
    }

    Ok(token)
}

/// Extract the authorization code from whatever the user pasted
///
/// Accepts a bare code (possibly URL-encoded) or the full redirect
/// URL containing a `code` query parameter.
fn extract_code(raw: &str) -> AuthResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AuthError::ExchangeFailed(
            "empty authorization code".to_string(),
        ));
    }

    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        Url::parse(raw)
            .map_err(|e| AuthError::ExchangeFailed(format!("invalid redirect URL: {}", e)))?
    } else {
        // Route a bare code through URL parsing to undo percent-encoding
        Url::parse(&format!("http://localhost/?code={}", raw))
            .map_err(|e| AuthError::ExchangeFailed(format!("malformed code: {}", e)))?
    };

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| AuthError::ExchangeFailed("no code in pasted input".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NoPrompt;

    impl InteractiveAuthorizer for NoPrompt {
        fn present_url(&self, _url: &str) {
            panic!("resolution must not prompt");
        }
        fn read_code(&self) -> AuthResult<String> {
            panic!("resolution must not prompt");
        }
    }

    #[derive(Default)]
    struct FakeFlow {
        exchange_calls: u32,
        refresh_calls: AtomicU32,
        last_code: Option<String>,
    }

    #[async_trait]
    impl TokenFlow for FakeFlow {
        fn authorize_url(&mut self) -> String {
            "https://auth.example.com/authorize".to_string()
        }

        async fn exchange_code(&mut self, code: String) -> AuthResult<TokenPair> {
            self.exchange_calls += 1;
            self.last_code = Some(code);
            Ok(TokenPair {
                access_token: "exchanged-access".to_string(),
                refresh_token: Some("exchanged-refresh".to_string()),
                expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            })
        }

        async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenPair {
                access_token: "refreshed-access".to_string(),
                refresh_token: Some(refresh_token.to_string()),
                expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            })
        }
    }

    fn token_expiring_in(secs: i64) -> TokenPair {
        TokenPair {
            access_token: "stale-access".to_string(),
            refresh_token: Some("stored-refresh".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + secs),
        }
    }

    #[test]
    fn test_extract_bare_code() {
        assert_eq!(extract_code("4/0AbCdEf").unwrap(), "4/0AbCdEf");
    }

    #[test]
    fn test_extract_url_encoded_code() {
        assert_eq!(extract_code("4%2F0AbCdEf").unwrap(), "4/0AbCdEf");
    }

    #[test]
    fn test_extract_code_from_redirect_url() {
        let code =
            extract_code("http://localhost/?code=4%2F0XyZ&scope=https%3A%2F%2Fmail.google.com%2F")
                .unwrap();
        assert_eq!(code, "4/0XyZ");
    }

    #[test]
    fn test_extract_code_rejects_empty_input() {
        assert!(matches!(
            extract_code("  \n"),
            Err(AuthError::ExchangeFailed(_))
        ));
    }

    #[test]
    fn test_extract_code_rejects_url_without_code() {
        assert!(matches!(
            extract_code("http://localhost/?error=access_denied"),
            Err(AuthError::ExchangeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_password_credential_passes_through() {
        let mut provider = CredentialProvider::new(
            Credential::Password {
                email: "user@example.com".to_string(),
                password: "hunter2".to_string(),
            },
            Box::new(NoPrompt),
        );

        match provider.resolve().await.unwrap() {
            ResolvedCredential::Password { email, password } => {
                assert_eq!(email, "user@example.com");
                assert_eq!(password, "hunter2");
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted_before_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&token_expiring_in(-60)).unwrap();

        let mut flow = FakeFlow::default();
        let token = resolve_token(&mut flow, &store, &NoPrompt).await.unwrap();

        assert_eq!(token.access_token, "refreshed-access");
        assert_eq!(flow.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flow.exchange_calls, 0);

        // The refreshed token hit disk before being handed out
        let persisted = store.load().unwrap().unwrap();
        assert_eq!(persisted.access_token, "refreshed-access");
        assert_eq!(persisted.refresh_token.as_deref(), Some("stored-refresh"));
    }

    #[tokio::test]
    async fn test_unexpired_token_is_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&token_expiring_in(3600)).unwrap();

        let mut flow = FakeFlow::default();
        let token = resolve_token(&mut flow, &store, &NoPrompt).await.unwrap();

        assert_eq!(token.access_token, "stale-access");
        assert_eq!(flow.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(flow.exchange_calls, 0);
    }

    #[tokio::test]
    async fn test_missing_token_file_runs_interactive_login() {
        struct PasteCode;
        impl InteractiveAuthorizer for PasteCode {
            fn present_url(&self, url: &str) {
                assert!(url.starts_with("https://"));
            }
            fn read_code(&self) -> AuthResult<String> {
                Ok("4%2F0Code".to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let mut flow = FakeFlow::default();
        let token = resolve_token(&mut flow, &store, &PasteCode).await.unwrap();

        assert_eq!(token.access_token, "exchanged-access");
        assert_eq!(flow.exchange_calls, 1);
        // The pasted code was URL-decoded before the exchange
        assert_eq!(flow.last_code.as_deref(), Some("4/0Code"));
        let persisted = store.load().unwrap().unwrap();
        assert_eq!(persisted.access_token, "exchanged-access");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let mut token = token_expiring_in(-60);
        token.refresh_token = None;
        store.save(&token).unwrap();

        let mut flow = FakeFlow::default();
        let err = resolve_token(&mut flow, &store, &NoPrompt).await.unwrap_err();

        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert_eq!(flow.refresh_calls.load(Ordering::SeqCst), 0);
    }
}
