//! Session abstraction over the wire client
//!
//! The engine talks to the server through `MailSession`, and obtains
//! sessions through `SessionFactory`. Every worker connects its own
//! independently authenticated session, so protocol command/response
//! pairs can never interleave across workers.

use crate::{BackupConfig, BackupResult};
use async_trait::async_trait;
use mailbak_auth::{CredentialProvider, InteractiveAuthorizer, ResolvedCredential};
use mailbak_imap::{Folder, ImapClient, ImapResult, MailboxSnapshot, UidPage};
use std::time::Duration;
use tokio::sync::Mutex;

/// The protocol operations the backup engine needs
#[async_trait]
pub trait MailSession: Send {
    /// List selectable mailboxes
    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Folder>>;

    /// Select a mailbox read-only and snapshot its state
    async fn examine(&mut self, mailbox: &str) -> ImapResult<MailboxSnapshot>;

    /// Fetch only the UID attribute for a closed UID range
    async fn fetch_uid_page(
        &mut self,
        start: u32,
        end: u32,
        budget: Duration,
    ) -> ImapResult<UidPage>;

    /// Fetch one message body with peek semantics; `None` on timeout
    /// or empty response
    async fn fetch_body_peek(&mut self, uid: u32, budget: Duration)
        -> ImapResult<Option<Vec<u8>>>;

    /// Close the session
    async fn logout(&mut self) -> ImapResult<()>;
}

#[async_trait]
impl MailSession for ImapClient {
    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Folder>> {
        ImapClient::list_mailboxes(self).await
    }

    async fn examine(&mut self, mailbox: &str) -> ImapResult<MailboxSnapshot> {
        ImapClient::examine(self, mailbox).await
    }

    async fn fetch_uid_page(
        &mut self,
        start: u32,
        end: u32,
        budget: Duration,
    ) -> ImapResult<UidPage> {
        ImapClient::fetch_uid_page(self, start, end, budget).await
    }

    async fn fetch_body_peek(
        &mut self,
        uid: u32,
        budget: Duration,
    ) -> ImapResult<Option<Vec<u8>>> {
        ImapClient::fetch_body_peek(self, uid, budget).await
    }

    async fn logout(&mut self) -> ImapResult<()> {
        ImapClient::logout(self).await
    }
}

/// A session behind dynamic dispatch
pub type BoxedSession = Box<dyn MailSession>;

/// Produces authenticated sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Connect and authenticate a fresh session
    async fn connect(&self) -> BackupResult<BoxedSession>;
}

/// Factory for real IMAP sessions
///
/// Resolves the credential before every connect, so an access token
/// that expired mid-run is refreshed (and persisted) before the next
/// worker authenticates.
pub struct ImapSessionFactory {
    host: String,
    port: u16,
    tls_skip_verify: bool,
    provider: Mutex<CredentialProvider>,
}

impl ImapSessionFactory {
    /// Build a factory from the run configuration
    pub fn from_config(config: &BackupConfig, authorizer: Box<dyn InteractiveAuthorizer>) -> Self {
        Self {
            host: config.imap_server.clone(),
            port: config.imap_port,
            tls_skip_verify: config.tls_skip_verify,
            provider: Mutex::new(CredentialProvider::new(config.credential(), authorizer)),
        }
    }
}

#[async_trait]
impl SessionFactory for ImapSessionFactory {
    async fn connect(&self) -> BackupResult<BoxedSession> {
        let resolved = self.provider.lock().await.resolve().await?;

        let mut client = ImapClient::new(&self.host, self.port)
            .danger_accept_invalid_certs(self.tls_skip_verify);

        match resolved {
            ResolvedCredential::Password { email, password } => {
                client.authenticate_login(&email, &password).await?;
            }
            ResolvedCredential::Bearer {
                email,
                access_token,
            } => {
                client.authenticate_xoauth2(&email, &access_token).await?;
            }
        }

        Ok(Box::new(client))
    }
}
