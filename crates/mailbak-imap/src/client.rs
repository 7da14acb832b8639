//! IMAP client implementation

use crate::{Folder, ImapError, ImapResult, MailboxSnapshot, UidPage, XOAuth2Authenticator};
use async_imap::Session;
use async_native_tls::TlsStream;
use async_std::net::TcpStream;
use futures::{Stream, StreamExt, TryStreamExt};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

// Type alias for our TLS stream
type ImapStream = TlsStream<TcpStream>;

/// Grace period for draining in-flight responses after a budget
/// expiry, so the command stream stays synchronized
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// IMAP client for backup operations
pub struct ImapClient {
    session: Option<Session<ImapStream>>,
    host: String,
    port: u16,
    accept_invalid_certs: bool,
}

impl ImapClient {
    /// Create a new IMAP client
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            session: None,
            host: host.into(),
            port,
            accept_invalid_certs: false,
        }
    }

    /// Skip TLS certificate verification (self-signed test servers)
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Open the TCP connection and complete the TLS handshake
    async fn tls_stream(&self) -> ImapResult<ImapStream> {
        info!("Connecting to {}:{}", self.host, self.port);

        let tcp_stream = TcpStream::connect(format!("{}:{}", self.host, self.port))
            .await
            .map_err(|e| ImapError::ConnectionFailed(e.to_string()))?;

        let tls_connector = async_native_tls::TlsConnector::new()
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        let tls_stream = tls_connector
            .connect(&self.host, tcp_stream)
            .await
            .map_err(|e| ImapError::TlsError(e.to_string()))?;

        debug!("TLS connection established");
        Ok(tls_stream)
    }

    /// Connect and authenticate using XOAUTH2
    pub async fn authenticate_xoauth2(
        &mut self,
        email: &str,
        access_token: &str,
    ) -> ImapResult<()> {
        let tls_stream = self.tls_stream().await?;
        let client = async_imap::Client::new(tls_stream);

        info!("Authenticating with XOAUTH2 for {}", email);

        let auth = XOAuth2Authenticator::new(email, access_token);
        let session = client
            .authenticate("XOAUTH2", auth)
            .await
            .map_err(|(e, _)| ImapError::AuthenticationFailed(e.to_string()))?;

        self.session = Some(session);
        info!("XOAUTH2 authentication successful");
        Ok(())
    }

    /// Connect and authenticate using LOGIN (username/password)
    pub async fn authenticate_login(
        &mut self,
        username: &str,
        password: &str,
    ) -> ImapResult<()> {
        let tls_stream = self.tls_stream().await?;
        let client = async_imap::Client::new(tls_stream);

        info!("Authenticating with LOGIN for {}", username);

        let session = client
            .login(username, password)
            .await
            .map_err(|(e, _)| ImapError::AuthenticationFailed(e.to_string()))?;

        self.session = Some(session);
        info!("LOGIN authentication successful");
        Ok(())
    }

    /// Get the session, returning an error if not connected
    fn session_mut(&mut self) -> ImapResult<&mut Session<ImapStream>> {
        self.session.as_mut().ok_or(ImapError::NotConnected)
    }

    /// List all selectable mailboxes
    ///
    /// Entries carrying `\Noselect` or `\NonExistent` are dropped. A
    /// stream error discards everything received so far rather than
    /// returning a silently truncated list.
    pub async fn list_mailboxes(&mut self) -> ImapResult<Vec<Folder>> {
        let session = self.session_mut()?;

        let mut stream = session
            .list(None, Some("*"))
            .await
            .map_err(|e| ImapError::ServerError(e.to_string()))?;

        let mut folders = Vec::new();

        while let Some(mailbox) = stream
            .try_next()
            .await
            .map_err(|e| ImapError::ServerError(e.to_string()))?
        {
            let delimiter = mailbox.delimiter().and_then(|d| d.chars().next());
            let attributes: Vec<String> = mailbox
                .attributes()
                .iter()
                .map(|a| format!("{:?}", a))
                .collect();

            let folder = Folder::new(mailbox.name().to_string(), delimiter, attributes);
            if folder.is_selectable() {
                folders.push(folder);
            }
        }

        debug!("Found {} selectable mailboxes", folders.len());
        Ok(folders)
    }

    /// Select a mailbox read-only and snapshot its state
    pub async fn examine(&mut self, mailbox: &str) -> ImapResult<MailboxSnapshot> {
        let session = self.session_mut()?;

        let status = session
            .examine(mailbox)
            .await
            .map_err(|e| ImapError::MailboxNotFound(format!("{}: {}", mailbox, e)))?;

        let snapshot = MailboxSnapshot {
            exists: status.exists,
            // A server that withholds UIDNEXT still has at most
            // `exists` messages assigned
            uid_next: status.uid_next.unwrap_or(status.exists + 1),
            uid_validity: status.uid_validity,
        };

        debug!(
            "Examined {} with {} messages (uidnext {})",
            mailbox, snapshot.exists, snapshot.uid_next
        );

        Ok(snapshot)
    }

    /// Fetch only the UID attribute for a closed UID range
    ///
    /// Bounded by `budget`; on expiry the page is returned with the
    /// UIDs observed so far and `complete = false`, after draining
    /// any in-flight responses.
    pub async fn fetch_uid_page(
        &mut self,
        start: u32,
        end: u32,
        budget: Duration,
    ) -> ImapResult<UidPage> {
        let session = self.session_mut()?;
        let range = format!("{}:{}", start, end);

        let mut stream = session
            .uid_fetch(&range, "UID")
            .await
            .map_err(|e| ImapError::ServerError(e.to_string()))?;

        let deadline = Instant::now() + budget;
        let mut uids = Vec::new();
        let mut complete = true;

        loop {
            match timeout_at(deadline, stream.try_next()).await {
                Ok(Ok(Some(fetch))) => {
                    if let Some(uid) = fetch.uid {
                        uids.push(uid);
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    warn!("UID fetch {} failed: {}", range, e);
                    complete = false;
                    drain_stream(&mut stream, DRAIN_GRACE).await;
                    break;
                }
                Err(_) => {
                    warn!("UID fetch {} hit its {:?} budget", range, budget);
                    complete = false;
                    drain_stream(&mut stream, DRAIN_GRACE).await;
                    break;
                }
            }
        }

        Ok(UidPage { uids, complete })
    }

    /// Fetch the body of exactly one UID with peek semantics
    ///
    /// Returns `None` when the fetch times out or the server sends no
    /// body, so the caller can skip the message and move on. The
    /// message is never marked read on the server.
    pub async fn fetch_body_peek(
        &mut self,
        uid: u32,
        budget: Duration,
    ) -> ImapResult<Option<Vec<u8>>> {
        let session = self.session_mut()?;

        let mut stream = session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| ImapError::ServerError(e.to_string()))?;

        let deadline = Instant::now() + budget;
        let mut body = None;

        loop {
            match timeout_at(deadline, stream.try_next()).await {
                Ok(Ok(Some(fetch))) => {
                    if body.is_none() {
                        body = fetch.body().map(|b| b.to_vec());
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    drain_stream(&mut stream, DRAIN_GRACE).await;
                    return Err(ImapError::ServerError(e.to_string()));
                }
                Err(_) => {
                    debug!("Body fetch for UID {} hit its {:?} budget", uid, budget);
                    drain_stream(&mut stream, DRAIN_GRACE).await;
                    return Ok(None);
                }
            }
        }

        Ok(body)
    }

    /// Close the connection
    pub async fn logout(&mut self) -> ImapResult<()> {
        if let Some(mut session) = self.session.take() {
            session
                .logout()
                .await
                .map_err(|e| ImapError::ServerError(e.to_string()))?;
        }
        Ok(())
    }
}

/// Consume and discard the remainder of a response stream
///
/// Leaving unread responses on the wire would desynchronize the next
/// command, so give the server a short grace period to finish.
async fn drain_stream<T, E, S>(stream: &mut S, grace: Duration)
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    let deadline = Instant::now() + grace;
    loop {
        match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => {
                debug!("Drain grace period expired with responses still in flight");
                break;
            }
        }
    }
}
