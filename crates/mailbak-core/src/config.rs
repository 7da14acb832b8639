//! Backup run configuration

use crate::{BackupError, BackupResult};
use mailbak_auth::Credential;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a backup run
///
/// Exactly one credential variant must be configured: either
/// `password`, or `client_id` together with `client_secret`.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Account email address (always required)
    pub email: String,
    /// Static password credential
    pub password: Option<String>,
    /// OAuth2 client ID
    pub client_id: Option<String>,
    /// OAuth2 client secret
    pub client_secret: Option<String>,
    /// Path of the persisted OAuth2 token file
    pub token_file: PathBuf,
    /// Root directory for downloaded messages
    pub backup_dir: PathBuf,
    /// IMAP server hostname
    pub imap_server: String,
    /// IMAP server port
    pub imap_port: u16,
    /// Mailboxes to process; empty means all
    pub folder_allow_list: HashSet<String>,
    /// Maximum concurrently processed mailboxes
    pub max_workers: usize,
    /// Perform every step except writes and counting
    pub dry_run: bool,
    /// Skip TLS certificate verification
    pub tls_skip_verify: bool,
    /// Optional 5-field cron expression for repeated runs
    pub cron_schedule: Option<String>,
    /// UID range width per scan request
    pub scan_chunk_size: u32,
    /// Time budget per scan chunk
    pub scan_chunk_budget: Duration,
    /// Time budget per single-message fetch
    pub fetch_budget: Duration,
    /// Fixed delay after every store attempt
    pub pacing: Duration,
}

impl BackupConfig {
    /// Configuration with defaults for the given account
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: None,
            client_id: None,
            client_secret: None,
            token_file: PathBuf::from("token.json"),
            backup_dir: PathBuf::from("./backups"),
            imap_server: "imap.gmail.com".to_string(),
            imap_port: 993,
            folder_allow_list: HashSet::new(),
            max_workers: 1,
            dry_run: false,
            tls_skip_verify: false,
            cron_schedule: None,
            scan_chunk_size: 1000,
            scan_chunk_budget: Duration::from_secs(30),
            fetch_budget: Duration::from_secs(15),
            pacing: Duration::from_millis(50),
        }
    }

    /// Validate the credential invariants and engine knobs
    pub fn validate(&self) -> BackupResult<()> {
        if self.email.is_empty() {
            return Err(BackupError::ConfigInvalid("email is required".into()));
        }

        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        let has_oauth = self.client_id.as_deref().is_some_and(|c| !c.is_empty())
            && self.client_secret.as_deref().is_some_and(|s| !s.is_empty());

        match (has_password, has_oauth) {
            (false, false) => {
                return Err(BackupError::ConfigInvalid(
                    "either a password or client_id + client_secret is required".into(),
                ))
            }
            (true, true) => {
                return Err(BackupError::ConfigInvalid(
                    "configure either a password or an OAuth2 client, not both".into(),
                ))
            }
            _ => {}
        }

        if self.max_workers < 1 {
            return Err(BackupError::ConfigInvalid("max_workers must be >= 1".into()));
        }
        if self.scan_chunk_size == 0 {
            return Err(BackupError::ConfigInvalid(
                "scan_chunk_size must be >= 1".into(),
            ));
        }

        Ok(())
    }

    /// The configured credential variant
    ///
    /// Call `validate` first; an unvalidated config falls back to the
    /// password variant with an empty password.
    pub fn credential(&self) -> Credential {
        match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Credential::OAuth2 {
                    email: self.email.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    token_file: self.token_file.clone(),
                }
            }
            _ => Credential::Password {
                email: self.email.clone(),
                password: self.password.clone().unwrap_or_default(),
            },
        }
    }
}
