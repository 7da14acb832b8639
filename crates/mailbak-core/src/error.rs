//! Error types for the backup engine

use thiserror::Error;

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

/// Errors that are fatal to a backup run
///
/// Worker-local failures (select, scan, fetch) never surface here;
/// they degrade to a skipped mailbox or message and the run continues.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Configuration does not satisfy the credential invariants
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Credential resolution failed
    #[error("Authentication error: {0}")]
    Auth(#[from] mailbak_auth::AuthError),

    /// Protocol failure before any worker started
    #[error("IMAP error: {0}")]
    Protocol(#[from] mailbak_imap::ImapError),

    /// Cron schedule could not be parsed or yields no runs
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// Scheduler-internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}
