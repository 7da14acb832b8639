//! Backup engine for mailbak
//!
//! Incrementally mirrors a remote account to local disk: scans each
//! mailbox for UIDs with no corresponding file under the backup
//! directory and downloads only those, so repeated runs are cheap and
//! never re-fetch what is already saved.

mod backup;
mod config;
mod error;
mod fetch;
mod scan;
mod schedule;
mod session;
mod store;
mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use backup::{run_backup, BackupReport};
pub use config::BackupConfig;
pub use error::{BackupError, BackupResult};
pub use fetch::{fetch_and_store, FetchOptions, FetchOutcome};
pub use scan::{scan_missing, ScanOptions, ScanOutcome};
pub use schedule::{parse_schedule, run_scheduled};
pub use session::{BoxedSession, ImapSessionFactory, MailSession, SessionFactory};
pub use store::MessageStore;
pub use worker::{process_mailbox, MailboxReport, WorkerOptions};
