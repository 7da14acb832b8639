//! IMAP protocol boundary for mailbak
//!
//! Provides the async TLS IMAP client used by the backup engine:
//! LOGIN and XOAUTH2 authentication, selectable-mailbox listing,
//! read-only selects, UID-only range fetches with a time budget, and
//! peeked single-message body fetches.

mod client;
mod error;
mod folder;
mod xoauth2;

pub use client::ImapClient;
pub use error::{ImapError, ImapResult};
pub use folder::{Folder, MailboxSnapshot, UidPage};
pub use xoauth2::XOAuth2Authenticator;
