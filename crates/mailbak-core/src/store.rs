//! Local message store
//!
//! One file per downloaded message at
//! `{backupDir}/{mailboxNameWithSlashesReplacedByUnderscore}/{uid}.eml`.
//! A path is written at most once: the scanner checks existence before
//! a fetch is ever attempted, and writes go through a temp file and
//! rename so a crash never leaves a truncated `.eml` behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem-backed store keyed by `{mailbox, uid}`
#[derive(Debug, Clone)]
pub struct MessageStore {
    root: PathBuf,
}

impl MessageStore {
    /// Create a store rooted at the given backup directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root backup directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one mailbox's messages
    pub fn mailbox_dir(&self, mailbox: &str) -> PathBuf {
        self.root.join(sanitize_mailbox(mailbox))
    }

    /// Path of one message file
    pub fn message_path(&self, mailbox: &str, uid: u32) -> PathBuf {
        self.mailbox_dir(mailbox).join(format!("{}.eml", uid))
    }

    /// Whether a message is already present on disk
    pub fn contains(&self, mailbox: &str, uid: u32) -> bool {
        self.message_path(mailbox, uid).exists()
    }

    /// Create the mailbox directory if absent
    pub fn ensure_mailbox_dir(&self, mailbox: &str) -> io::Result<()> {
        fs::create_dir_all(self.mailbox_dir(mailbox))
    }

    /// Write a message body atomically
    pub fn write(&self, mailbox: &str, uid: u32, body: &[u8]) -> io::Result<PathBuf> {
        let path = self.message_path(mailbox, uid);
        let tmp = path.with_extension("eml.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

/// Map a hierarchical mailbox name to a flat directory name
fn sanitize_mailbox(mailbox: &str) -> String {
    mailbox.replace('/', "_")
}
