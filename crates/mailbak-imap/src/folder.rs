//! Mailbox listing and scan result types

/// A mailbox entry from the server's LIST response
#[derive(Debug, Clone)]
pub struct Folder {
    /// Full hierarchical name (e.g. `[Gmail]/All Mail`)
    pub name: String,
    /// Hierarchy delimiter reported by the server
    pub delimiter: Option<char>,
    /// Raw attribute strings from the LIST response
    pub attributes: Vec<String>,
}

impl Folder {
    /// Create a folder from a LIST response entry
    pub fn new(name: String, delimiter: Option<char>, attributes: Vec<String>) -> Self {
        Self {
            name,
            delimiter,
            attributes,
        }
    }

    /// Check if this mailbox can be selected
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            let lower = a.to_lowercase();
            lower == "\\noselect" || lower == "\\nonexistent"
        })
    }
}

/// State of a mailbox at selection time
#[derive(Debug, Clone, Copy)]
pub struct MailboxSnapshot {
    /// Number of messages in the mailbox
    pub exists: u32,
    /// Exclusive upper bound on UIDs assigned so far
    pub uid_next: u32,
    /// UIDVALIDITY reported by the server
    pub uid_validity: Option<u32>,
}

/// Result of a UID-only range fetch
#[derive(Debug, Clone, Default)]
pub struct UidPage {
    /// UIDs observed, in the order the server returned them
    pub uids: Vec<u32>,
    /// False when the fetch hit its time budget or a stream error
    /// and the page may be truncated
    pub complete: bool,
}
