//! UID-diff incremental scan
//!
//! Determines which UIDs in a selected mailbox have no file on disk
//! yet, without downloading any bodies. The UID space `[1, uidNext-1]`
//! is walked in fixed-size chunks; chunking bounds per-request memory
//! and gives partial progress, but never changes the result set.

use crate::{MailSession, MessageStore};
use mailbak_imap::{ImapResult, MailboxSnapshot};
use std::time::Duration;
use tracing::{debug, warn};

/// Scan tuning knobs
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// UID range width per fetch request
    pub chunk_size: u32,
    /// Time budget per chunk
    pub chunk_budget: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_budget: Duration::from_secs(30),
        }
    }
}

/// Result of scanning one mailbox
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// UIDs observed on the server
    pub scanned: u64,
    /// Observed UIDs with no file on disk, in server order
    pub missing: Vec<u32>,
    /// False when a chunk budget expired and the scan stopped early;
    /// the missing set is then the partial pool for this run
    pub complete: bool,
}

/// Scan a selected mailbox for UIDs missing from local storage
///
/// Never downloads a body; only UID membership is checked. On a chunk
/// budget expiry the UIDs observed so far are treated as the complete
/// pool for this run — unobserved ones are picked up by the next run.
pub async fn scan_missing(
    session: &mut dyn MailSession,
    snapshot: &MailboxSnapshot,
    store: &MessageStore,
    mailbox: &str,
    options: &ScanOptions,
) -> ImapResult<ScanOutcome> {
    let mut outcome = ScanOutcome {
        complete: true,
        ..Default::default()
    };

    if snapshot.uid_next <= 1 {
        return Ok(outcome);
    }
    let last = snapshot.uid_next - 1;
    let chunk = options.chunk_size.max(1);
    let total_chunks = (u64::from(last) + u64::from(chunk) - 1) / u64::from(chunk);

    let mut start = 1u32;
    let mut index = 0u64;
    loop {
        let end = start.saturating_add(chunk - 1).min(last);
        index += 1;
        debug!(
            "[{}] scan chunk {}/{} (UIDs {}-{}) {}%",
            mailbox,
            index,
            total_chunks,
            start,
            end,
            100 * u64::from(start) / u64::from(snapshot.uid_next)
        );

        let page = session
            .fetch_uid_page(start, end, options.chunk_budget)
            .await?;

        outcome.scanned += page.uids.len() as u64;
        for uid in page.uids {
            if !store.contains(mailbox, uid) {
                outcome.missing.push(uid);
            }
        }

        if !page.complete {
            warn!(
                "[{}] scan stopped early after {} UIDs, deferring the rest to the next run",
                mailbox, outcome.scanned
            );
            outcome.complete = false;
            break;
        }

        if end == last {
            break;
        }
        start = end + 1;
    }

    Ok(outcome)
}
