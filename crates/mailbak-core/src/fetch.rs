//! Single-message fetch and store
//!
//! Downloads one UID with peek semantics and writes it atomically.
//! Every failure mode degrades to a skip: the scan on the next run
//! finds the UID still missing and retries, so nothing is lost.

use crate::{MailSession, MessageStore};
use std::time::Duration;
use tracing::debug;

/// Fetch tuning knobs
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Time budget per message
    pub budget: Duration,
    /// Fixed delay after every store attempt
    pub pacing: Duration,
    /// Skip the final write and counting
    pub dry_run: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(15),
            pacing: Duration::from_millis(50),
            dry_run: false,
        }
    }
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written to disk
    Stored,
    /// Timed out, empty, failed, or dry run; retried on the next run
    Skipped,
}

/// Fetch one UID and write it to the store
///
/// Never fails the caller: timeouts, empty bodies, protocol errors
/// and write errors are logged at debug level and reported as
/// `Skipped`. The pacing delay is applied after every attempt.
pub async fn fetch_and_store(
    session: &mut dyn MailSession,
    store: &MessageStore,
    mailbox: &str,
    uid: u32,
    options: &FetchOptions,
) -> FetchOutcome {
    let outcome = match session.fetch_body_peek(uid, options.budget).await {
        Ok(Some(body)) => {
            if options.dry_run {
                debug!("Dry run: would store UID {} ({} bytes)", uid, body.len());
                FetchOutcome::Skipped
            } else {
                match store.write(mailbox, uid, &body) {
                    Ok(_) => FetchOutcome::Stored,
                    Err(e) => {
                        debug!("Write failed for UID {}: {}", uid, e);
                        FetchOutcome::Skipped
                    }
                }
            }
        }
        Ok(None) => {
            debug!("Empty or timed-out body for UID {}", uid);
            FetchOutcome::Skipped
        }
        Err(e) => {
            debug!("Fetch failed for UID {}: {}", uid, e);
            FetchOutcome::Skipped
        }
    };

    // Politeness delay toward server rate limits
    tokio::time::sleep(options.pacing).await;

    outcome
}
