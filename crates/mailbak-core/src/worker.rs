//! Per-mailbox worker
//!
//! State machine per mailbox: SELECT → SCAN → (empty? → DONE) →
//! DOWNLOAD(n) → DONE. Select and scan are retried with linear
//! backoff; a mailbox that stays unselectable is skipped, never a run
//! failure. Each download iteration is independent — one bad UID
//! never aborts the rest.

use crate::fetch::{fetch_and_store, FetchOptions, FetchOutcome};
use crate::scan::{scan_missing, ScanOptions, ScanOutcome};
use crate::{BackupConfig, MailSession, MessageStore};
use mailbak_imap::MailboxSnapshot;
use std::time::Duration;
use tracing::{info, warn};

/// Worker tuning knobs
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Scan knobs
    pub scan: ScanOptions,
    /// Fetch knobs
    pub fetch: FetchOptions,
    /// Attempts for select and scan before skipping the mailbox
    pub attempts: u32,
    /// Base backoff unit; attempt n waits n times this
    pub backoff: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            fetch: FetchOptions::default(),
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl WorkerOptions {
    /// Derive worker options from the run configuration
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            scan: ScanOptions {
                chunk_size: config.scan_chunk_size,
                chunk_budget: config.scan_chunk_budget,
            },
            fetch: FetchOptions {
                budget: config.fetch_budget,
                pacing: config.pacing,
                dry_run: config.dry_run,
            },
            ..Default::default()
        }
    }
}

/// Terminal counts for one mailbox
#[derive(Debug, Clone, Default)]
pub struct MailboxReport {
    /// Mailbox name
    pub mailbox: String,
    /// UIDs observed by the scan
    pub scanned: u64,
    /// UIDs with no local file
    pub missing: u64,
    /// Messages written to disk
    pub stored: u64,
}

impl MailboxReport {
    /// Report for a mailbox that was skipped outright
    pub fn skipped(mailbox: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.into(),
            ..Default::default()
        }
    }
}

/// Run one mailbox end-to-end on an exclusively owned session
pub async fn process_mailbox(
    session: &mut dyn MailSession,
    store: &MessageStore,
    mailbox: &str,
    options: &WorkerOptions,
) -> MailboxReport {
    info!("Processing: {}", mailbox);

    let snapshot = match select_with_retry(session, mailbox, options).await {
        Some(snapshot) => snapshot,
        None => {
            info!("Skipping {}: SELECT failed", mailbox);
            return MailboxReport::skipped(mailbox);
        }
    };

    if snapshot.exists == 0 {
        info!("Skipping {}: empty", mailbox);
        return MailboxReport::skipped(mailbox);
    }

    info!(
        "{}: {} messages (UID range 1-{})",
        mailbox,
        snapshot.exists,
        snapshot.uid_next.saturating_sub(1)
    );

    if !options.fetch.dry_run {
        if let Err(e) = store.ensure_mailbox_dir(mailbox) {
            warn!("Failed to create dir for {}: {}", mailbox, e);
            return MailboxReport::skipped(mailbox);
        }
    }

    let scan = match scan_with_retry(session, &snapshot, store, mailbox, options).await {
        Some(scan) => scan,
        None => {
            info!("Skipping {}: scan failed", mailbox);
            return MailboxReport::skipped(mailbox);
        }
    };

    let mut report = MailboxReport {
        mailbox: mailbox.to_string(),
        scanned: scan.scanned,
        missing: scan.missing.len() as u64,
        stored: 0,
    };

    if scan.missing.is_empty() {
        info!(
            "{}: nothing new to download ({} scanned)",
            mailbox, report.scanned
        );
        return report;
    }

    info!(
        "{}: found {} missing messages, downloading",
        mailbox,
        scan.missing.len()
    );

    for (i, uid) in scan.missing.iter().enumerate() {
        if i > 0 && i % 20 == 0 {
            info!(
                "  {}: downloading {}/{} ({}%)",
                mailbox,
                i,
                scan.missing.len(),
                100 * i / scan.missing.len()
            );
        }

        if fetch_and_store(session, store, mailbox, *uid, &options.fetch).await
            == FetchOutcome::Stored
        {
            report.stored += 1;
        }
    }

    info!(
        "{} complete: {}/{} saved",
        mailbox, report.stored, report.missing
    );
    report
}

/// Read-only select with linear backoff (1s, 2s between 3 attempts)
async fn select_with_retry(
    session: &mut dyn MailSession,
    mailbox: &str,
    options: &WorkerOptions,
) -> Option<MailboxSnapshot> {
    for attempt in 1..=options.attempts {
        match session.examine(mailbox).await {
            Ok(snapshot) => return Some(snapshot),
            Err(e) => {
                warn!(
                    "SELECT {} failed (attempt {}/{}): {}",
                    mailbox, attempt, options.attempts, e
                );
                if attempt < options.attempts {
                    tokio::time::sleep(options.backoff * attempt).await;
                }
            }
        }
    }
    None
}

/// Scan with the same retry discipline as select
async fn scan_with_retry(
    session: &mut dyn MailSession,
    snapshot: &MailboxSnapshot,
    store: &MessageStore,
    mailbox: &str,
    options: &WorkerOptions,
) -> Option<ScanOutcome> {
    for attempt in 1..=options.attempts {
        match scan_missing(session, snapshot, store, mailbox, &options.scan).await {
            Ok(outcome) => return Some(outcome),
            Err(e) => {
                warn!(
                    "Scan of {} failed (attempt {}/{}): {}",
                    mailbox, attempt, options.attempts, e
                );
                if attempt < options.attempts {
                    tokio::time::sleep(options.backoff * attempt).await;
                }
            }
        }
    }
    None
}
