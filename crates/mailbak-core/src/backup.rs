//! Backup scheduler
//!
//! Lists mailboxes once, applies the allow-list, then dispatches one
//! worker per mailbox gated by a counting semaphore of `max_workers`
//! slots. Every worker runs on its own authenticated session; results
//! are folded into the final report after all workers finish.

use crate::worker::{process_mailbox, MailboxReport, WorkerOptions};
use crate::{BackupConfig, BackupError, BackupResult, MessageStore, SessionFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Aggregated counts for one backup run
#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    /// Mailboxes dispatched to workers
    pub mailboxes: u64,
    /// UIDs observed across all scans
    pub scanned: u64,
    /// UIDs found missing across all scans
    pub missing: u64,
    /// Messages written to disk
    pub downloaded: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl BackupReport {
    /// Throughput in messages per second
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.downloaded as f64 / secs
        } else {
            0.0
        }
    }

    fn fold(&mut self, report: &MailboxReport) {
        self.mailboxes += 1;
        self.scanned += report.scanned;
        self.missing += report.missing;
        self.downloaded += report.stored;
    }
}

/// Run one backup across all selected mailboxes
///
/// Fatal errors (invalid configuration, failed authentication or the
/// initial listing) abort the run; everything after worker dispatch
/// is bulkheaded per mailbox.
pub async fn run_backup(
    config: &BackupConfig,
    factory: Arc<dyn SessionFactory>,
) -> BackupResult<BackupReport> {
    config.validate()?;

    // One short-lived session for the listing. Any interactive OAuth2
    // login happens here, before the first worker starts.
    let mut lister = factory.connect().await?;
    let mailboxes = lister.list_mailboxes().await?;
    if let Err(e) = lister.logout().await {
        warn!("Logout after listing failed: {}", e);
    }
    drop(lister);

    let selected: Vec<String> = mailboxes
        .into_iter()
        .map(|folder| folder.name)
        .filter(|name| {
            config.folder_allow_list.is_empty() || config.folder_allow_list.contains(name)
        })
        .collect();

    info!(
        "Starting backup with {} workers across {} mailboxes",
        config.max_workers,
        selected.len()
    );

    let started = Instant::now();
    let store = Arc::new(MessageStore::new(config.backup_dir.clone()));
    let options = Arc::new(WorkerOptions::from_config(config));
    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut handles = Vec::with_capacity(selected.len());

    for mailbox in selected {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BackupError::Internal(format!("worker slot unavailable: {}", e)))?;
        let factory = factory.clone();
        let store = store.clone();
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            let _permit = permit;

            let mut session = match factory.connect().await {
                Ok(session) => session,
                Err(e) => {
                    warn!("Skipping {}: connect failed: {}", mailbox, e);
                    return MailboxReport::skipped(mailbox);
                }
            };

            let report = process_mailbox(session.as_mut(), &store, &mailbox, &options).await;
            if let Err(e) = session.logout().await {
                warn!("Logout after {} failed: {}", report.mailbox, e);
            }
            report
        }));
    }

    let mut totals = BackupReport::default();
    for handle in handles {
        match handle.await {
            Ok(report) => totals.fold(&report),
            Err(e) => error!("Mailbox worker panicked: {}", e),
        }
    }

    totals.elapsed = started.elapsed();
    info!(
        "Backup complete: {} messages in {:.1}s ({:.2} msg/sec)",
        totals.downloaded,
        totals.elapsed.as_secs_f64(),
        totals.rate()
    );

    Ok(totals)
}
