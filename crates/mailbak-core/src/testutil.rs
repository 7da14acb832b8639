//! Scripted in-memory server for engine tests
//!
//! `FakeAccount` holds mailbox fixtures plus a log of every select
//! and body fetch, `FakeSession` implements `MailSession` against it,
//! and `FakeFactory` hands out sessions while tracking how many are
//! alive at once.

use crate::{BackupResult, BoxedSession, MailSession, SessionFactory};
use async_trait::async_trait;
use mailbak_imap::{Folder, ImapError, ImapResult, MailboxSnapshot, UidPage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted mailbox
#[derive(Debug, Clone, Default)]
pub struct FakeMailbox {
    /// UIDs present on the "server", ascending
    pub uids: Vec<u32>,
    /// Number of examine attempts that fail before one succeeds
    pub select_failures: u32,
    /// UIDs whose body fetch returns a protocol error
    pub fail_uids: HashSet<u32>,
    /// UIDs whose body fetch returns no body
    pub empty_uids: HashSet<u32>,
    /// Simulate a scan budget expiry after this many observed UIDs
    pub truncate_scan_after: Option<usize>,
}

impl FakeMailbox {
    pub fn with_uids(uids: Vec<u32>) -> Self {
        Self {
            uids,
            ..Default::default()
        }
    }

    /// Deterministic body bytes for a UID
    pub fn body_for(uid: u32) -> Vec<u8> {
        format!("Subject: message {}\r\n\r\nbody {}\r\n", uid, uid).into_bytes()
    }
}

#[derive(Debug, Default)]
struct AccountState {
    mailboxes: Vec<(String, FakeMailbox)>,
    select_attempts: Vec<(String, u32)>,
    fetched: Vec<(String, u32)>,
}

impl AccountState {
    fn mailbox(&self, name: &str) -> Option<&FakeMailbox> {
        self.mailboxes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    fn bump_select(&mut self, name: &str) -> u32 {
        if let Some(entry) = self.select_attempts.iter_mut().find(|(n, _)| n == name) {
            entry.1 += 1;
            entry.1
        } else {
            self.select_attempts.push((name.to_string(), 1));
            1
        }
    }
}

/// Scripted account shared by sessions and assertions
#[derive(Clone, Default)]
pub struct FakeAccount {
    state: Arc<Mutex<AccountState>>,
}

impl FakeAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mailbox(&self, name: impl Into<String>, mailbox: FakeMailbox) {
        self.state
            .lock()
            .unwrap()
            .mailboxes
            .push((name.into(), mailbox));
    }

    /// Open a session directly, bypassing the factory
    pub fn session(&self) -> FakeSession {
        FakeSession {
            state: self.state.clone(),
            selected: None,
            scan_observed: 0,
            probe: None,
        }
    }

    /// How many times a mailbox was examined
    pub fn select_attempts(&self, name: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .select_attempts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// UIDs whose bodies were requested from a mailbox, in order
    pub fn fetched_uids(&self, name: &str) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .fetched
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, uid)| *uid)
            .collect()
    }
}

/// A `MailSession` over a `FakeAccount`
pub struct FakeSession {
    state: Arc<Mutex<AccountState>>,
    selected: Option<String>,
    scan_observed: usize,
    probe: Option<Arc<SessionProbe>>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Some(probe) = &self.probe {
            probe.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl MailSession for FakeSession {
    async fn list_mailboxes(&mut self) -> ImapResult<Vec<Folder>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .mailboxes
            .iter()
            .map(|(name, _)| Folder::new(name.clone(), Some('/'), Vec::new()))
            .collect())
    }

    async fn examine(&mut self, mailbox: &str) -> ImapResult<MailboxSnapshot> {
        let mut state = self.state.lock().unwrap();
        let attempts = state.bump_select(mailbox);
        let fixture = state
            .mailbox(mailbox)
            .ok_or_else(|| ImapError::MailboxNotFound(mailbox.to_string()))?;

        if attempts <= fixture.select_failures {
            return Err(ImapError::ServerError("scripted select failure".into()));
        }

        let snapshot = MailboxSnapshot {
            exists: fixture.uids.len() as u32,
            uid_next: fixture.uids.iter().max().copied().unwrap_or(0) + 1,
            uid_validity: Some(1),
        };
        drop(state);

        self.selected = Some(mailbox.to_string());
        self.scan_observed = 0;
        Ok(snapshot)
    }

    async fn fetch_uid_page(
        &mut self,
        start: u32,
        end: u32,
        _budget: Duration,
    ) -> ImapResult<UidPage> {
        let selected = self.selected.clone().ok_or(ImapError::NotConnected)?;
        let state = self.state.lock().unwrap();
        let fixture = state
            .mailbox(&selected)
            .ok_or_else(|| ImapError::MailboxNotFound(selected.clone()))?;

        let mut uids: Vec<u32> = fixture
            .uids
            .iter()
            .copied()
            .filter(|uid| *uid >= start && *uid <= end)
            .collect();

        let mut complete = true;
        if let Some(limit) = fixture.truncate_scan_after {
            let remaining = limit.saturating_sub(self.scan_observed);
            if uids.len() > remaining {
                uids.truncate(remaining);
                complete = false;
            }
        }
        drop(state);

        self.scan_observed += uids.len();
        Ok(UidPage { uids, complete })
    }

    async fn fetch_body_peek(
        &mut self,
        uid: u32,
        _budget: Duration,
    ) -> ImapResult<Option<Vec<u8>>> {
        let selected = self.selected.clone().ok_or(ImapError::NotConnected)?;
        let mut state = self.state.lock().unwrap();
        state.fetched.push((selected.clone(), uid));

        let fixture = state
            .mailbox(&selected)
            .ok_or_else(|| ImapError::MailboxNotFound(selected.clone()))?;

        if fixture.fail_uids.contains(&uid) {
            return Err(ImapError::ServerError("scripted fetch failure".into()));
        }
        if fixture.empty_uids.contains(&uid) || !fixture.uids.contains(&uid) {
            return Ok(None);
        }
        Ok(Some(FakeMailbox::body_for(uid)))
    }

    async fn logout(&mut self) -> ImapResult<()> {
        self.selected = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionProbe {
    active: AtomicUsize,
    max_active: AtomicUsize,
    connects: AtomicUsize,
}

/// Factory over a `FakeAccount` with a concurrency high-water mark
pub struct FakeFactory {
    state: Arc<Mutex<AccountState>>,
    probe: Arc<SessionProbe>,
}

impl FakeFactory {
    pub fn new(account: &FakeAccount) -> Self {
        Self {
            state: account.state.clone(),
            probe: Arc::new(SessionProbe::default()),
        }
    }

    /// Most sessions alive at any one time
    pub fn max_active_sessions(&self) -> usize {
        self.probe.max_active.load(Ordering::SeqCst)
    }

    /// Total connect calls
    pub fn total_connects(&self) -> usize {
        self.probe.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn connect(&self) -> BackupResult<BoxedSession> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            selected: None,
            scan_observed: 0,
            probe: Some(self.probe.clone()),
        }))
    }
}
