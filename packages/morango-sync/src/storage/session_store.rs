//! Persistence for [`SyncSession`]/[`TransferSession`] rows themselves,
//! separate from [`morango_core::SyncRepository`] (which only covers
//! Store/RMC/DMC/Buffer). Stage middleware reads and writes through this so
//! that `records_total`/`records_transferred` stay current even though a
//! [`crate::context::SessionContext`]'s own `transfer_session` field is
//! write-once.

use dashmap::DashMap;
use morango_core::{SyncSession, TransferSession};

/// CRUD surface over the two session kinds.
pub trait SessionStore: Send + Sync {
    fn get_sync_session(&self, id: &str) -> Option<SyncSession>;
    fn put_sync_session(&self, session: SyncSession);

    fn get_transfer_session(&self, id: &str) -> Option<TransferSession>;
    fn put_transfer_session(&self, session: TransferSession);
}

/// Default in-process implementation.
#[derive(Default)]
pub struct InMemorySessionStore {
    sync_sessions: DashMap<String, SyncSession>,
    transfer_sessions: DashMap<String, TransferSession>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_sync_session(&self, id: &str) -> Option<SyncSession> {
        self.sync_sessions.get(id).map(|entry| entry.clone())
    }

    fn put_sync_session(&self, session: SyncSession) {
        self.sync_sessions.insert(session.id.clone(), session);
    }

    fn get_transfer_session(&self, id: &str) -> Option<TransferSession> {
        self.transfer_sessions.get(id).map(|entry| entry.clone())
    }

    fn put_transfer_session(&self, session: TransferSession) {
        self.transfer_sessions.insert(session.id.clone(), session);
    }
}
