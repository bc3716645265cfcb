//! Transfer client and signals.
//!
//! A [`SyncSignal`] is a "notify every registered handler" fan-out
//! primitive, specialized to hold the three signals -- `started`,
//! `in_progress`, `completed` -- that make up a [`SyncSignalGroup`].

use std::collections::BTreeMap;
use std::sync::Arc;

use morango_core::TransferSession;
use parking_lot::RwLock;

/// Arbitrary key-value payload carried by a fired signal.
pub type SignalPayload = BTreeMap<String, String>;

fn merge(defaults: &SignalPayload, kwargs: &SignalPayload) -> SignalPayload {
    let mut merged = defaults.clone();
    merged.extend(kwargs.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Receives fired [`SyncSignal`] events.
pub trait SyncSignalHandler: Send + Sync {
    fn handle(&self, payload: &SignalPayload);
}

/// One named signal: an ordered list of handlers, fired in registration order.
#[derive(Default)]
pub struct SyncSignal {
    handlers: RwLock<Vec<Arc<dyn SyncSignalHandler>>>,
}

impl SyncSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, handler: Arc<dyn SyncSignalHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn fire(&self, payload: &SignalPayload) {
        for handler in self.handlers.read().iter() {
            handler.handle(payload);
        }
    }
}

/// `started`/`in_progress`/`completed` triple around one stage of a transfer.
#[derive(Default)]
pub struct SyncSignalGroup {
    pub started: SyncSignal,
    pub in_progress: SyncSignal,
    pub completed: SyncSignal,
}

impl SyncSignalGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `started` before `scope` runs and `completed` after, even if
    /// `scope` returns an error. `in_progress` is not fired here -- callers
    /// fire it themselves from within `scope` as work progresses.
    pub fn send<T, E>(&self, defaults: &SignalPayload, kwargs: &SignalPayload, scope: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let payload = merge(defaults, kwargs);
        self.started.fire(&payload);
        let result = scope();
        self.completed.fire(&payload);
        result
    }
}

/// Holds at most one live [`TransferSession`] plus the four signal groups
/// fired around `session`, `queuing`, `transferring`, and `dequeuing`.
#[derive(Default)]
pub struct TransferClient {
    current_transfer_session: RwLock<Option<TransferSession>>,
    pub session: SyncSignalGroup,
    pub queuing: SyncSignalGroup,
    pub transferring: SyncSignalGroup,
    pub dequeuing: SyncSignalGroup,
}

impl TransferClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<TransferSession> {
        self.current_transfer_session.read().clone()
    }

    pub fn set_current(&self, session: TransferSession) {
        *self.current_transfer_session.write() = Some(session);
    }

    pub fn clear_current(&self) {
        *self.current_transfer_session.write() = None;
    }
}
