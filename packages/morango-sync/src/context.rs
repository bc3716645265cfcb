//! Session context: the write-once/mutable field split that
//! every middleware and the controller read and update through one stage of
//! a transfer.
//!
//! `LocalSessionContext` never leaves the process; `NetworkSessionContext`
//! additionally owns (but never serializes) a live connection handle.

use std::sync::Arc;

use morango_core::{Filter, MorangoError, SyncSession, TransferSession, TransferStage, TransferStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::transport::NetworkSyncConnection;

/// Plain-record encoding of a context, suitable for wire transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWire {
    pub sync_session_id: Option<String>,
    pub transfer_session_id: Option<String>,
    pub stage: TransferStage,
    pub stage_status: TransferStatus,
    pub capabilities: Vec<String>,
    pub is_push: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_server: Option<bool>,
    pub error: Option<String>,
}

struct ContextState {
    sync_session: Option<SyncSession>,
    transfer_session: Option<TransferSession>,
    filter: Option<Filter>,
    is_push: Option<bool>,
    stage: TransferStage,
    stage_status: TransferStatus,
    capabilities: Vec<String>,
    error: Option<String>,
}

impl ContextState {
    fn new() -> Self {
        Self {
            sync_session: None,
            transfer_session: None,
            filter: None,
            is_push: None,
            stage: TransferStage::Initializing,
            stage_status: TransferStatus::Pending,
            capabilities: Vec::new(),
            error: None,
        }
    }
}

/// The common read/write surface both context flavors expose to middleware.
pub trait SessionContext: Send + Sync {
    fn stage(&self) -> TransferStage;
    fn set_stage(&self, stage: TransferStage);
    fn stage_status(&self) -> TransferStatus;
    fn set_stage_status(&self, status: TransferStatus);

    fn sync_session(&self) -> Option<SyncSession>;

    /// # Errors
    /// Returns [`MorangoError::ContextUpdate`] if `sync_session` is already set.
    fn set_sync_session(&self, session: SyncSession) -> Result<(), MorangoError>;

    fn transfer_session(&self) -> Option<TransferSession>;

    /// # Errors
    /// Returns [`MorangoError::ContextUpdate`] if `transfer_session` is already set.
    fn set_transfer_session(&self, session: TransferSession) -> Result<(), MorangoError>;

    /// `transfer_session.filter` when a transfer session is attached,
    /// otherwise the externally supplied filter set via [`Self::set_filter`].
    fn filter(&self) -> Filter;

    /// # Errors
    /// Returns [`MorangoError::ContextUpdate`] if the filter is already set.
    fn set_filter(&self, filter: Filter) -> Result<(), MorangoError>;

    fn is_push(&self) -> Option<bool>;

    /// # Errors
    /// Returns [`MorangoError::ContextUpdate`] if `is_push` is already set.
    fn set_is_push(&self, push: bool) -> Result<(), MorangoError>;

    fn capabilities(&self) -> Vec<String>;
    fn set_capabilities(&self, capabilities: Vec<String>);

    fn error(&self) -> Option<String>;
    fn set_error(&self, error: Option<String>);

    /// Whether this process is playing the server role in the current
    /// transfer. Always `false` for a [`LocalSessionContext`].
    fn is_server(&self) -> bool;

    /// The live wire connection for this transfer, if any. `None` for a
    /// [`LocalSessionContext`] and for a [`NetworkSessionContext`] that
    /// hasn't had one attached yet.
    fn connection(&self) -> Option<Arc<dyn NetworkSyncConnection>> {
        None
    }

    fn to_wire(&self) -> ContextWire;
}

/// Process-local context: no network connection attached.
pub struct LocalSessionContext {
    state: RwLock<ContextState>,
}

impl LocalSessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self { state: RwLock::new(ContextState::new()) }
    }

    /// Rebuilds a context from its wire form plus freshly re-fetched
    /// sessions. `sync_session`/`transfer_session` are `None` when the
    /// corresponding id in `wire` could not be resolved by the caller.
    #[must_use]
    pub fn from_wire(wire: &ContextWire, sync_session: Option<SyncSession>, transfer_session: Option<TransferSession>) -> Self {
        let ctx = Self::new();
        {
            let mut state = ctx.state.write();
            state.stage = wire.stage;
            state.stage_status = wire.stage_status;
            state.capabilities.clone_from(&wire.capabilities);
            state.is_push = wire.is_push;
            state.error.clone_from(&wire.error);
            state.sync_session = sync_session;
            state.transfer_session = transfer_session;
        }
        ctx
    }
}

impl Default for LocalSessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext for LocalSessionContext {
    fn stage(&self) -> TransferStage {
        self.state.read().stage
    }

    fn set_stage(&self, stage: TransferStage) {
        self.state.write().stage = stage;
    }

    fn stage_status(&self) -> TransferStatus {
        self.state.read().stage_status
    }

    fn set_stage_status(&self, status: TransferStatus) {
        self.state.write().stage_status = status;
    }

    fn sync_session(&self) -> Option<SyncSession> {
        self.state.read().sync_session.clone()
    }

    fn set_sync_session(&self, session: SyncSession) -> Result<(), MorangoError> {
        let mut state = self.state.write();
        if state.sync_session.is_some() {
            return Err(MorangoError::ContextUpdate { field: "sync_session" });
        }
        state.sync_session = Some(session);
        Ok(())
    }

    fn transfer_session(&self) -> Option<TransferSession> {
        self.state.read().transfer_session.clone()
    }

    fn set_transfer_session(&self, session: TransferSession) -> Result<(), MorangoError> {
        let mut state = self.state.write();
        if state.transfer_session.is_some() {
            return Err(MorangoError::ContextUpdate { field: "transfer_session" });
        }
        state.transfer_session = Some(session);
        Ok(())
    }

    fn filter(&self) -> Filter {
        let state = self.state.read();
        match &state.transfer_session {
            Some(transfer) => transfer.filter.clone(),
            None => state.filter.clone().unwrap_or_default(),
        }
    }

    fn set_filter(&self, filter: Filter) -> Result<(), MorangoError> {
        let mut state = self.state.write();
        if state.filter.is_some() {
            return Err(MorangoError::ContextUpdate { field: "filter" });
        }
        state.filter = Some(filter);
        Ok(())
    }

    fn is_push(&self) -> Option<bool> {
        self.state.read().is_push
    }

    fn set_is_push(&self, push: bool) -> Result<(), MorangoError> {
        let mut state = self.state.write();
        if state.is_push.is_some() {
            return Err(MorangoError::ContextUpdate { field: "is_push" });
        }
        state.is_push = Some(push);
        Ok(())
    }

    fn capabilities(&self) -> Vec<String> {
        self.state.read().capabilities.clone()
    }

    fn set_capabilities(&self, capabilities: Vec<String>) {
        self.state.write().capabilities = capabilities;
    }

    fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    fn set_error(&self, error: Option<String>) {
        self.state.write().error = error;
    }

    fn is_server(&self) -> bool {
        false
    }

    fn to_wire(&self) -> ContextWire {
        let state = self.state.read();
        ContextWire {
            sync_session_id: state.sync_session.as_ref().map(|s| s.id.clone()),
            transfer_session_id: state.transfer_session.as_ref().map(|t| t.id.clone()),
            stage: state.stage,
            stage_status: state.stage_status,
            capabilities: state.capabilities.clone(),
            is_push: state.is_push,
            is_server: None,
            error: state.error.clone(),
        }
    }
}

/// Context for a transfer driven over the wire: adds which side of the
/// conversation this process is playing (`is_server`) and a live connection
/// handle that is never part of the wire encoding -- a context decoded from
/// [`ContextWire`] always comes back without one, and the caller must
/// re-attach it before transport-dependent stages can run.
pub struct NetworkSessionContext {
    local: LocalSessionContext,
    is_server: bool,
    connection: RwLock<Option<Arc<dyn NetworkSyncConnection>>>,
}

impl NetworkSessionContext {
    #[must_use]
    pub fn new(is_server: bool) -> Self {
        Self { local: LocalSessionContext::new(), is_server, connection: RwLock::new(None) }
    }

    #[must_use]
    pub fn from_wire(
        wire: &ContextWire,
        sync_session: Option<SyncSession>,
        transfer_session: Option<TransferSession>,
    ) -> Self {
        Self {
            local: LocalSessionContext::from_wire(wire, sync_session, transfer_session),
            is_server: wire.is_server.unwrap_or(false),
            connection: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn attach_connection(&self, connection: Arc<dyn NetworkSyncConnection>) {
        *self.connection.write() = Some(connection);
    }

    #[must_use]
    pub fn connection(&self) -> Option<Arc<dyn NetworkSyncConnection>> {
        self.connection.read().clone()
    }
}

impl SessionContext for NetworkSessionContext {
    fn stage(&self) -> TransferStage {
        self.local.stage()
    }

    fn set_stage(&self, stage: TransferStage) {
        self.local.set_stage(stage);
    }

    fn stage_status(&self) -> TransferStatus {
        self.local.stage_status()
    }

    fn set_stage_status(&self, status: TransferStatus) {
        self.local.set_stage_status(status);
    }

    fn sync_session(&self) -> Option<SyncSession> {
        self.local.sync_session()
    }

    fn set_sync_session(&self, session: SyncSession) -> Result<(), MorangoError> {
        self.local.set_sync_session(session)
    }

    fn transfer_session(&self) -> Option<TransferSession> {
        self.local.transfer_session()
    }

    fn set_transfer_session(&self, session: TransferSession) -> Result<(), MorangoError> {
        self.local.set_transfer_session(session)
    }

    fn filter(&self) -> Filter {
        self.local.filter()
    }

    fn set_filter(&self, filter: Filter) -> Result<(), MorangoError> {
        self.local.set_filter(filter)
    }

    fn is_push(&self) -> Option<bool> {
        self.local.is_push()
    }

    fn set_is_push(&self, push: bool) -> Result<(), MorangoError> {
        self.local.set_is_push(push)
    }

    fn capabilities(&self) -> Vec<String> {
        self.local.capabilities()
    }

    fn set_capabilities(&self, capabilities: Vec<String>) {
        self.local.set_capabilities(capabilities);
    }

    fn error(&self) -> Option<String> {
        self.local.error()
    }

    fn set_error(&self, error: Option<String>) {
        self.local.set_error(error);
    }

    fn is_server(&self) -> bool {
        self.is_server
    }

    fn connection(&self) -> Option<Arc<dyn NetworkSyncConnection>> {
        self.connection.read().clone()
    }

    fn to_wire(&self) -> ContextWire {
        let mut wire = self.local.to_wire();
        wire.is_server = Some(self.is_server);
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once_field_rejects_second_write() {
        let ctx = LocalSessionContext::new();
        ctx.set_is_push(true).unwrap();
        let err = ctx.set_is_push(false).unwrap_err();
        assert!(matches!(err, MorangoError::ContextUpdate { field: "is_push" }));
        assert_eq!(ctx.is_push(), Some(true));
    }

    #[test]
    fn filter_falls_back_to_externally_supplied_when_no_transfer_session() {
        let ctx = LocalSessionContext::new();
        ctx.set_filter(Filter::new(vec!["user1".to_string()])).unwrap();
        assert_eq!(ctx.filter(), Filter::new(vec!["user1".to_string()]));
    }

    #[test]
    fn filter_prefers_transfer_session_filter_once_attached() {
        let ctx = LocalSessionContext::new();
        ctx.set_filter(Filter::new(vec!["fallback".to_string()])).unwrap();
        let transfer = TransferSession {
            id: "t1".to_string(),
            sync_session_id: "s1".to_string(),
            push: true,
            filter: Filter::new(vec!["attached".to_string()]),
            client_fsic: morango_core::Fsic::new(),
            server_fsic: morango_core::Fsic::new(),
            records_total: 0,
            records_transferred: 0,
            transfer_stage: TransferStage::Initializing,
            transfer_stage_status: TransferStatus::Pending,
            active: true,
            last_activity_timestamp: String::new(),
        };
        ctx.set_transfer_session(transfer).unwrap();
        assert_eq!(ctx.filter(), Filter::new(vec!["attached".to_string()]));
    }

    #[test]
    fn network_context_round_trips_is_server_through_wire() {
        let ctx = NetworkSessionContext::new(true);
        ctx.set_stage(TransferStage::Queuing);
        let wire = ctx.to_wire();
        assert_eq!(wire.is_server, Some(true));

        let restored = NetworkSessionContext::from_wire(&wire, None, None);
        assert!(restored.is_server());
        assert_eq!(restored.stage(), TransferStage::Queuing);
        assert!(restored.connection().is_none());
    }

    #[test]
    fn local_wire_encoding_omits_is_server() {
        let ctx = LocalSessionContext::new();
        assert!(ctx.to_wire().is_server.is_none());
    }
}
