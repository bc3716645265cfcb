//! Concrete per-stage middleware: the six handlers that walk a transfer
//! through `Serializing -> Queuing -> Transferring -> Dequeuing ->
//! Deserializing -> Cleanup`.
//!
//! `Initializing` has no handler here -- it is driven by whatever creates
//! the [`crate::context::SessionContext`] in the first place (session
//! negotiation happens before the registry ever runs), treating stage zero
//! as a precondition rather than a pipeline step.

use std::sync::Arc;

use async_trait::async_trait;
use morango_core::{dequeue_into_store, queue_into_buffer, update_fsics_after_dequeue, InstanceRegistry, SyncRepository, TransferStage, TransferStatus};
use tracing::{info, warn};

use crate::context::SessionContext;
use crate::middleware::Middleware;
use crate::storage::SessionStore;

/// Bumps `records_total`/`records_transferred` on the live [`TransferSession`](morango_core::TransferSession)
/// row, independent of the write-once snapshot a [`SessionContext`] carries.
fn touch_transfer_session(session_store: &dyn SessionStore, transfer_session_id: &str, mutate: impl FnOnce(&mut morango_core::TransferSession)) {
    if let Some(mut session) = session_store.get_transfer_session(transfer_session_id) {
        mutate(&mut session);
        session_store.put_transfer_session(session);
    }
}

/// Application-layer serialization (`upsert_from_app`) happens outside this
/// engine; this stage only exists so the pipeline has a named slot for it
/// and reports success.
pub struct SerializingMiddleware;

#[async_trait]
impl Middleware for SerializingMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Serializing
    }

    fn name(&self) -> &'static str {
        "serializing"
    }

    async fn invoke(&self, _ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        Ok(TransferStatus::Completed)
    }
}

/// Runs on the sending side only: diffs FSICs and stages qualifying Store
/// records into the Buffer/RMCBuffer tables.
pub struct QueuingMiddleware {
    repository: Arc<dyn SyncRepository>,
    session_store: Arc<dyn SessionStore>,
    profile: String,
}

impl QueuingMiddleware {
    #[must_use]
    pub fn new(repository: Arc<dyn SyncRepository>, session_store: Arc<dyn SessionStore>, profile: impl Into<String>) -> Self {
        Self { repository, session_store, profile: profile.into() }
    }
}

#[async_trait]
impl Middleware for QueuingMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Queuing
    }

    fn name(&self) -> &'static str {
        "queuing"
    }

    async fn invoke(&self, ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        let Some(transfer) = ctx.transfer_session() else {
            return Ok(TransferStatus::Completed);
        };
        if !transfer.is_sender(ctx.is_server()) {
            return Ok(TransferStatus::Completed);
        }

        let queued = queue_into_buffer(self.repository.as_ref(), &self.profile, &transfer);
        info!(transfer_session_id = %transfer.id, queued, "queued records into buffer");
        touch_transfer_session(self.session_store.as_ref(), &transfer.id, |session| {
            session.records_total = queued;
        });
        Ok(TransferStatus::Completed)
    }
}

/// Runs on both sides: hands the buffered rows for this transfer to the
/// attached [`crate::transport::NetworkSyncConnection`], pushing them if
/// sending or pulling them if receiving.
pub struct TransferringMiddleware {
    repository: Arc<dyn SyncRepository>,
    session_store: Arc<dyn SessionStore>,
}

impl TransferringMiddleware {
    #[must_use]
    pub fn new(repository: Arc<dyn SyncRepository>, session_store: Arc<dyn SessionStore>) -> Self {
        Self { repository, session_store }
    }
}

#[async_trait]
impl Middleware for TransferringMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Transferring
    }

    fn name(&self) -> &'static str {
        "transferring"
    }

    async fn invoke(&self, ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        let Some(transfer) = ctx.transfer_session() else {
            return Ok(TransferStatus::Completed);
        };

        let Some(connection) = ctx.connection() else {
            // No live connection (a purely local, same-process transfer): the
            // buffer rows are already shared storage, nothing to move.
            return Ok(TransferStatus::Completed);
        };

        let transferred = if transfer.is_sender(ctx.is_server()) {
            let rows = self.repository.buffer_rows(&transfer.id);
            let count = rows.len() as u64;
            let wire = rows
                .into_iter()
                .map(|row| crate::transport::to_buffer_wire(&row, &self.repository.rmcb_rows_for_model(&transfer.id, &row.model_uuid)))
                .collect();
            connection.push_buffer_chunk(&transfer.id, wire).await?;
            count
        } else {
            let wire = connection.pull_buffer_chunk(&transfer.id).await?;
            let count = wire.len() as u64;
            for entry in wire {
                let (record, rmcb_rows) = crate::transport::from_buffer_wire(&transfer.id, entry);
                self.repository.put_buffer_row(record);
                for rmcb in rmcb_rows {
                    self.repository.put_rmcb_row(rmcb);
                }
            }
            count
        };

        touch_transfer_session(self.session_store.as_ref(), &transfer.id, |session| {
            session.records_transferred = transferred;
        });
        Ok(TransferStatus::Completed)
    }
}

/// Runs on the receiving side only, and only once at least one record made
/// it across the wire: merges the Buffer into the Store.
pub struct DequeuingMiddleware {
    repository: Arc<dyn SyncRepository>,
    session_store: Arc<dyn SessionStore>,
    instance_registry: Arc<InstanceRegistry>,
}

impl DequeuingMiddleware {
    #[must_use]
    pub fn new(repository: Arc<dyn SyncRepository>, session_store: Arc<dyn SessionStore>, instance_registry: Arc<InstanceRegistry>) -> Self {
        Self { repository, session_store, instance_registry }
    }
}

#[async_trait]
impl Middleware for DequeuingMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Dequeuing
    }

    fn name(&self) -> &'static str {
        "dequeuing"
    }

    async fn invoke(&self, ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        let Some(transfer) = ctx.transfer_session() else {
            return Ok(TransferStatus::Completed);
        };
        if transfer.is_sender(ctx.is_server()) {
            return Ok(TransferStatus::Completed);
        }
        // `transfer` is the write-once snapshot the context was built with, so
        // its `records_transferred` is whatever it was at `proceed_to`'s first
        // call -- always 0 on a freshly-initializing context.
        // `TransferringMiddleware` only ever updates `records_transferred` on
        // the live `SessionStore` row, so that row, not the snapshot, is the
        // one `is_receiver`'s count check needs here.
        let records_transferred =
            self.session_store.get_transfer_session(&transfer.id).map_or(transfer.records_transferred, |live| live.records_transferred);
        if records_transferred == 0 {
            return Ok(TransferStatus::Completed);
        }

        let report = dequeue_into_store(self.repository.as_ref(), &transfer.id, &self.instance_registry)?;
        info!(
            transfer_session_id = %transfer.id,
            superseded = report.superseded,
            merged_conflict = report.merged_conflict,
            fast_forwarded = report.fast_forwarded,
            "dequeued buffer into store"
        );

        // The DMC floor advances only after the buffer purge `dequeue_into_store`
        // already performed above, never before.
        update_fsics_after_dequeue(self.repository.as_ref(), transfer.sender_fsic(), &transfer.filter);
        Ok(TransferStatus::Completed)
    }
}

/// Application-layer deserialization (the counterpart to `upsert_from_app`
/// on the receiving side) happens outside this engine.
pub struct DeserializingMiddleware;

#[async_trait]
impl Middleware for DeserializingMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Deserializing
    }

    fn name(&self) -> &'static str {
        "deserializing"
    }

    async fn invoke(&self, _ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        Ok(TransferStatus::Completed)
    }
}

/// Final stage: purges the transfer's Buffer/RMCBuffer rows and marks the
/// session inactive.
pub struct CleanupMiddleware {
    repository: Arc<dyn SyncRepository>,
    session_store: Arc<dyn SessionStore>,
}

impl CleanupMiddleware {
    #[must_use]
    pub fn new(repository: Arc<dyn SyncRepository>, session_store: Arc<dyn SessionStore>) -> Self {
        Self { repository, session_store }
    }
}

#[async_trait]
impl Middleware for CleanupMiddleware {
    fn related_stage(&self) -> TransferStage {
        TransferStage::Cleanup
    }

    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn invoke(&self, ctx: &dyn SessionContext) -> anyhow::Result<TransferStatus> {
        let Some(transfer) = ctx.transfer_session() else {
            return Ok(TransferStatus::Completed);
        };
        self.repository.purge_transfer(&transfer.id);
        touch_transfer_session(self.session_store.as_ref(), &transfer.id, |session| {
            session.active = false;
        });
        if let Some(sync_session_id) = ctx.sync_session().map(|s| s.id) {
            if let Some(mut sync_session) = self.session_store.get_sync_session(&sync_session_id) {
                sync_session.active = false;
                self.session_store.put_sync_session(sync_session);
            }
        }
        warn!(transfer_session_id = %transfer.id, "transfer session retired");
        Ok(TransferStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use morango_core::{Filter, Fsic, InstanceRegistry, SyncSession, TransferSession};

    use super::*;
    use crate::context::LocalSessionContext;
    use crate::storage::{InMemoryRepository, InMemorySessionStore};

    fn transfer(id: &str, push: bool, records_transferred: u64) -> TransferSession {
        TransferSession {
            id: id.to_string(),
            sync_session_id: "s1".to_string(),
            push,
            filter: Filter::empty(),
            client_fsic: Fsic::new(),
            server_fsic: Fsic::new(),
            records_total: 0,
            records_transferred,
            transfer_stage: TransferStage::Initializing,
            transfer_stage_status: TransferStatus::Pending,
            active: true,
            last_activity_timestamp: String::new(),
        }
    }

    #[tokio::test]
    async fn queuing_is_a_no_op_without_a_transfer_session() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemorySessionStore::new());
        let middleware = QueuingMiddleware::new(repo, store, "facilitydata");
        let ctx = LocalSessionContext::new();
        let status = middleware.invoke(&ctx).await.unwrap();
        assert_eq!(status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn queuing_skips_the_non_sending_side() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemorySessionStore::new());
        let middleware = QueuingMiddleware::new(repo, store.clone(), "facilitydata");
        let ctx = LocalSessionContext::new();
        // LocalSessionContext::is_server() is always false; a pull
        // (push=false) makes the server the sender, so this side must skip.
        let t = transfer("t1", false, 0);
        store.put_transfer_session(t.clone());
        ctx.set_transfer_session(t).unwrap();
        let status = middleware.invoke(&ctx).await.unwrap();
        assert_eq!(status, TransferStatus::Completed);
        assert_eq!(store.get_transfer_session("t1").unwrap().records_total, 0);
    }

    #[tokio::test]
    async fn dequeuing_skips_when_nothing_was_transferred() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemorySessionStore::new());
        let registry = Arc::new(InstanceRegistry::new(morango_core::InstanceId::new()));
        let middleware = DequeuingMiddleware::new(repo, store.clone(), registry);
        let ctx = LocalSessionContext::new();
        let t = transfer("t1", false, 0);
        store.put_transfer_session(t.clone());
        ctx.set_transfer_session(t).unwrap();
        let status = middleware.invoke(&ctx).await.unwrap();
        assert_eq!(status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn dequeuing_merges_once_transferring_has_recorded_records_on_the_live_session() {
        // Reproduces the Transferring -> Dequeuing handoff on a receiver: the
        // context's `transfer_session()` snapshot is built before anything was
        // transferred (`records_transferred: 0`), exactly as `proceed_to` hands
        // it to every middleware in one run. `TransferringMiddleware` only
        // updates the live `SessionStore` row, never the context snapshot, so
        // `DequeuingMiddleware` must consult that row rather than the snapshot.
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemorySessionStore::new());
        let registry = Arc::new(InstanceRegistry::new(morango_core::InstanceId::new()));

        let sender_instance = morango_core::InstanceId::new();
        repo.put_store_record(morango_core::StoreRecord {
            id: "m1".to_string(),
            partition: "user1".to_string(),
            profile: "facilitydata".to_string(),
            serialized: "hello".to_string(),
            last_saved_instance: sender_instance.clone(),
            last_saved_counter: 1,
            conflicting_serialized_data: String::new(),
            deleted: false,
            hard_deleted: false,
            dirty_bit: false,
        });
        repo.put_buffer_row(morango_core::BufferRecord {
            transfer_session_id: "t1".to_string(),
            model_uuid: "m1".to_string(),
            serialized: "hello".to_string(),
            deleted: false,
            hard_deleted: false,
            last_saved_instance: sender_instance.clone(),
            last_saved_counter: 1,
            profile: "facilitydata".to_string(),
            partition: "user1".to_string(),
            conflicting_serialized_data: String::new(),
        });
        repo.put_rmcb_row(morango_core::RecordMaxCounterBuffer {
            transfer_session_id: "t1".to_string(),
            model_uuid: "m1".to_string(),
            instance_id: sender_instance,
            counter: 1,
        });

        // A pull (push=false): the client (is_server()==false) is the receiver.
        let t = transfer("t1", false, 0);
        store.put_transfer_session(t.clone());
        let ctx = LocalSessionContext::new();
        ctx.set_transfer_session(t).unwrap();

        // Only the live row is touched, as `TransferringMiddleware` does.
        let mut live = store.get_transfer_session("t1").unwrap();
        live.records_transferred = 1;
        store.put_transfer_session(live);

        let middleware = DequeuingMiddleware::new(repo.clone(), store, registry);
        let status = middleware.invoke(&ctx).await.unwrap();

        assert_eq!(status, TransferStatus::Completed);
        assert!(repo.buffer_rows("t1").is_empty());
        let merged = repo.get_store_record("m1").unwrap();
        assert_eq!(merged.serialized, "hello");
    }

    #[tokio::test]
    async fn cleanup_purges_buffer_rows_and_deactivates_sessions() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemorySessionStore::new());
        let middleware = CleanupMiddleware::new(repo.clone(), store.clone());
        let ctx = LocalSessionContext::new();

        let sync_session = SyncSession {
            id: "s1".to_string(),
            profile: "facilitydata".to_string(),
            client_certificate: None,
            server_certificate: None,
            client_instance: morango_core::InstanceId::new().to_string(),
            server_instance: morango_core::InstanceId::new().to_string(),
            active: true,
            last_activity_timestamp: String::new(),
            server_info: serde_json::Value::Null,
            client_info: serde_json::Value::Null,
            connection_kind: "network".to_string(),
        };
        store.put_sync_session(sync_session.clone());
        ctx.set_sync_session(sync_session).unwrap();

        let t = transfer("t1", true, 3);
        store.put_transfer_session(t.clone());
        ctx.set_transfer_session(t).unwrap();

        repo.put_buffer_row(morango_core::BufferRecord {
            transfer_session_id: "t1".to_string(),
            model_uuid: "m1".to_string(),
            serialized: "x".to_string(),
            deleted: false,
            hard_deleted: false,
            last_saved_instance: morango_core::InstanceId::new(),
            last_saved_counter: 1,
            profile: "facilitydata".to_string(),
            partition: "user1".to_string(),
            conflicting_serialized_data: String::new(),
        });

        middleware.invoke(&ctx).await.unwrap();

        assert!(repo.buffer_rows("t1").is_empty());
        assert!(!store.get_transfer_session("t1").unwrap().active);
        assert!(!store.get_sync_session("s1").unwrap().active);
    }
}
