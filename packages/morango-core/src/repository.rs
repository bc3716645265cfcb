//! [`SyncRepository`]: the storage-agnostic contract the queue/dequeue
//! engine ([`crate::merge`]) is written against.
//!
//! All operations here are synchronous, because they never block on a
//! peer -- only [`crate::merge::dequeue_into_store`]'s caller needs to
//! guarantee the seven steps run without another dequeue for the same
//! `transfer_session_id` interleaving, which a single implementation-held
//! lock across the call trivially provides for a synchronous trait. Used
//! as `&dyn SyncRepository` so a real backing store (the application's
//! own persistence schema) can be substituted for the in-memory reference
//! implementation in `morango-sync::storage`.

use crate::buffer::{BufferRecord, RecordMaxCounterBuffer};
use crate::filter::Filter;
use crate::instance::InstanceId;
use crate::store::{DatabaseMaxCounter, RecordMaxCounter, StoreRecord};

/// CRUD surface over Store, RMC, DMC, Buffer, and RMCBuffer.
pub trait SyncRepository: Send + Sync {
    // --- Store ---

    fn get_store_record(&self, id: &str) -> Option<StoreRecord>;
    fn put_store_record(&self, record: StoreRecord);

    /// Store records whose `profile` matches and whose `partition` is
    /// covered by `filter`. Candidate set for queuing; FSIC-floor filtering
    /// happens on top of this in [`crate::merge`].
    fn store_records_matching(&self, profile: &str, filter: &Filter) -> Vec<StoreRecord>;

    // --- RecordMaxCounter ---

    fn rmc_rows_for_record(&self, store_record_id: &str) -> Vec<RecordMaxCounter>;
    fn rmc_row(&self, store_record_id: &str, instance: &InstanceId) -> Option<RecordMaxCounter>;
    fn put_rmc(&self, rmc: RecordMaxCounter);

    // --- DatabaseMaxCounter / FSIC ---

    fn dmc_rows(&self) -> Vec<DatabaseMaxCounter>;
    fn put_dmc(&self, dmc: DatabaseMaxCounter);

    // --- Buffer (scoped by transfer_session_id) ---

    fn buffer_rows(&self, transfer_session_id: &str) -> Vec<BufferRecord>;
    fn put_buffer_row(&self, row: BufferRecord);
    fn delete_buffer_row(&self, transfer_session_id: &str, model_uuid: &str);

    // --- RecordMaxCounterBuffer (scoped by transfer_session_id) ---

    fn rmcb_rows(&self, transfer_session_id: &str) -> Vec<RecordMaxCounterBuffer>;
    fn rmcb_rows_for_model(&self, transfer_session_id: &str, model_uuid: &str) -> Vec<RecordMaxCounterBuffer>;
    fn put_rmcb_row(&self, row: RecordMaxCounterBuffer);
    fn delete_rmcb_row(&self, transfer_session_id: &str, model_uuid: &str, instance: &InstanceId);

    /// Drops every remaining Buffer/RMCBuffer row for this transfer.
    /// Called at the end of a successful dequeue.
    fn purge_transfer(&self, transfer_session_id: &str);
}
