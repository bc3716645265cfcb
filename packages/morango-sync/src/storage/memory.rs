//! Concurrent in-memory [`SyncRepository`] backend.
//!
//! A flat table per row kind, keyed the way the table is actually queried,
//! using `DashMap` for lock-free concurrent access rather than a single
//! coarse mutex.

use dashmap::DashMap;
use morango_core::{BufferRecord, DatabaseMaxCounter, Filter, InstanceId, RecordMaxCounter, RecordMaxCounterBuffer, StoreRecord, SyncRepository};

/// Default in-process backend: every table lives for the life of the process.
#[derive(Default)]
pub struct InMemoryRepository {
    store: DashMap<String, StoreRecord>,
    rmc: DashMap<(String, InstanceId), RecordMaxCounter>,
    dmc: DashMap<(InstanceId, String), DatabaseMaxCounter>,
    buffer: DashMap<(String, String), BufferRecord>,
    rmcb: DashMap<(String, String, InstanceId), RecordMaxCounterBuffer>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncRepository for InMemoryRepository {
    fn get_store_record(&self, id: &str) -> Option<StoreRecord> {
        self.store.get(id).map(|entry| entry.clone())
    }

    fn put_store_record(&self, record: StoreRecord) {
        self.store.insert(record.id.clone(), record);
    }

    fn store_records_matching(&self, profile: &str, filter: &Filter) -> Vec<StoreRecord> {
        self.store
            .iter()
            .filter(|entry| entry.profile == profile && filter.matches(&entry.partition))
            .map(|entry| entry.clone())
            .collect()
    }

    fn rmc_rows_for_record(&self, store_record_id: &str) -> Vec<RecordMaxCounter> {
        self.rmc
            .iter()
            .filter(|entry| entry.key().0 == store_record_id)
            .map(|entry| entry.clone())
            .collect()
    }

    fn rmc_row(&self, store_record_id: &str, instance: &InstanceId) -> Option<RecordMaxCounter> {
        self.rmc.get(&(store_record_id.to_string(), instance.clone())).map(|entry| entry.clone())
    }

    fn put_rmc(&self, rmc: RecordMaxCounter) {
        self.rmc.insert((rmc.store_record_id.clone(), rmc.instance_id.clone()), rmc);
    }

    fn dmc_rows(&self) -> Vec<DatabaseMaxCounter> {
        self.dmc.iter().map(|entry| entry.clone()).collect()
    }

    fn put_dmc(&self, dmc: DatabaseMaxCounter) {
        self.dmc.insert((dmc.instance_id.clone(), dmc.partition_prefix.clone()), dmc);
    }

    fn buffer_rows(&self, transfer_session_id: &str) -> Vec<BufferRecord> {
        self.buffer
            .iter()
            .filter(|entry| entry.key().0 == transfer_session_id)
            .map(|entry| entry.clone())
            .collect()
    }

    fn put_buffer_row(&self, row: BufferRecord) {
        self.buffer.insert((row.transfer_session_id.clone(), row.model_uuid.clone()), row);
    }

    fn delete_buffer_row(&self, transfer_session_id: &str, model_uuid: &str) {
        self.buffer.remove(&(transfer_session_id.to_string(), model_uuid.to_string()));
    }

    fn rmcb_rows(&self, transfer_session_id: &str) -> Vec<RecordMaxCounterBuffer> {
        self.rmcb
            .iter()
            .filter(|entry| entry.key().0 == transfer_session_id)
            .map(|entry| entry.clone())
            .collect()
    }

    fn rmcb_rows_for_model(&self, transfer_session_id: &str, model_uuid: &str) -> Vec<RecordMaxCounterBuffer> {
        self.rmcb
            .iter()
            .filter(|entry| entry.key().0 == transfer_session_id && entry.key().1 == model_uuid)
            .map(|entry| entry.clone())
            .collect()
    }

    fn put_rmcb_row(&self, row: RecordMaxCounterBuffer) {
        self.rmcb
            .insert((row.transfer_session_id.clone(), row.model_uuid.clone(), row.instance_id.clone()), row);
    }

    fn delete_rmcb_row(&self, transfer_session_id: &str, model_uuid: &str, instance: &InstanceId) {
        self.rmcb
            .remove(&(transfer_session_id.to_string(), model_uuid.to_string(), instance.clone()));
    }

    fn purge_transfer(&self, transfer_session_id: &str) {
        self.buffer.retain(|k, _| k.0 != transfer_session_id);
        self.rmcb.retain(|k, _| k.0 != transfer_session_id);
    }
}
