//! Transient per-transfer staging rows: [`BufferRecord`] and
//! [`RecordMaxCounterBuffer`], the "Buffer / RMCBuffer" tables.
//!
//! Shape-compatible with [`crate::store::StoreRecord`] /
//! [`crate::store::RecordMaxCounter`], but scoped by `transfer_session_id`
//! and owned by exactly one [`crate::session::TransferSession`] until it is
//! drained by dequeue.

use serde::{Deserialize, Serialize};

use crate::instance::{Counter, InstanceId};
use crate::store::StoreRecord;

/// One row copied out of (queue) or destined for (dequeue) the Store,
/// scoped to a single transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRecord {
    pub transfer_session_id: String,
    pub model_uuid: String,
    pub serialized: String,
    pub deleted: bool,
    pub hard_deleted: bool,
    pub last_saved_instance: InstanceId,
    pub last_saved_counter: Counter,
    pub profile: String,
    pub partition: String,
    pub conflicting_serialized_data: String,
}

impl BufferRecord {
    /// Builds a buffer row from a store row plus the transfer it is
    /// being queued for.
    #[must_use]
    pub fn from_store_record(record: &StoreRecord, transfer_session_id: &str) -> Self {
        Self {
            transfer_session_id: transfer_session_id.to_string(),
            model_uuid: record.id.clone(),
            serialized: record.serialized.clone(),
            deleted: record.deleted,
            hard_deleted: record.hard_deleted,
            last_saved_instance: record.last_saved_instance.clone(),
            last_saved_counter: record.last_saved_counter,
            profile: record.profile.clone(),
            partition: record.partition.clone(),
            conflicting_serialized_data: record.conflicting_serialized_data.clone(),
        }
    }

    /// Converts a fast-forward buffer row directly into a store row
    /// (dequeue step 7).
    #[must_use]
    pub fn into_store_record(self) -> StoreRecord {
        StoreRecord {
            id: self.model_uuid,
            partition: self.partition,
            profile: self.profile,
            serialized: self.serialized,
            last_saved_instance: self.last_saved_instance,
            last_saved_counter: self.last_saved_counter,
            conflicting_serialized_data: self.conflicting_serialized_data,
            deleted: self.deleted,
            hard_deleted: self.hard_deleted,
            dirty_bit: false,
        }
    }
}

/// Buffered counterpart to [`crate::store::RecordMaxCounter`], scoped to one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMaxCounterBuffer {
    pub transfer_session_id: String,
    pub model_uuid: String,
    pub instance_id: InstanceId,
    pub counter: Counter,
}
