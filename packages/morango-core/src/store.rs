//! The canonical, durable data model: [`StoreRecord`], [`RecordMaxCounter`]
//! (RMC), and [`DatabaseMaxCounter`] (DMC / FSIC row).
//!
//! These types carry no I/O of their own -- [`crate::repository::SyncRepository`]
//! is the trait that persists and queries them. The one exception is
//! [`upsert_from_app`], the local write path itself, which is written
//! purely in terms of that trait the same way [`crate::merge`] is.

use serde::{Deserialize, Serialize};

use crate::instance::{Counter, InstanceId};

/// Canonical per-record state, a "Store record".
///
/// `serialized` is empty iff `deleted` is true and the record has been
/// `hard_deleted` (payload purged entirely, only the tombstone remains).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Record UUID (32-hex-char lowercase), the store's primary key.
    pub id: String,
    /// Slash-delimited partition prefix used for filtering.
    pub partition: String,
    /// Namespace isolating otherwise-incompatible record universes.
    pub profile: String,
    /// Serialized application payload. Empty iff `hard_deleted`.
    pub serialized: String,
    /// Instance that produced the currently-winning version.
    pub last_saved_instance: InstanceId,
    /// Counter at which the currently-winning version was written.
    pub last_saved_counter: Counter,
    /// Newline-separated stack of losing payloads from prior merges, most
    /// recent first.
    pub conflicting_serialized_data: String,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Hard-delete flag: once true, stays true (monotonic tombstone).
    pub hard_deleted: bool,
    /// Set when the app layer mutates the record locally; cleared once the
    /// mutation has been serialized into the store.
    pub dirty_bit: bool,
}

impl StoreRecord {
    /// Pushes `losing` onto the conflict stack, most-recent-first.
    pub fn push_conflict(&mut self, losing: &str) {
        if self.conflicting_serialized_data.is_empty() {
            self.conflicting_serialized_data = losing.to_string();
        } else {
            self.conflicting_serialized_data = format!("{losing}\n{}", self.conflicting_serialized_data);
        }
    }

    /// Whether this record's current winning version was written at or
    /// below the given counter for the given instance.
    #[must_use]
    pub fn won_by(&self, instance: &InstanceId, counter: Counter) -> bool {
        &self.last_saved_instance == instance && self.last_saved_counter == counter
    }
}

/// Per-`(store_record_id, instance_id)` high-water mark, the "RMC" row.
///
/// Invariant: at most one row per `(store_record_id, instance_id)` pair;
/// the row for `(r.last_saved_instance, r)` always has
/// `counter == r.last_saved_counter` (RMC dominance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMaxCounter {
    pub store_record_id: String,
    pub instance_id: InstanceId,
    pub counter: Counter,
}

/// Per-`(instance_id, partition_prefix)` floor, the "DMC / FSIC" row.
///
/// `counter` is the largest value for which *all* records under
/// `partition_prefix` written by `instance_id` are known to be absorbed
/// locally, requiring
/// `DMC(i, p) <= min over matching r of RMC(r, i).counter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMaxCounter {
    pub instance_id: InstanceId,
    pub partition_prefix: String,
    pub counter: Counter,
}

/// Verifies RMC dominance for one store record against its matching RMC
/// rows. Intended for tests and debug assertions, not the hot path.
#[must_use]
pub fn rmc_dominance_holds(record: &StoreRecord, rmcs: &[RecordMaxCounter]) -> bool {
    rmcs.iter()
        .find(|rmc| rmc.store_record_id == record.id && rmc.instance_id == record.last_saved_instance)
        .is_some_and(|rmc| rmc.counter == record.last_saved_counter)
}

/// `upsert_from_app`: the app layer has locally modified
/// `record` (whatever shape its own schema gives it, boiled down to a
/// [`StoreRecord`] by code outside this crate) and wants it sealed as the
/// new winning version.
///
/// Bumps `instance_registry`, stamps `last_saved_instance`/`last_saved_counter`
/// with the result, clears `dirty_bit`, persists the row, and upserts the
/// matching RMC row so RMC dominance holds immediately
/// afterward. Returns the stamped record.
pub fn upsert_from_app(
    repo: &dyn crate::repository::SyncRepository,
    instance_registry: &crate::instance::InstanceRegistry,
    mut record: StoreRecord,
) -> StoreRecord {
    let (instance, counter) = instance_registry.bump();
    record.last_saved_instance = instance.clone();
    record.last_saved_counter = counter;
    record.dirty_bit = false;

    repo.put_store_record(record.clone());
    repo.put_rmc(RecordMaxCounter {
        store_record_id: record.id.clone(),
        instance_id: instance,
        counter,
    });
    record
}
