//! Queue/dequeue engine: copies Store rows into a per-transfer
//! Buffer on the sending side, and merges an incoming Buffer back into the
//! Store on the receiving side via a strict seven-step pipeline.
//!
//! Both directions are written purely against [`SyncRepository`], so the
//! same algorithm runs whether the backing store is the in-memory reference
//! implementation or a real one.

use std::collections::HashMap;

use crate::buffer::{BufferRecord, RecordMaxCounterBuffer};
use crate::error::IntegrityError;
use crate::fsic::diff_fsic;
use crate::instance::InstanceRegistry;
use crate::repository::SyncRepository;
use crate::session::TransferSession;
use crate::store::{rmc_dominance_holds, RecordMaxCounter};
use crate::MorangoError;

/// Copies every Store row this side should send into `(Buffer, RMCBuffer)`
/// rows tagged with `transfer.id`, per the FSIC-floor queue predicate.
///
/// Returns the number of Store rows buffered; the caller is responsible for
/// writing that count into `transfer.records_total`.
#[must_use]
pub fn queue_into_buffer(repo: &dyn SyncRepository, profile: &str, transfer: &TransferSession) -> u64 {
    let floor = diff_fsic(transfer.sender_fsic(), transfer.recipient_fsic());
    if floor.is_empty() {
        return 0;
    }

    let mut queued = 0u64;
    for record in repo.store_records_matching(profile, &transfer.filter) {
        let rmcs = repo.rmc_rows_for_record(&record.id);
        let qualifies = rmcs
            .iter()
            .any(|rmc| floor.get(&rmc.instance_id).is_some_and(|&threshold| rmc.counter > threshold));
        if !qualifies {
            continue;
        }

        repo.put_buffer_row(BufferRecord::from_store_record(&record, &transfer.id));
        for rmc in &rmcs {
            repo.put_rmcb_row(RecordMaxCounterBuffer {
                transfer_session_id: transfer.id.clone(),
                model_uuid: record.id.clone(),
                instance_id: rmc.instance_id.clone(),
                counter: rmc.counter,
            });
        }
        queued += 1;
    }
    queued
}

/// Per-model disposition a dequeued buffer row ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Step 2: every claimed RMCBuffer write was already known locally.
    Superseded,
    /// Steps 4-5: neither side fully dominated the other; Store now carries
    /// a fresh, locally-bumped version with the prior winner pushed onto
    /// the conflict stack.
    MergedConflict,
    /// Step 7: the buffer row strictly dominated local knowledge and was
    /// installed verbatim.
    FastForwarded,
}

/// Tally of per-model outcomes from one [`dequeue_into_store`] call.
#[derive(Debug, Clone, Default)]
pub struct DequeueReport {
    pub superseded: u64,
    pub merged_conflict: u64,
    pub fast_forwarded: u64,
}

impl DequeueReport {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Superseded => self.superseded += 1,
            Disposition::MergedConflict => self.merged_conflict += 1,
            Disposition::FastForwarded => self.fast_forwarded += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.superseded + self.merged_conflict + self.fast_forwarded
    }
}

/// Runs the seven-step dequeue pipeline over every Buffer row
/// tagged with `transfer_session_id`, then purges the transfer's Buffer and
/// RMCBuffer rows.
///
/// Callers must ensure no other dequeue for the same `transfer_session_id`
/// runs concurrently; for the in-memory repository this holds because every
/// method call here is synchronous and the repository serializes its own
/// mutations internally.
///
/// # Errors
///
/// Returns [`IntegrityError::EmptyBufferRecord`] if a buffered model has no
/// RecordMaxCounterBuffer rows at all (a malformed transfer),
/// [`IntegrityError::MissingStoreRecord`] if a conflict merge needs a local
/// Store row that isn't there, or [`IntegrityError::MissingWinningRmc`] if a
/// disposition's write left the winning instance without a matching RMC row
/// (RMC dominance, Section 8 property 1, would otherwise break). Any of
/// these abort before any further rows are touched and leave the Store
/// unchanged for models not yet processed.
pub fn dequeue_into_store(
    repo: &dyn SyncRepository,
    transfer_session_id: &str,
    instance_registry: &InstanceRegistry,
) -> Result<DequeueReport, MorangoError> {
    let buffer_rows: HashMap<String, BufferRecord> = repo
        .buffer_rows(transfer_session_id)
        .into_iter()
        .map(|row| (row.model_uuid.clone(), row))
        .collect();

    let mut rmcb_rows: HashMap<String, Vec<RecordMaxCounterBuffer>> = HashMap::new();
    for row in repo.rmcb_rows(transfer_session_id) {
        rmcb_rows.entry(row.model_uuid.clone()).or_default().push(row);
    }

    let mut report = DequeueReport::default();

    for (model_uuid, buffer) in &buffer_rows {
        let mut rmcbs = rmcb_rows.remove(model_uuid).ok_or_else(|| IntegrityError::EmptyBufferRecord {
            transfer_session_id: transfer_session_id.to_string(),
            model_uuid: model_uuid.clone(),
        })?;

        // Step 1: drop RMCBuffer rows already known locally at or beyond
        // their claimed counter.
        rmcbs.retain(|rmcb| {
            let known = repo.rmc_row(model_uuid, &rmcb.instance_id).map(|r| r.counter).unwrap_or(0);
            rmcb.counter > known
        });

        // Step 2: a Buffer row is superseded once none of its surviving
        // RMCBuffer rows claim anything newer than local knowledge (which,
        // after step 1, means there are none left at all).
        if rmcbs.is_empty() {
            repo.delete_buffer_row(transfer_session_id, model_uuid);
            report.record(Disposition::Superseded);
            continue;
        }

        // Step 3: fold local knowledge into the surviving RMCBuffer rows.
        for rmcb in &mut rmcbs {
            let local = repo.rmc_row(model_uuid, &rmcb.instance_id).map(|r| r.counter).unwrap_or(0);
            rmcb.counter = rmcb.counter.max(local);
        }

        let local_rmcs = repo.rmc_rows_for_record(model_uuid);
        let buffer_dominates_all_local = local_rmcs
            .iter()
            .all(|rmc| rmcbs.iter().any(|b| b.instance_id == rmc.instance_id && b.counter >= rmc.counter));

        if buffer_dominates_all_local {
            // Step 7: strict fast-forward -- install verbatim.
            repo.put_store_record(buffer.clone().into_store_record());
            for rmcb in &rmcbs {
                repo.put_rmc(RecordMaxCounter {
                    store_record_id: model_uuid.clone(),
                    instance_id: rmcb.instance_id.clone(),
                    counter: rmcb.counter,
                });
            }
            report.record(Disposition::FastForwarded);
        } else {
            // Steps 4-5: neither side fully dominates -- merge as a conflict.
            let mut store_record = repo
                .get_store_record(model_uuid)
                .ok_or_else(|| IntegrityError::MissingStoreRecord { store_record_id: model_uuid.clone() })?;

            store_record.conflicting_serialized_data = format!("{}\n{}", buffer.serialized, store_record.serialized);
            store_record.serialized.clone_from(&buffer.serialized);
            store_record.deleted = buffer.deleted || store_record.deleted;
            store_record.hard_deleted = buffer.hard_deleted || store_record.hard_deleted;
            if store_record.hard_deleted && buffer.hard_deleted {
                store_record.serialized.clear();
                store_record.conflicting_serialized_data.clear();
            }

            let (instance, counter) = instance_registry.bump();
            store_record.last_saved_instance = instance.clone();
            store_record.last_saved_counter = counter;

            repo.put_store_record(store_record);
            repo.put_rmc(RecordMaxCounter {
                store_record_id: model_uuid.clone(),
                instance_id: instance,
                counter,
            });
            report.record(Disposition::MergedConflict);
        }

        // Every disposition that wrote a new Store row above must leave RMC
        // dominance (Section 8, property 1) holding immediately: the winning
        // instance's RMC row must exist and match `last_saved_counter`.
        let written = repo
            .get_store_record(model_uuid)
            .ok_or_else(|| IntegrityError::MissingStoreRecord { store_record_id: model_uuid.clone() })?;
        let written_rmcs = repo.rmc_rows_for_record(model_uuid);
        if !rmc_dominance_holds(&written, &written_rmcs) {
            return Err(IntegrityError::MissingWinningRmc {
                store_record_id: model_uuid.clone(),
                instance_id: written.last_saved_instance.to_string(),
            }
            .into());
        }

        // Step 6: drop the buffer rows this model just consumed.
        repo.delete_buffer_row(transfer_session_id, model_uuid);
        for rmcb in &rmcbs {
            repo.delete_rmcb_row(transfer_session_id, model_uuid, &rmcb.instance_id);
        }
    }

    repo.purge_transfer(transfer_session_id);
    Ok(report)
}
