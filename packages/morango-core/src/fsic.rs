//! FSIC (Filtered Set Instance Counter) computation and diff.
//!
//! An FSIC is a sparse digest: `instance_id -> counter` meaning "I already
//! have everything this instance wrote at or below this counter, for the
//! partitions in my filter." Computing one requires taking the *minimum*
//! DMC counter across every partition prefix in the filter that overlaps a
//! given DMC row's prefix, so the digest never over-claims coverage.

use std::collections::BTreeMap;

use crate::filter::Filter;
use crate::instance::{Counter, InstanceId};
use crate::repository::SyncRepository;
use crate::store::DatabaseMaxCounter;

/// `instance_id -> counter` digest, ordered for deterministic wire encoding.
pub type Fsic = BTreeMap<InstanceId, Counter>;

/// Computes the FSIC for `filter` from a set of DMC rows.
///
/// For each partition prefix `p` in `filter`, every DMC row whose
/// `partition_prefix` is a prefix of `p` (or vice versa -- the two scope
/// strings overlap hierarchically) contributes its counter for that
/// instance; the contributed value is the **minimum** across all
/// contributing DMC rows for that instance, so the digest only claims
/// coverage that holds for every overlapping prefix.
#[must_use]
pub fn compute_fsic(dmcs: &[DatabaseMaxCounter], filter: &Filter) -> Fsic {
    let mut fsic: Fsic = BTreeMap::new();
    for dmc in dmcs {
        let overlaps = filter
            .prefixes()
            .iter()
            .any(|p| p.starts_with(dmc.partition_prefix.as_str()) || dmc.partition_prefix.starts_with(p.as_str()));
        if !overlaps {
            continue;
        }
        fsic
            .entry(dmc.instance_id.clone())
            .and_modify(|existing| *existing = (*existing).min(dmc.counter))
            .or_insert(dmc.counter);
    }
    fsic
}

/// The sender-side diff: for each instance the sender knows about, the
/// counter floor below which the recipient already has everything.
///
/// `sender` is the FSIC of the side computing what to queue; `recipient` is
/// the FSIC of the peer. An instance is included in the result (with its
/// floor) iff the sender's counter for it exceeds the recipient's floor --
/// i.e. the sender has strictly more than the recipient already claims.
#[must_use]
pub fn diff_fsic(sender: &Fsic, recipient: &Fsic) -> BTreeMap<InstanceId, Counter> {
    sender
        .iter()
        .filter_map(|(instance, &sender_counter)| {
            let floor = recipient.get(instance).copied().unwrap_or(0);
            (sender_counter > floor).then_some((instance.clone(), floor))
        })
        .collect()
}

/// Advances local DMC rows after a successful dequeue: for every instance
/// the sender reported in `sender_fsic` and every prefix in the transfer's
/// `filter`, this side now holds everything that instance wrote at or below
/// the sender's claimed counter within that prefix, so the local floor may
/// rise to match it.
///
/// A DMC floor never regresses -- it is raised to `max(existing, claimed)`,
/// never lowered -- which keeps the invariant
/// `DMC(i, p) <= min over matching r of RMC(r, i).counter` intact even if
/// this runs more than once for the same transfer.
///
/// This must run after the dequeue pipeline's buffer purge, not before --
/// callers invoke it once [`crate::merge::dequeue_into_store`] has returned
/// successfully.
pub fn update_fsics_after_dequeue(repo: &dyn SyncRepository, sender_fsic: &Fsic, filter: &Filter) {
    let existing = repo.dmc_rows();
    for prefix in filter.prefixes() {
        for (instance, &claimed) in sender_fsic {
            let floor = existing
                .iter()
                .find(|dmc| &dmc.instance_id == instance && &dmc.partition_prefix == prefix)
                .map_or(0, |dmc| dmc.counter);
            if claimed > floor {
                repo.put_dmc(DatabaseMaxCounter {
                    instance_id: instance.clone(),
                    partition_prefix: prefix.clone(),
                    counter: claimed,
                });
            }
        }
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn instance_for(n: u8) -> InstanceId {
        InstanceId::parse(format!("{:02x}", n).repeat(16)).unwrap()
    }

    fn arb_fsic() -> impl Strategy<Value = Fsic> {
        prop::collection::vec((0u8..4, 0u64..50), 0..6).prop_map(|pairs| pairs.into_iter().map(|(n, c)| (instance_for(n), c)).collect())
    }

    proptest! {
        /// Every floor `diff_fsic` returns is strictly below the sender's
        /// own counter for that instance.
        #[test]
        fn diffed_floor_never_reaches_sender_counter(sender in arb_fsic(), recipient in arb_fsic()) {
            let floors = diff_fsic(&sender, &recipient);
            for (instance, floor) in &floors {
                prop_assert!(*floor < sender[instance]);
            }
        }

        /// An instance the sender has never written about can never appear
        /// in the diff, regardless of what the recipient claims.
        #[test]
        fn diff_never_invents_an_instance_the_sender_lacks(sender in arb_fsic(), recipient in arb_fsic()) {
            let floors = diff_fsic(&sender, &recipient);
            for instance in floors.keys() {
                prop_assert!(sender.contains_key(instance));
            }
        }

        /// An instance where sender and recipient already agree (or the
        /// recipient claims more) never needs transfer.
        #[test]
        fn agreeing_or_ahead_recipient_excludes_the_instance(sender in arb_fsic()) {
            let recipient = sender.clone();
            let floors = diff_fsic(&sender, &recipient);
            prop_assert!(floors.is_empty());
        }
    }
}
