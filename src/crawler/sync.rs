//! Graph sync: reconcile stored edges with a freshly fetched neighbour set

use crate::platform::{AccountRef, Direction};
use crate::storage::{EdgeStore, StorageResult};
use std::collections::BTreeMap;

/// Edges written by one sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub added: usize,
    pub removed: usize,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Makes the stored edges of `account_id` in `direction` equal to `fresh`
///
/// Only the symmetric difference is written, and nothing at all when the sets
/// already agree. Neighbour order and duplicates in `fresh` do not matter.
pub fn sync_edges<E>(
    store: &mut E,
    account_id: i64,
    direction: Direction,
    fresh: &[AccountRef],
) -> StorageResult<SyncOutcome>
where
    E: EdgeStore + ?Sized,
{
    let current = store.neighbor_ids(account_id, direction)?;

    let fresh: BTreeMap<i64, &AccountRef> = fresh.iter().map(|a| (a.id, a)).collect();

    let to_add: Vec<AccountRef> = fresh
        .values()
        .filter(|a| !current.contains(&a.id))
        .map(|a| (*a).clone())
        .collect();

    let mut to_remove: Vec<i64> = current
        .iter()
        .filter(|id| !fresh.contains_key(id))
        .copied()
        .collect();
    to_remove.sort_unstable();

    let outcome = SyncOutcome {
        added: to_add.len(),
        removed: to_remove.len(),
    };

    if outcome.is_noop() {
        tracing::debug!(
            "{} edges of account {} unchanged ({})",
            direction.label(),
            account_id,
            current.len()
        );
        return Ok(outcome);
    }

    store.apply_edge_diff(account_id, direction, &to_add, &to_remove)?;

    tracing::debug!(
        "{} edges of account {}: +{} -{}",
        direction.label(),
        account_id,
        outcome.added,
        outcome.removed
    );

    Ok(outcome)
}
