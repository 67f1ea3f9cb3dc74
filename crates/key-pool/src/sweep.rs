//! Expiry sweep over the key store.

use std::time::Duration;

use crate::store::{KeyStore, Reclaimed};

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ids in the snapshot the sweep walked.
    pub scanned: usize,
    /// Keys deleted for missing their keep-alive.
    pub deleted: usize,
    /// Leases returned to the free pool after timing out.
    pub unblocked: usize,
}

impl SweepReport {
    /// True when the sweep reclaimed nothing.
    pub fn is_empty(&self) -> bool {
        self.deleted == 0 && self.unblocked == 0
    }
}

/// Apply the expiry policy to every id live at `now`.
///
/// Staleness wins: a key past `dead_ttl` is deleted even if its lease has
/// also timed out. Otherwise a key leased for longer than `blocked_ttl` is
/// unblocked. Each key is judged and changed by one [`KeyStore::reclaim`]
/// call, so keys removed, renewed or released by other callers after the
/// snapshot is taken are left as they are and not counted.
pub fn sweep(store: &KeyStore, dead_ttl: Duration, blocked_ttl: Duration, now: u64) -> SweepReport {
    let ids = store.ids();
    let mut report = SweepReport {
        scanned: ids.len(),
        ..SweepReport::default()
    };

    for id in &ids {
        match store.reclaim(id, dead_ttl.as_secs(), blocked_ttl.as_secs(), now) {
            Some(Reclaimed::Deleted) => report.deleted += 1,
            Some(Reclaimed::Unblocked) => report.unblocked += 1,
            None => {}
        }
    }

    report
}
