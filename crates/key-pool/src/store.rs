//! Key records and the free/blocked/deleted state machine.
//!
//! All records and indices live in one aggregate behind a single mutex, so
//! every operation below is atomic with respect to every other one and the
//! indices can never be observed half-updated. The expiry policy is applied
//! through [`KeyStore::reclaim`], which checks and acts in one critical
//! section.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Lease state of a live key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Available to be fetched.
    Free,
    /// Leased out since `blocked_at` (unix seconds).
    Blocked { blocked_at: u64 },
}

/// Which timestamp an expiry check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Creation or last keep-alive.
    Renewal,
    /// Start of the current lease; absent for free keys.
    Blocked,
}

/// Counts of keys per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub free: usize,
    pub blocked: usize,
    pub deleted: usize,
}

/// What [`KeyStore::reclaim`] did to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaimed {
    /// Not renewed within the dead-key TTL; retired for good.
    Deleted,
    /// Leased for longer than the blocked-key TTL; back in the free queue.
    Unblocked,
}

impl StoreStats {
    /// Number of live (free or blocked) keys.
    pub fn live(&self) -> usize {
        self.free + self.blocked
    }
}

#[derive(Debug)]
enum Lease {
    /// Position in the free queue.
    Free { ticket: u64 },
    Blocked { since: u64 },
}

#[derive(Debug)]
struct KeyRecord {
    renewed_at: u64,
    lease: Lease,
}

impl KeyRecord {
    fn expired(&self, threshold: u64, which: Timestamp, now: u64) -> bool {
        let stamp = match (which, &self.lease) {
            (Timestamp::Renewal, _) => self.renewed_at,
            (Timestamp::Blocked, Lease::Blocked { since }) => *since,
            (Timestamp::Blocked, Lease::Free { .. }) => return false,
        };
        now.saturating_sub(stamp) > threshold
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, KeyRecord>,
    /// Free ids keyed by the order in which they became free.
    free: BTreeMap<u64, String>,
    blocked: HashSet<String>,
    /// Every id ever deleted. Never shrinks.
    deleted: HashSet<String>,
    next_ticket: u64,
}

impl Inner {
    fn enqueue_free(&mut self, id: &str) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.free.insert(ticket, id.to_string());
        ticket
    }

    /// Move a blocked key to the back of the free queue. False if `id` is
    /// not blocked.
    fn release(&mut self, id: &str) -> bool {
        if !self.blocked.remove(id) {
            return false;
        }
        let ticket = self.enqueue_free(id);
        if let Some(record) = self.records.get_mut(id) {
            record.lease = Lease::Free { ticket };
        }
        true
    }

    /// Drop a live key from both indices and remember its id.
    fn retire(&mut self, id: &str) -> bool {
        let Some(record) = self.records.remove(id) else {
            return false;
        };
        match record.lease {
            Lease::Free { ticket } => {
                self.free.remove(&ticket);
            }
            Lease::Blocked { .. } => {
                self.blocked.remove(id);
            }
        }
        self.deleted.insert(id.to_string());
        true
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.free.len() + self.blocked.len(), self.records.len());
        for (id, record) in &self.records {
            assert!(!self.deleted.contains(id));
            match record.lease {
                Lease::Free { ticket } => {
                    assert_eq!(self.free.get(&ticket), Some(id));
                    assert!(!self.blocked.contains(id));
                }
                Lease::Blocked { .. } => {
                    assert!(self.blocked.contains(id));
                    assert!(!self.free.values().any(|f| f == id));
                }
            }
        }
    }
}

/// Thread-safe store of all live keys plus the set of deleted ids.
#[derive(Debug, Default)]
pub struct KeyStore {
    inner: Mutex<Inner>,
}

impl KeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves the aggregate consistent before any
        // point that could panic, so a poisoned guard is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new free key.
    ///
    /// Returns false, without touching the store, when `id` is live or was
    /// deleted before.
    pub fn create(&self, id: &str, now: u64) -> bool {
        let mut inner = self.lock();
        if inner.records.contains_key(id) || inner.deleted.contains(id) {
            return false;
        }
        let ticket = inner.enqueue_free(id);
        inner.records.insert(
            id.to_string(),
            KeyRecord {
                renewed_at: now,
                lease: Lease::Free { ticket },
            },
        );
        log::debug!("created key {id}");
        true
    }

    /// Lease the key that has been free the longest.
    ///
    /// Returns `None` when no key is free.
    pub fn fetch(&self, now: u64) -> Option<String> {
        let mut inner = self.lock();
        let (_, id) = inner.free.pop_first()?;
        if let Some(record) = inner.records.get_mut(&id) {
            record.lease = Lease::Blocked { since: now };
        }
        inner.blocked.insert(id.clone());
        log::debug!("leased key {id}");
        Some(id)
    }

    /// Return a key to the free pool.
    ///
    /// Succeeds without effect when the key is already free. Returns false for
    /// unknown keys.
    pub fn unblock(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if !inner.records.contains_key(id) {
            return false;
        }
        if inner.release(id) {
            log::debug!("released key {id}");
        }
        true
    }

    /// Permanently remove a key. Its id can never be issued again.
    pub fn delete(&self, id: &str) -> bool {
        let deleted = self.lock().retire(id);
        if deleted {
            log::debug!("deleted key {id}");
        }
        deleted
    }

    /// Refresh the renewal timestamp of a key in any state.
    pub fn keep_alive(&self, id: &str, now: u64) -> bool {
        let mut inner = self.lock();
        match inner.records.get_mut(id) {
            Some(record) => {
                record.renewed_at = now;
                true
            }
            None => false,
        }
    }

    /// Whether the selected timestamp of `id` is more than `threshold`
    /// seconds before `now`.
    ///
    /// False for unknown keys and for free keys checked against
    /// [`Timestamp::Blocked`].
    pub fn is_expired(&self, id: &str, threshold: u64, which: Timestamp, now: u64) -> bool {
        self.lock()
            .records
            .get(id)
            .is_some_and(|record| record.expired(threshold, which, now))
    }

    /// Apply the expiry policy to one key.
    ///
    /// A key not renewed for more than `dead_ttl` seconds is deleted, even
    /// when its lease has also run out. Otherwise a key leased for more than
    /// `blocked_ttl` seconds is unblocked. The check and the transition
    /// happen under one lock, so a key renewed, released or leased again by
    /// another caller is judged on its current timestamps.
    ///
    /// Returns `None` for unknown keys and when nothing changed.
    pub fn reclaim(&self, id: &str, dead_ttl: u64, blocked_ttl: u64, now: u64) -> Option<Reclaimed> {
        let mut inner = self.lock();
        let (stale, stuck) = {
            let record = inner.records.get(id)?;
            (
                record.expired(dead_ttl, Timestamp::Renewal, now),
                record.expired(blocked_ttl, Timestamp::Blocked, now),
            )
        };

        if stale && inner.retire(id) {
            log::debug!("deleted stale key {id}");
            Some(Reclaimed::Deleted)
        } else if !stale && stuck && inner.release(id) {
            log::debug!("released stuck key {id}");
            Some(Reclaimed::Unblocked)
        } else {
            None
        }
    }

    /// Whether `id` is live or was ever deleted.
    pub fn contains(&self, id: &str) -> bool {
        let inner = self.lock();
        inner.records.contains_key(id) || inner.deleted.contains(id)
    }

    /// Current state of a live key.
    pub fn state(&self, id: &str) -> Option<KeyState> {
        let inner = self.lock();
        inner.records.get(id).map(|record| match record.lease {
            Lease::Free { .. } => KeyState::Free,
            Lease::Blocked { since } => KeyState::Blocked { blocked_at: since },
        })
    }

    /// Snapshot of all live ids, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.lock().records.keys().cloned().collect()
    }

    /// Snapshot of free ids in the order `fetch` would hand them out.
    pub fn free_ids(&self) -> Vec<String> {
        self.lock().free.values().cloned().collect()
    }

    pub fn free_len(&self) -> usize {
        self.lock().free.len()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            free: inner.free.len(),
            blocked: inner.blocked.len(),
            deleted: inner.deleted.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.lock().assert_consistent();
    }
}
