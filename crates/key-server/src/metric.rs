//! Per-minute response counts for the key API.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Minutes of history kept by [`Metrics::new`].
pub const DEFAULT_RETENTION_MINUTES: u64 = 60;

/// Response count per HTTP status.
pub type StatusCounts = HashMap<u16, u64>;

/// In-memory response counts per minute and API operation.
///
/// Only the most recent `retention` minutes are kept; older buckets are
/// dropped whenever a newer minute is recorded.
pub struct Metrics {
    retention_minutes: u64,
    minutes: Mutex<BTreeMap<u64, HashMap<String, StatusCounts>>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION_MINUTES)
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `minutes` minute buckets (at least one).
    pub fn with_retention(minutes: u64) -> Self {
        Self {
            retention_minutes: minutes.max(1),
            minutes: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, HashMap<String, StatusCounts>>> {
        self.minutes.lock().expect("metrics store poisoned")
    }

    /// Record a response status for an operation at the current wall-clock time.
    pub fn record(&self, operation: &str, status: u16) {
        self.record_at(operation, status, SystemTime::now());
    }

    /// Record a response status at a provided time.
    pub fn record_at(&self, operation: &str, status: u16, at: SystemTime) {
        let minute = Self::minute_bucket(at);
        let mut minutes = self.lock();
        *minutes
            .entry(minute)
            .or_default()
            .entry(operation.to_string())
            .or_default()
            .entry(status)
            .or_insert(0) += 1;

        let Some(&newest) = minutes.keys().next_back() else {
            return;
        };
        let oldest = newest.saturating_sub(self.retention_minutes - 1);
        while let Some(entry) = minutes.first_entry() {
            if *entry.key() >= oldest {
                break;
            }
            entry.remove();
        }
    }

    /// Per-minute counts for one operation. Empty when nothing was recorded.
    pub fn snapshot(&self, operation: &str) -> HashMap<u64, StatusCounts> {
        self.lock()
            .iter()
            .filter_map(|(minute, ops)| Some((*minute, ops.get(operation)?.clone())))
            .collect()
    }

    /// Counts per status for one operation across the retained minutes.
    pub fn totals(&self, operation: &str) -> StatusCounts {
        let mut totals = StatusCounts::new();
        for counts in self.snapshot(operation).values() {
            for (status, count) in counts {
                *totals.entry(*status).or_insert(0) += *count;
            }
        }
        totals
    }

    /// Counts per operation and status across the retained minutes, in a
    /// stable order for rendering.
    pub fn summary(&self) -> BTreeMap<String, BTreeMap<u16, u64>> {
        let mut summary: BTreeMap<String, BTreeMap<u16, u64>> = BTreeMap::new();
        for ops in self.lock().values() {
            for (operation, counts) in ops {
                let per_status = summary.entry(operation.clone()).or_default();
                for (status, count) in counts {
                    *per_status.entry(*status).or_insert(0) += *count;
                }
            }
        }
        summary
    }

    fn minute_bucket(at: SystemTime) -> u64 {
        at.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            / 60
    }
}
