//! In-memory pool of unique, leasable keys.
//!
//! This crate provides functionality for:
//! - Generating short random keys that are never reused, even after deletion
//! - Leasing keys out (`fetch`) and taking them back (`unblock_key`, `delete_key`)
//! - Renewing keys (`keep_alive_key`) and reclaiming abandoned ones (`cleanup`)
//!
//! # Key lifecycle
//!
//! ```text
//! generate --> Free --fetch--> Blocked
//!               ^                 |
//!               +----unblock------+
//!
//! Free | Blocked --delete--> Deleted (id retired forever)
//! ```
//!
//! `cleanup` deletes keys that have not been renewed within the dead-key TTL
//! and unblocks keys leased for longer than the blocked-key TTL. Calling it
//! on a cadence is up to the host.
//!
//! # Example
//!
//! ```rust
//! use key_pool::{KeyPool, PoolConfig};
//!
//! let pool = KeyPool::new(PoolConfig::default());
//! let free = pool.generate(3, 8).unwrap();
//! assert_eq!(free.len(), 3);
//!
//! let key = pool.fetch().unwrap();
//! assert_eq!(key, free[0]);
//! assert!(pool.keep_alive_key(&key));
//! assert!(pool.unblock_key(&key));
//! assert!(pool.delete_key(&key));
//! assert!(!pool.unblock_key(&key));
//! ```

mod clock;
mod config;
mod error;
mod generator;
mod pool;
mod store;
mod sweep;

// Public re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_BLOCKED_TTL, DEFAULT_DEAD_TTL, DEFAULT_MAX_GENERATE_ATTEMPTS, PoolConfig,
};
pub use error::{PoolError, Result};
pub use generator::{ALPHABET, key_space, random_key};
pub use pool::KeyPool;
pub use store::{KeyState, KeyStore, Reclaimed, StoreStats, Timestamp};
pub use sweep::{SweepReport, sweep};
