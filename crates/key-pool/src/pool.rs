//! The public lease-pool facade.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::generator::{key_space, random_key};
use crate::store::{KeyState, KeyStore, StoreStats};
use crate::sweep::{SweepReport, sweep};

/// A pool of unique lease keys.
///
/// `KeyPool` is `Send + Sync`; share it between callers through an `Arc`.
pub struct KeyPool {
    config: PoolConfig,
    store: KeyStore,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl KeyPool {
    /// Create an empty pool using wall-clock time and an entropy-seeded RNG.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty pool with an explicit clock and an entropy-seeded RNG.
    pub fn with_clock(config: PoolConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(config, clock, Box::new(StdRng::from_entropy()))
    }

    /// Create an empty pool with an explicit clock and random source.
    pub fn with_parts(
        config: PoolConfig,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            config,
            store: KeyStore::new(),
            clock,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Top up the free pool to at least `count` keys of `key_length`
    /// characters and return every free key in fetch order.
    ///
    /// Candidates that are live or were ever deleted are discarded.
    ///
    /// # Errors
    /// * `InvalidKeyLength` if `key_length` is zero
    /// * `CapacityExceeded` if the key space cannot fit the missing keys
    /// * `RetriesExhausted` if too many candidates in a row collide
    pub fn generate(&self, count: usize, key_length: usize) -> Result<Vec<String>> {
        if key_length == 0 {
            return Err(PoolError::InvalidKeyLength(key_length));
        }

        let stats = self.store.stats();
        let missing = count.saturating_sub(stats.free);
        let used = stats.live() + stats.deleted;
        let capacity = key_space(key_length);
        // Keys of other lengths may be counted in `used`, which only makes
        // this check stricter.
        if (used as u128).saturating_add(missing as u128) > capacity {
            return Err(PoolError::CapacityExceeded {
                key_length,
                requested: missing,
                used,
                capacity,
            });
        }

        let mut created = 0usize;
        let mut collisions = 0u32;
        while self.store.free_len() < count {
            let candidate = self.draw(key_length);

            // Cheap pre-filter; `create` re-checks under the store lock.
            if !self.store.contains(&candidate) && self.store.create(&candidate, self.clock.now())
            {
                created += 1;
                collisions = 0;
                continue;
            }

            collisions += 1;
            if collisions >= self.config.max_generate_attempts {
                log::warn!(
                    "giving up key generation after {collisions} collisions ({created} created)"
                );
                return Err(PoolError::RetriesExhausted {
                    attempts: collisions,
                });
            }
        }

        if created > 0 {
            log::info!("generated {created} keys of length {key_length}");
        }
        Ok(self.store.free_ids())
    }

    fn draw(&self, key_length: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        random_key(&mut **rng, key_length)
    }

    /// Lease the longest-free key, or `None` if every key is leased.
    pub fn fetch(&self) -> Option<String> {
        self.store.fetch(self.clock.now())
    }

    /// Return a leased key to the pool. False if the key is unknown.
    pub fn unblock_key(&self, id: &str) -> bool {
        self.store.unblock(id)
    }

    /// Permanently retire a key. False if the key is unknown.
    pub fn delete_key(&self, id: &str) -> bool {
        self.store.delete(id)
    }

    /// Renew a key so the sweep does not treat it as dead.
    pub fn keep_alive_key(&self, id: &str) -> bool {
        self.store.keep_alive(id, self.clock.now())
    }

    /// Run one expiry sweep with the configured TTLs.
    pub fn cleanup(&self) -> SweepReport {
        sweep(
            &self.store,
            self.config.dead_ttl,
            self.config.blocked_ttl,
            self.clock.now(),
        )
    }

    pub fn state(&self, id: &str) -> Option<KeyState> {
        self.store.state(id)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}
