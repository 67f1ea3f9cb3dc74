//! Background expiry sweeps for the key pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use key_pool::{KeyPool, SweepReport};
use pingora::services::background::BackgroundService;

/// Background service that calls [`KeyPool::cleanup`] on a fixed cadence.
pub struct KeySweeper {
    pool: Arc<KeyPool>,
    interval: Duration,
}

impl KeySweeper {
    pub fn new(pool: Arc<KeyPool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// Run a single sweep and log what it reclaimed.
    pub fn sweep_once(&self) -> SweepReport {
        let report = self.pool.cleanup();
        if report.is_empty() {
            log::debug!("sweep scanned {} keys, nothing expired", report.scanned);
        } else {
            log::info!(
                "sweep scanned {} keys: {} deleted, {} unblocked",
                report.scanned,
                report.deleted,
                report.unblocked
            );
        }
        report
    }
}

#[async_trait]
impl BackgroundService for KeySweeper {
    async fn start(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            // Check for shutdown signal
            if *shutdown.borrow() {
                return;
            }

            // Wait for the next tick or shutdown
            tokio::select! {
                _ = shutdown.changed() => {
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.sweep_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use key_pool::{KeyState, ManualClock, PoolConfig};

    fn pool_with_clock() -> (Arc<KeyPool>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let pool = Arc::new(KeyPool::with_clock(PoolConfig::default(), clock.clone()));
        (pool, clock)
    }

    #[test]
    fn sweep_once_reclaims_expired_leases() {
        let (pool, clock) = pool_with_clock();
        pool.generate(2, 12).unwrap();
        let leased = pool.fetch().unwrap();

        let sweeper = KeySweeper::new(pool.clone(), Duration::from_secs(1));
        assert!(sweeper.sweep_once().is_empty());

        clock.advance(Duration::from_secs(61));
        let report = sweeper.sweep_once();
        assert_eq!(report.unblocked, 1);
        assert_eq!(pool.state(&leased), Some(KeyState::Free));
    }

    #[tokio::test]
    async fn background_loop_sweeps_until_shutdown() {
        let (pool, clock) = pool_with_clock();
        pool.generate(1, 12).unwrap();
        clock.advance(Duration::from_secs(301));

        let sweeper = Arc::new(KeySweeper::new(pool.clone(), Duration::from_millis(10)));
        let (tx, rx) = tokio::sync::watch::channel(false);
        let task = {
            let sweeper = sweeper.clone();
            tokio::spawn(async move { sweeper.start(rx).await })
        };

        for _ in 0..100 {
            if pool.stats().deleted == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.stats().deleted, 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
