//! Configuration for key expiry and generation.

use std::time::Duration;

/// Keys not renewed for this long are deleted by the sweep.
pub const DEFAULT_DEAD_TTL: Duration = Duration::from_secs(300);

/// Keys leased for this long are returned to the free pool by the sweep.
pub const DEFAULT_BLOCKED_TTL: Duration = Duration::from_secs(60);

/// Consecutive candidate collisions tolerated by a single `generate` call.
pub const DEFAULT_MAX_GENERATE_ATTEMPTS: u32 = 10_000;

/// Configuration for a [`KeyPool`](crate::KeyPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum time a key may go without a keep-alive before it is deleted.
    pub dead_ttl: Duration,
    /// Maximum time a key may stay leased before it is forcibly unblocked.
    pub blocked_ttl: Duration,
    /// Consecutive collisions after which `generate` gives up.
    pub max_generate_attempts: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            dead_ttl: DEFAULT_DEAD_TTL,
            blocked_ttl: DEFAULT_BLOCKED_TTL,
            max_generate_attempts: DEFAULT_MAX_GENERATE_ATTEMPTS,
        }
    }
}

impl PoolConfig {
    /// Create a config with the default TTLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dead-key TTL.
    pub fn with_dead_ttl(mut self, ttl: Duration) -> Self {
        self.dead_ttl = ttl;
        self
    }

    /// Set the blocked-key TTL.
    pub fn with_blocked_ttl(mut self, ttl: Duration) -> Self {
        self.blocked_ttl = ttl;
        self
    }

    /// Set the collision budget for `generate`.
    pub fn with_max_generate_attempts(mut self, attempts: u32) -> Self {
        self.max_generate_attempts = attempts.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.dead_ttl, Duration::from_secs(300));
        assert_eq!(config.blocked_ttl, Duration::from_secs(60));
        assert_eq!(config.max_generate_attempts, DEFAULT_MAX_GENERATE_ATTEMPTS);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PoolConfig::new()
            .with_dead_ttl(Duration::from_secs(30))
            .with_blocked_ttl(Duration::from_secs(5))
            .with_max_generate_attempts(0);
        assert_eq!(config.dead_ttl, Duration::from_secs(30));
        assert_eq!(config.blocked_ttl, Duration::from_secs(5));
        assert_eq!(config.max_generate_attempts, 1);
    }
}
