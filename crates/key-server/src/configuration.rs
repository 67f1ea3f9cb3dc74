use std::io;
use std::path::Path;
use std::time::Duration;

use key_pool::PoolConfig;
use serde::Deserialize;
use thiserror::Error;

/// Why a server configuration could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Top-level server configuration, read from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub listen: String,
    pub pool: PoolSettings,
    pub ttl: TtlSettings,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

/// Sizing of the key pool.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolSettings {
    /// Free keys generated at startup, and the default `count` for generate.
    pub size: usize,
    /// Default key length for generate.
    pub key_length: usize,
    /// Largest `count` a single generate request may ask for.
    pub max_generate: usize,
    /// Consecutive collisions after which generate gives up.
    pub max_generate_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TtlSettings {
    pub dead_secs: u64,
    pub blocked_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            pool: PoolSettings::default(),
            ttl: TtlSettings::default(),
            sweep_interval_secs: 5,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: 10,
            key_length: 16,
            max_generate: 1_000,
            max_generate_attempts: key_pool::DEFAULT_MAX_GENERATE_ATTEMPTS,
        }
    }
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            dead_secs: key_pool::DEFAULT_DEAD_TTL.as_secs(),
            blocked_secs: key_pool::DEFAULT_BLOCKED_TTL.as_secs(),
        }
    }
}

impl ServerConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.key_length == 0 {
            return Err(ConfigError::Invalid("pool.key_length must be at least 1"));
        }
        if self.pool.max_generate == 0 || self.pool.max_generate_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pool.max_generate and pool.max_generate_attempts must be positive",
            ));
        }
        if self.pool.size > self.pool.max_generate {
            return Err(ConfigError::Invalid(
                "pool.size must not exceed pool.max_generate",
            ));
        }
        if self.ttl.dead_secs == 0 || self.ttl.blocked_secs == 0 {
            return Err(ConfigError::Invalid("ttl values must be positive"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive"));
        }
        if self.ttl.blocked_secs >= self.ttl.dead_secs {
            log::warn!(
                "ttl.blocked_secs ({}) >= ttl.dead_secs ({}): stuck leases will be deleted, not unblocked",
                self.ttl.blocked_secs,
                self.ttl.dead_secs
            );
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new()
            .with_dead_ttl(Duration::from_secs(self.ttl.dead_secs))
            .with_blocked_ttl(Duration::from_secs(self.ttl.blocked_secs))
            .with_max_generate_attempts(self.pool.max_generate_attempts)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
listen: "127.0.0.1:9000"
pool:
  size: 25
  key_length: 12
  max_generate: 50
  max_generate_attempts: 7
ttl:
  dead_secs: 120
  blocked_secs: 30
sweep_interval_secs: 2
"#;

        let config: ServerConfig = serde_yaml::from_str(yaml).expect("Failed to deserialize config");

        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.pool.size, 25);
        assert_eq!(config.pool.key_length, 12);
        assert_eq!(config.pool.max_generate, 50);
        assert_eq!(config.sweep_interval(), Duration::from_secs(2));

        let pool = config.pool_config();
        assert_eq!(pool.dead_ttl, Duration::from_secs(120));
        assert_eq!(pool.blocked_ttl, Duration::from_secs(30));
        assert_eq!(pool.max_generate_attempts, 7);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ServerConfig = serde_yaml::from_str("pool:\n  size: 3\n").unwrap();
        assert_eq!(config.pool.size, 3);
        assert_eq!(config.pool.key_length, 16);
        assert_eq!(config.ttl, TtlSettings::default());
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.pool_config(), PoolConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.pool.key_length = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.ttl.blocked_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.pool.size = config.pool.max_generate + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ServerConfig::default();
        config.pool.max_generate_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"listen: \"127.0.0.1:0\"\nsweep_interval_secs: 1\n")
            .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.listen, "127.0.0.1:0");
        assert_eq!(config.sweep_interval_secs, 1);
    }

    #[test]
    fn test_load_errors_keep_their_cause() {
        let missing = ServerConfig::load("/nonexistent/key-server.yaml");
        assert!(matches!(missing, Err(ConfigError::Io(ref e)) if e.kind() == io::ErrorKind::NotFound));

        let mut garbled = tempfile::NamedTempFile::new().unwrap();
        garbled.write_all(b"pool: [unclosed\n").unwrap();
        assert!(matches!(
            ServerConfig::load(garbled.path()),
            Err(ConfigError::Parse(_))
        ));

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        invalid.write_all(b"pool:\n  key_length: 0\n").unwrap();
        let err = ServerConfig::load(invalid.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(err.to_string(), "invalid config: pool.key_length must be at least 1");
    }
}
