//! Error types for key pool operations.

use thiserror::Error;

/// Errors that can occur while generating keys.
///
/// Everything else the pool does reports unknown keys as `false` or `None`
/// rather than as an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Key length must be at least one character.
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    /// The key space for this length cannot hold the requested keys.
    #[error(
        "Key space exhausted: {requested} more keys of length {key_length} requested, \
         {used} of {capacity} ids already used"
    )]
    CapacityExceeded {
        key_length: usize,
        requested: usize,
        used: usize,
        capacity: u128,
    },

    /// Too many consecutive candidates collided with existing or deleted keys.
    #[error("Gave up after {attempts} consecutive key collisions")]
    RetriesExhausted { attempts: u32 },
}

/// Result type alias for key pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
