//! # Pool Error Types
//!
//! All errors that can occur while building or using a pool.
//!
//! A single pool running out of contiguous space is not an error: it is
//! reported as `None` so the multi-pool can try the next pool or grow.

use thiserror::Error;

use crate::chunk::BytePtr;

/// Errors that can occur in the pool system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Deallocation of a pointer that is not a live allocation.
    ///
    /// Covers double frees, foreign pointers and pointers into the middle
    /// of a granted range.
    #[error("invalid free: {ptr} is not a live allocation")]
    InvalidFree {
        /// The rejected pointer.
        ptr: BytePtr,
    },

    /// Access through a pointer that is not a live allocation.
    #[error("dangling pointer: no live allocation at {ptr}")]
    Dangling {
        /// The rejected pointer.
        ptr: BytePtr,
    },

    /// The storage provider could not supply a new backing buffer.
    #[error("storage exhausted: requested {requested} bytes, {available} bytes available")]
    StorageExhausted {
        /// Bytes requested for the new buffer.
        requested: usize,
        /// Bytes the provider could still hand out.
        available: usize,
    },

    /// A typed view could not be reinterpreted from the pool bytes.
    #[error("typed view cast failed: {0}")]
    ViewCast(String),

    /// Invalid pool configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
}

impl From<toml::de::Error> for PoolError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<std::io::Error> for PoolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
