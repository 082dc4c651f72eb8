//! # Pool Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! chunk_size = 128
//! initial_chunks = 64
//! growth_factor = 2
//! max_total_bytes = 16777216
//! ```
//!
//! Every field is optional and falls back to [`PoolConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk::{DEFAULT_CHUNK_SIZE, WORD_SIZE};
use crate::error::{PoolError, PoolResult};
use crate::storage::HeapStorage;

/// Construction-time parameters for pools and multi-pools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Allocation granularity in bytes. Must be a positive multiple of 8.
    pub chunk_size: usize,
    /// Capacity in chunks of the first pool of a multi-pool.
    pub initial_chunks: usize,
    /// Multiplier applied to the largest pool when a multi-pool grows.
    pub growth_factor: usize,
    /// Upper bound on backing bytes across all pools. `None` is unlimited.
    pub max_total_bytes: Option<usize>,
    /// Byte written to every position of a new backing buffer.
    pub fill_byte: u8,
    /// Buffers of at least this many bytes are initialized in parallel.
    pub parallel_init_threshold: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            initial_chunks: 4,
            growth_factor: 2,
            max_total_bytes: None,
            fill_byte: 0,
            parallel_init_threshold: HeapStorage::DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl PoolConfig {
    /// Default configuration with a different initial capacity.
    #[must_use]
    pub fn with_initial_chunks(initial_chunks: usize) -> Self {
        Self {
            initial_chunks,
            ..Self::default()
        }
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigParse`] on malformed TOML and
    /// [`PoolError::InvalidConfig`] on out-of-range values.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] if the file cannot be read, otherwise
    /// the errors of [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> PoolResult<()> {
        if self.chunk_size == 0 || self.chunk_size % WORD_SIZE != 0 {
            return Err(PoolError::InvalidConfig(format!(
                "chunk_size must be a positive multiple of {WORD_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.initial_chunks == 0 {
            return Err(PoolError::InvalidConfig(
                "initial_chunks must be greater than zero".to_string(),
            ));
        }
        if self.growth_factor == 0 {
            return Err(PoolError::InvalidConfig(
                "growth_factor must be at least 1".to_string(),
            ));
        }
        if self.initial_chunks.checked_mul(self.chunk_size).is_none() {
            return Err(PoolError::InvalidConfig(format!(
                "{} chunks of {} bytes overflow the address space",
                self.initial_chunks, self.chunk_size
            )));
        }
        Ok(())
    }
}
