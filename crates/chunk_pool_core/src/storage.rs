//! # Backing Storage
//!
//! Providers hand out the raw buffers that pools carve into chunks.
//! A buffer is fully initialized before it is returned, so a pool never
//! observes a partially filled buffer.
//!
//! Buffers are word (`u64`) slices so every chunk start is 8-byte
//! aligned, which lets typed views cast plain-old-data element types
//! without copying.

use std::num::NonZeroUsize;
use std::thread;

use crate::chunk::WORD_SIZE;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// Source of backing buffers for pools.
pub trait StorageProvider {
    /// Returns an initialized buffer holding at least `bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StorageExhausted`] if no buffer of that size
    /// can be produced.
    fn acquire(&mut self, bytes: usize) -> PoolResult<Box<[u64]>>;
}

/// Heap-backed provider with an optional total byte limit.
///
/// Buffers larger than the parallel threshold are filled by scoped
/// worker threads.
#[derive(Debug, Clone)]
pub struct HeapStorage {
    /// Maximum bytes handed out over the provider's lifetime.
    limit: Option<usize>,
    /// Bytes handed out so far.
    acquired: usize,
    /// Byte written to every position of a fresh buffer.
    fill_byte: u8,
    /// Buffers of at least this many bytes are filled in parallel.
    parallel_threshold: usize,
}

impl Default for HeapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapStorage {
    /// Default parallel fill threshold (1 MiB).
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 20;

    /// Unlimited, zero-filled provider.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limit: None,
            acquired: 0,
            fill_byte: 0,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Provider that refuses to hand out more than `limit` bytes in total.
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        let mut storage = Self::new();
        storage.limit = Some(limit);
        storage
    }

    /// Provider configured from a [`PoolConfig`].
    #[must_use]
    pub const fn from_config(config: &PoolConfig) -> Self {
        Self {
            limit: config.max_total_bytes,
            acquired: 0,
            fill_byte: config.fill_byte,
            parallel_threshold: config.parallel_init_threshold,
        }
    }

    /// Bytes handed out so far.
    #[inline]
    #[must_use]
    pub const fn acquired_bytes(&self) -> usize {
        self.acquired
    }

    /// Bytes still available, or `None` if unlimited.
    #[inline]
    #[must_use]
    pub fn remaining_bytes(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.acquired))
    }
}

impl StorageProvider for HeapStorage {
    fn acquire(&mut self, bytes: usize) -> PoolResult<Box<[u64]>> {
        let words = bytes.div_ceil(WORD_SIZE);

        if let Some(available) = self.remaining_bytes() {
            if bytes > available {
                tracing::warn!(
                    "storage limit reached: requested {} bytes, {} available",
                    bytes,
                    available
                );
                return Err(PoolError::StorageExhausted {
                    requested: bytes,
                    available,
                });
            }
        }

        let mut buffer: Vec<u64> = Vec::new();
        if buffer.try_reserve_exact(words).is_err() {
            tracing::warn!("heap refused a {} byte buffer", bytes);
            return Err(PoolError::StorageExhausted {
                requested: bytes,
                available: 0,
            });
        }

        let pattern = u64::from_ne_bytes([self.fill_byte; WORD_SIZE]);
        if bytes >= self.parallel_threshold && pattern != 0 {
            buffer.resize(words, 0);
            parallel_fill(&mut buffer, pattern);
        } else {
            buffer.resize(words, pattern);
        }

        self.acquired += bytes;
        tracing::debug!("acquired {} byte buffer ({} total)", bytes, self.acquired);

        Ok(buffer.into_boxed_slice())
    }
}

/// Fills `words` with `pattern` using one scoped thread per core.
fn parallel_fill(words: &mut [u64], pattern: u64) {
    let threads = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let per_thread = words.len().div_ceil(threads).max(1);

    thread::scope(|scope| {
        for part in words.chunks_mut(per_thread) {
            scope.spawn(move || part.fill(pattern));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_storage_zeroed() {
        let mut storage = HeapStorage::new();
        let buffer = storage.acquire(512).unwrap();
        assert_eq!(buffer.len(), 512 / WORD_SIZE);
        assert!(buffer.iter().all(|&w| w == 0));
        assert_eq!(storage.acquired_bytes(), 512);
        assert!(storage.remaining_bytes().is_none());
    }

    #[test]
    fn test_heap_storage_limit() {
        let mut storage = HeapStorage::with_limit(1024);
        assert!(storage.acquire(768).is_ok());
        assert_eq!(storage.remaining_bytes(), Some(256));

        let err = storage.acquire(512).unwrap_err();
        assert_eq!(
            err,
            PoolError::StorageExhausted {
                requested: 512,
                available: 256
            }
        );
        assert_eq!(storage.acquired_bytes(), 768);
    }

    #[test]
    fn test_parallel_fill_pattern() {
        let config = PoolConfig {
            fill_byte: 0xA5,
            parallel_init_threshold: 64,
            ..PoolConfig::default()
        };
        let mut storage = HeapStorage::from_config(&config);
        let buffer = storage.acquire(4096).unwrap();
        assert!(buffer.iter().all(|&w| w == 0xA5A5_A5A5_A5A5_A5A5));
    }
}
