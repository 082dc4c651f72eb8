//! # Multi-Pool
//!
//! A growable, append-only list of [`ChunkPool`]s plus a routing table
//! from issued pointer to owning pool.
//!
//! ```text
//!   allocate(n) ──► pool 0 ──► pool 1 ──► ... ──► pool k      (creation order)
//!                     │          │                  │
//!                     └──────────┴──── first hit ───┴──► routes[ptr] = i
//!
//!   no hit ──► append pool of max(growth × largest, chunks(n)) ──► allocate
//! ```
//!
//! Pools are never removed or reordered, so the pool index stored in
//! the routing table stays valid for the life of the multi-pool.

use std::collections::HashMap;
use std::fmt;

use crate::chunk::{reserved_chunks, BytePtr};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::ChunkPool;
use crate::region::Region;
use crate::storage::{HeapStorage, StorageProvider};

/// Growable collection of chunk pools with fallback-then-grow allocation.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Wrap it in a mutex to share it.
///
/// # Example
///
/// ```rust
/// use chunk_pool_core::MultiPool;
///
/// let mut pool = MultiPool::new(4); // one pool of 4 x 128 bytes
///
/// // Too big for the first pool: a second pool of 8 chunks is appended.
/// let ptr = pool.allocate(8 * 128).unwrap();
/// assert_eq!(pool.pool_count(), 2);
///
/// pool.deallocate(ptr);
/// ```
pub struct MultiPool<S: StorageProvider = HeapStorage> {
    /// Pools in creation order.
    pools: Vec<ChunkPool>,
    /// Issued pointer -> index into `pools`.
    routes: HashMap<BytePtr, usize>,
    /// Source of buffers for new pools.
    storage: S,
    /// Bytes per chunk, shared by every pool.
    chunk_size: usize,
    /// Multiplier applied to the largest pool when growing.
    growth_factor: usize,
}

impl MultiPool<HeapStorage> {
    /// Creates a multi-pool whose first pool holds `initial_chunks`
    /// chunks of [`DEFAULT_CHUNK_SIZE`](crate::DEFAULT_CHUNK_SIZE) bytes.
    ///
    /// # Panics
    ///
    /// Panics if `initial_chunks` is zero or the first buffer cannot be
    /// allocated.
    #[must_use]
    pub fn new(initial_chunks: usize) -> Self {
        assert!(initial_chunks > 0, "Capacity must be greater than zero");

        match Self::from_config(&PoolConfig::with_initial_chunks(initial_chunks)) {
            Ok(pool) => pool,
            Err(err) => panic!("cannot build a multi-pool of {initial_chunks} chunks: {err}"),
        }
    }

    /// Creates a heap-backed multi-pool from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for an invalid configuration
    /// and [`PoolError::StorageExhausted`] if the first pool does not fit
    /// in `max_total_bytes`.
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        Self::with_storage(config, HeapStorage::from_config(config))
    }
}

impl<S: StorageProvider> MultiPool<S> {
    /// Creates a multi-pool drawing buffers from `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for an invalid configuration
    /// and propagates the provider's errors for the first pool.
    pub fn with_storage(config: &PoolConfig, mut storage: S) -> PoolResult<Self> {
        config.validate()?;
        let first = ChunkPool::with_storage(config.initial_chunks, config.chunk_size, &mut storage)?;

        Ok(Self {
            pools: vec![first],
            routes: HashMap::new(),
            storage,
            chunk_size: config.chunk_size,
            growth_factor: config.growth_factor,
        })
    }

    /// Allocates `byte_count` bytes from the first pool that can serve
    /// it, appending a new pool if none can.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::StorageExhausted`] if a new pool was needed
    /// and the storage provider could not supply it. The multi-pool is
    /// unchanged in that case.
    pub fn allocate(&mut self, byte_count: usize) -> PoolResult<BytePtr> {
        for (index, pool) in self.pools.iter_mut().enumerate() {
            if let Some(ptr) = pool.allocate(byte_count) {
                self.routes.insert(ptr, index);
                return Ok(ptr);
            }
        }

        let index = self.grow(byte_count)?;
        let Some(ptr) = self.pools[index].allocate(byte_count) else {
            panic!(
                "fresh pool {index} of {} chunks cannot hold {byte_count} bytes",
                self.pools[index].total_chunks()
            );
        };
        self.routes.insert(ptr, index);
        Ok(ptr)
    }

    /// Appends a pool large enough for `byte_count` bytes and returns
    /// its index.
    ///
    /// The preferred capacity is `growth_factor` times the largest
    /// existing pool. If the provider cannot supply that, a pool of
    /// exactly the required size is tried before giving up.
    fn grow(&mut self, byte_count: usize) -> PoolResult<usize> {
        let needed = reserved_chunks(byte_count, self.chunk_size);
        let largest = self
            .pools
            .iter()
            .map(ChunkPool::total_chunks)
            .max()
            .unwrap_or(0);
        let preferred = largest.saturating_mul(self.growth_factor).max(needed);

        let pool = match self.new_pool(preferred) {
            Ok(pool) => pool,
            Err(PoolError::StorageExhausted { .. }) if preferred > needed => {
                tracing::warn!(
                    "could not grow to {} chunks, retrying with {}",
                    preferred,
                    needed
                );
                self.new_pool(needed)?
            }
            Err(err) => return Err(err),
        };

        tracing::debug!(
            "multi-pool grew: pool {} with {} chunks for a {} byte request",
            self.pools.len(),
            pool.total_chunks(),
            byte_count
        );
        self.pools.push(pool);
        Ok(self.pools.len() - 1)
    }

    fn new_pool(&mut self, chunks: usize) -> PoolResult<ChunkPool> {
        if chunks.checked_mul(self.chunk_size).is_none() {
            return Err(PoolError::StorageExhausted {
                requested: usize::MAX,
                available: 0,
            });
        }
        ChunkPool::with_storage(chunks, self.chunk_size, &mut self.storage)
    }

    /// Frees an allocation in whichever pool issued it.
    ///
    /// # Returns
    ///
    /// The released chunk region within the owning pool.
    ///
    /// # Panics
    ///
    /// Panics for pointers that are not live allocations (double free,
    /// foreign pointer), and if the routing table disagrees with the
    /// owning pool.
    pub fn deallocate(&mut self, ptr: BytePtr) -> Region {
        let Some(index) = self.routes.remove(&ptr) else {
            tracing::warn!("invalid free of {} (no owning pool)", ptr);
            panic!("{}", PoolError::InvalidFree { ptr });
        };

        match self.pools[index].try_deallocate(ptr) {
            Ok(region) => region,
            Err(err) => panic!("routing table sends {ptr} to pool {index}: {err}"),
        }
    }

    /// Index of the pool owning a live allocation.
    #[inline]
    #[must_use]
    pub fn owner_of(&self, ptr: BytePtr) -> Option<usize> {
        self.routes.get(&ptr).copied()
    }

    /// True if `ptr` is a live allocation.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: BytePtr) -> bool {
        self.routes.contains_key(&ptr)
    }

    /// Bytes of a live allocation.
    #[must_use]
    pub fn bytes(&self, ptr: BytePtr) -> Option<&[u8]> {
        let index = self.owner_of(ptr)?;
        self.pools[index].bytes(ptr)
    }

    /// Mutable bytes of a live allocation.
    #[must_use]
    pub fn bytes_mut(&mut self, ptr: BytePtr) -> Option<&mut [u8]> {
        let index = self.owner_of(ptr)?;
        self.pools[index].bytes_mut(ptr)
    }

    /// Pools in creation order.
    #[inline]
    #[must_use]
    pub fn pools(&self) -> &[ChunkPool] {
        &self.pools
    }

    /// Number of pools.
    #[inline]
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// The storage provider.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Number of live allocations across all pools.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.pools.iter().map(ChunkPool::allocation_count).sum()
    }

    /// Free chunks across all pools.
    #[must_use]
    pub fn free_chunks(&self) -> usize {
        self.pools.iter().map(ChunkPool::free_chunks).sum()
    }

    /// Allocated chunks across all pools.
    #[must_use]
    pub fn allocated_chunks(&self) -> usize {
        self.pools.iter().map(ChunkPool::allocated_chunks).sum()
    }

    /// Capacity in chunks across all pools.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.pools.iter().map(ChunkPool::total_chunks).sum()
    }

    /// Free fragments across all pools.
    #[must_use]
    pub fn free_fragments(&self) -> usize {
        self.pools.iter().map(ChunkPool::free_fragments).sum()
    }

    /// Bytes per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<S: StorageProvider> fmt::Display for MultiPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, pool) in self.pools.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "pool {index} [{} chunks]: {pool}", pool.total_chunks())?;
        }
        Ok(())
    }
}

impl<S: StorageProvider> fmt::Debug for MultiPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiPool")
            .field("chunk_size", &self.chunk_size)
            .field("growth_factor", &self.growth_factor)
            .field("pools", &self.pools)
            .field("routes", &self.routes.len())
            .finish()
    }
}
