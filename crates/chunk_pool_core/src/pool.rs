//! # Chunk Pool
//!
//! Best-fit allocator over one fixed-capacity backing buffer.
//!
//! Requests are rounded up to whole chunks and served from the smallest
//! free region that fits. Freed regions are merged with free neighbours
//! so the free list never holds two touching regions.

use std::collections::BTreeMap;
use std::fmt;

use crate::chunk::{reserved_chunks, BytePtr, ChunkIndex, DEFAULT_CHUNK_SIZE, WORD_SIZE};
use crate::error::{PoolError, PoolResult};
use crate::free_index::FreeRegionIndex;
use crate::region::Region;
use crate::storage::{HeapStorage, StorageProvider};

/// A fixed-capacity, chunk-granular best-fit pool.
///
/// Every chunk is either in the free index or inside exactly one live
/// allocation. The capacity never changes after construction.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust
/// use chunk_pool_core::ChunkPool;
///
/// let mut pool = ChunkPool::new(4); // 4 x 128 bytes
///
/// let ptr = pool.allocate(4).unwrap(); // one chunk
/// assert_eq!(pool.free_chunks(), 3);
///
/// pool.deallocate(ptr);
/// assert_eq!(pool.free_fragments(), 1);
/// ```
pub struct ChunkPool {
    /// Backing buffer, word aligned.
    storage: Box<[u64]>,
    /// Bytes per chunk.
    chunk_size: usize,
    /// Capacity in chunks.
    num_chunks: usize,
    /// Free regions.
    free: FreeRegionIndex,
    /// Live allocations keyed by issued pointer.
    allocations: BTreeMap<BytePtr, Region>,
    /// Sum of live allocation lengths.
    allocated_chunks: usize,
}

impl ChunkPool {
    /// Creates a zeroed heap pool of `num_chunks` chunks of
    /// [`DEFAULT_CHUNK_SIZE`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `num_chunks` is zero or the buffer cannot be allocated.
    #[must_use]
    pub fn new(num_chunks: usize) -> Self {
        assert!(num_chunks > 0, "Capacity must be greater than zero");

        match Self::with_storage(num_chunks, DEFAULT_CHUNK_SIZE, &mut HeapStorage::new()) {
            Ok(pool) => pool,
            Err(err) => panic!("cannot build a pool of {num_chunks} chunks: {err}"),
        }
    }

    /// Creates a pool whose buffer comes from `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a zero capacity or a chunk
    /// size that is not a positive multiple of 8, and propagates the
    /// provider's [`PoolError::StorageExhausted`].
    pub fn with_storage<P: StorageProvider + ?Sized>(
        num_chunks: usize,
        chunk_size: usize,
        provider: &mut P,
    ) -> PoolResult<Self> {
        if num_chunks == 0 {
            return Err(PoolError::InvalidConfig(
                "pool capacity must be greater than zero".to_string(),
            ));
        }
        if chunk_size == 0 || chunk_size % WORD_SIZE != 0 {
            return Err(PoolError::InvalidConfig(format!(
                "chunk_size must be a positive multiple of {WORD_SIZE}, got {chunk_size}"
            )));
        }
        let bytes = num_chunks.checked_mul(chunk_size).ok_or_else(|| {
            PoolError::InvalidConfig(format!(
                "{num_chunks} chunks of {chunk_size} bytes overflow the address space"
            ))
        })?;

        let buffer = provider.acquire(bytes)?;
        let provided = buffer.len() * WORD_SIZE;
        if provided < bytes {
            return Err(PoolError::StorageExhausted {
                requested: bytes,
                available: provided,
            });
        }

        Ok(Self::from_buffer(buffer, num_chunks, chunk_size))
    }

    fn from_buffer(storage: Box<[u64]>, num_chunks: usize, chunk_size: usize) -> Self {
        tracing::debug!(
            "new pool: {} chunks x {} bytes",
            num_chunks,
            chunk_size
        );

        Self {
            storage,
            chunk_size,
            num_chunks,
            free: FreeRegionIndex::with_region(Region::new(0, num_chunks)),
            allocations: BTreeMap::new(),
            allocated_chunks: 0,
        }
    }

    /// Allocates `byte_count` bytes rounded up to whole chunks.
    ///
    /// Empty requests reserve one chunk.
    ///
    /// # Returns
    ///
    /// The address of the first granted byte, or `None` if no free
    /// region is large enough. The pool never grows itself.
    pub fn allocate(&mut self, byte_count: usize) -> Option<BytePtr> {
        let chunks = reserved_chunks(byte_count, self.chunk_size);

        let Some(region) = self.free.find_best_fit(chunks) else {
            tracing::trace!(
                "no free region of {} chunks ({} free in {} fragments)",
                chunks,
                self.free.free_chunks(),
                self.free.fragments()
            );
            return None;
        };

        self.free.remove(region);
        let (granted, rest) = region.split_at(chunks);
        if !rest.is_empty() {
            self.free.insert(rest);
        }

        let ptr = self.ptr_of(granted.begin);
        self.allocations.insert(ptr, granted);
        self.allocated_chunks += granted.len();

        tracing::trace!("allocated {} at {}", granted, ptr);
        Some(ptr)
    }

    /// Returns an allocation to the free index and merges it with its
    /// free neighbours.
    ///
    /// # Returns
    ///
    /// The region that was released.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this pool (double free,
    /// foreign pointer). [`ChunkPool::try_deallocate`] returns the error
    /// instead.
    pub fn deallocate(&mut self, ptr: BytePtr) -> Region {
        match self.try_deallocate(ptr) {
            Ok(region) => region,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`ChunkPool::deallocate`], but reports an unknown pointer
    /// instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidFree`] if `ptr` is not a live
    /// allocation of this pool. The pool is left untouched.
    pub fn try_deallocate(&mut self, ptr: BytePtr) -> PoolResult<Region> {
        let Some(region) = self.allocations.remove(&ptr) else {
            tracing::warn!("invalid free of {}", ptr);
            return Err(PoolError::InvalidFree { ptr });
        };

        self.allocated_chunks -= region.len();
        self.free.insert(region);
        let merged = self.free.coalesce_around(region);

        tracing::trace!("freed {} at {} (now part of {})", region, ptr, merged);
        Ok(region)
    }

    #[inline]
    fn base(&self) -> usize {
        self.storage.as_ptr() as usize
    }

    #[inline]
    fn ptr_of(&self, chunk: ChunkIndex) -> BytePtr {
        BytePtr::new(self.base() + chunk * self.chunk_size)
    }

    /// Chunk index addressed by `ptr`, if it points at a chunk start
    /// inside this pool's buffer.
    #[must_use]
    pub fn chunk_of(&self, ptr: BytePtr) -> Option<ChunkIndex> {
        let offset = ptr.addr().checked_sub(self.base())?;
        let chunk = offset / self.chunk_size;
        (offset % self.chunk_size == 0 && chunk < self.num_chunks).then_some(chunk)
    }

    /// True if `ptr` is a live allocation of this pool.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: BytePtr) -> bool {
        self.allocations.contains_key(&ptr)
    }

    /// Chunk region granted to a live allocation.
    #[inline]
    #[must_use]
    pub fn region_of(&self, ptr: BytePtr) -> Option<Region> {
        self.allocations.get(&ptr).copied()
    }

    /// Bytes of a live allocation (whole chunks).
    #[must_use]
    pub fn bytes(&self, ptr: BytePtr) -> Option<&[u8]> {
        let region = self.region_of(ptr)?;
        let all: &[u8] = bytemuck::cast_slice(&self.storage[..]);
        Some(&all[region.begin * self.chunk_size..region.end * self.chunk_size])
    }

    /// Mutable bytes of a live allocation (whole chunks).
    #[must_use]
    pub fn bytes_mut(&mut self, ptr: BytePtr) -> Option<&mut [u8]> {
        let region = self.region_of(ptr)?;
        let chunk_size = self.chunk_size;
        let all: &mut [u8] = bytemuck::cast_slice_mut(&mut self.storage[..]);
        Some(&mut all[region.begin * chunk_size..region.end * chunk_size])
    }

    /// Number of live allocations.
    #[inline]
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Number of free chunks.
    #[inline]
    #[must_use]
    pub const fn free_chunks(&self) -> usize {
        self.free.free_chunks()
    }

    /// Number of chunks held by live allocations.
    #[inline]
    #[must_use]
    pub const fn allocated_chunks(&self) -> usize {
        self.allocated_chunks
    }

    /// Capacity in chunks.
    #[inline]
    #[must_use]
    pub const fn total_chunks(&self) -> usize {
        self.num_chunks
    }

    /// Number of maximal free regions.
    #[inline]
    #[must_use]
    pub fn free_fragments(&self) -> usize {
        self.free.fragments()
    }

    /// Bytes per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Length of the largest free region, in chunks.
    #[must_use]
    pub fn largest_free_chunks(&self) -> usize {
        self.free.largest().map_or(0, |region| region.len())
    }

    /// The free-region index.
    #[inline]
    #[must_use]
    pub const fn free_index(&self) -> &FreeRegionIndex {
        &self.free
    }

    /// Live allocations in address order.
    pub fn allocations(&self) -> impl Iterator<Item = (BytePtr, Region)> + '_ {
        self.allocations.iter().map(|(&ptr, &region)| (ptr, region))
    }

    /// One marker per chunk: `X` allocated, `-` free.
    #[must_use]
    pub fn occupancy(&self) -> String {
        let mut markers = vec!['-'; self.num_chunks];
        for region in self.allocations.values() {
            markers[region.begin..region.end].fill('X');
        }
        markers.into_iter().collect()
    }
}

impl fmt::Display for ChunkPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.occupancy())
    }
}

impl fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkPool")
            .field("chunk_size", &self.chunk_size)
            .field("total_chunks", &self.num_chunks)
            .field("free_chunks", &self.free_chunks())
            .field("free_fragments", &self.free_fragments())
            .field("allocations", &self.allocations.len())
            .field("occupancy", &self.occupancy())
            .finish()
    }
}
