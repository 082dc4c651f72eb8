//! # Chunk Addressing
//!
//! Byte counts are always rounded up to whole chunks. A request for
//! `n` bytes reserves `ceil(n / chunk_size)` chunks, trading some
//! internal fragmentation for logarithmic bookkeeping.

use std::fmt;

/// Default chunk granularity in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// Alignment (and size) of one backing-buffer word.
///
/// Chunk sizes must be a multiple of this so every chunk starts on a
/// word boundary.
pub const WORD_SIZE: usize = std::mem::size_of::<u64>();

/// Index of one chunk inside a pool's backing buffer.
pub type ChunkIndex = usize;

/// Number of whole chunks needed to hold `byte_count` bytes.
///
/// `required_chunks(0, _)` is 0; callers that need a distinct pointer
/// for an empty request use [`reserved_chunks`].
#[inline]
#[must_use]
pub const fn required_chunks(byte_count: usize, chunk_size: usize) -> usize {
    byte_count.div_ceil(chunk_size)
}

/// Chunks actually reserved for a request of `byte_count` bytes.
///
/// Empty requests still reserve one chunk so that every issued pointer
/// is unique and can be freed.
#[inline]
#[must_use]
pub const fn reserved_chunks(byte_count: usize, chunk_size: usize) -> usize {
    let chunks = required_chunks(byte_count, chunk_size);
    if chunks == 0 {
        1
    } else {
        chunks
    }
}

/// Address of the first byte of an allocation.
///
/// The value is the numeric address inside the owning pool's backing
/// buffer. It is an opaque handle: bytes are reached through the pool
/// accessors, never by dereferencing the number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytePtr(usize);

impl BytePtr {
    /// Wraps a raw address.
    #[inline]
    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for BytePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
