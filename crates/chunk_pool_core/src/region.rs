//! # Chunk Regions
//!
//! Half-open chunk ranges, the unit of both free-space and allocation
//! tracking.

use std::fmt;

use crate::chunk::ChunkIndex;

/// Half-open range `[begin, end)` of chunk indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    /// First chunk in the region.
    pub begin: ChunkIndex,
    /// One past the last chunk in the region.
    pub end: ChunkIndex,
}

impl Region {
    /// Creates a region covering `[begin, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `end < begin`.
    #[inline]
    #[must_use]
    pub fn new(begin: ChunkIndex, end: ChunkIndex) -> Self {
        assert!(begin <= end, "region end {end} before begin {begin}");
        Self { begin, end }
    }

    /// Creates a region of `len` chunks starting at `begin`.
    #[inline]
    #[must_use]
    pub fn with_len(begin: ChunkIndex, len: usize) -> Self {
        Self::new(begin, begin + len)
    }

    /// Number of chunks in the region.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.begin
    }

    /// True if the region covers no chunks.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// True if `self` ends exactly where `next` begins.
    #[inline]
    #[must_use]
    pub const fn precedes(&self, next: &Self) -> bool {
        self.end == next.begin
    }

    /// True if `chunk` lies inside the region.
    #[inline]
    #[must_use]
    pub const fn contains(&self, chunk: ChunkIndex) -> bool {
        self.begin <= chunk && chunk < self.end
    }

    /// Union of two regions where `self` precedes `next`.
    ///
    /// # Panics
    ///
    /// Panics if the regions are not contiguous.
    #[inline]
    #[must_use]
    pub fn merge(self, next: Self) -> Self {
        assert!(self.precedes(&next), "cannot merge {self} with non-adjacent {next}");
        Self::new(self.begin, next.end)
    }

    /// Splits off the first `len` chunks, returning `(head, tail)`.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the region length.
    #[inline]
    #[must_use]
    pub fn split_at(self, len: usize) -> (Self, Self) {
        assert!(len <= self.len(), "split {len} past end of {self}");
        let mid = self.begin + len;
        (Self::new(self.begin, mid), Self::new(mid, self.end))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}
