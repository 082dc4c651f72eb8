//! # Free-Region Index
//!
//! Tracks the free chunk ranges of one pool under two orderings:
//!
//! ```text
//!   by_size  : (len, begin)  -> best-fit lower bound, lowest address wins ties
//!   by_start : begin -> end  -> predecessor/successor for coalescing
//! ```
//!
//! Both orderings describe the same set. They are only ever mutated
//! together through [`FreeRegionIndex::insert`] and
//! [`FreeRegionIndex::remove`].

use std::collections::{BTreeMap, BTreeSet};

use crate::chunk::ChunkIndex;
use crate::region::Region;

/// Dual-indexed set of disjoint free regions.
///
/// Outside of [`coalesce_around`](Self::coalesce_around) no two regions
/// in the index are adjacent.
#[derive(Debug, Clone, Default)]
pub struct FreeRegionIndex {
    /// Ordered by `(len, begin)`.
    by_size: BTreeSet<(usize, ChunkIndex)>,
    /// Maps `begin -> end`.
    by_start: BTreeMap<ChunkIndex, ChunkIndex>,
    /// Sum of all region lengths.
    free_chunks: usize,
}

impl FreeRegionIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index holding a single free region.
    #[must_use]
    pub fn with_region(region: Region) -> Self {
        let mut index = Self::new();
        index.insert(region);
        index
    }

    /// Smallest region with at least `chunks` chunks.
    ///
    /// Among equally sized candidates the one with the lowest start
    /// index is returned.
    #[must_use]
    pub fn find_best_fit(&self, chunks: usize) -> Option<Region> {
        self.by_size
            .range((chunks, 0)..)
            .next()
            .map(|&(len, begin)| Region::with_len(begin, len))
    }

    /// Inserts a region into both orderings.
    ///
    /// # Panics
    ///
    /// Panics if the region is empty or its start is already tracked.
    pub fn insert(&mut self, region: Region) {
        assert!(!region.is_empty(), "empty region {region} in free index");

        let new_in_size = self.by_size.insert((region.len(), region.begin));
        let new_in_start = self.by_start.insert(region.begin, region.end).is_none();
        assert!(
            new_in_size && new_in_start,
            "free region {region} inserted twice"
        );

        self.free_chunks += region.len();
    }

    /// Removes a region from both orderings.
    ///
    /// # Panics
    ///
    /// Panics if the region is not present in both orderings. That means
    /// the index has desynchronized and the pool can no longer be
    /// trusted.
    pub fn remove(&mut self, region: Region) {
        let in_size = self.by_size.remove(&(region.len(), region.begin));
        let in_start = self.by_start.get(&region.begin) == Some(&region.end);
        assert!(
            in_size && in_start,
            "free region {region} missing from index (by_size: {in_size}, by_start: {in_start})"
        );
        self.by_start.remove(&region.begin);

        self.free_chunks -= region.len();
    }

    /// Merges a freshly inserted region with its free neighbours.
    ///
    /// The left neighbour is merged first, then the right neighbour
    /// against the possibly extended region. Returns the region that
    /// finally holds the original chunks.
    ///
    /// # Panics
    ///
    /// Panics if `region` is not in the index.
    pub fn coalesce_around(&mut self, region: Region) -> Region {
        let mut merged = region;

        if let Some(prev) = self.predecessor(merged.begin) {
            if prev.precedes(&merged) {
                self.remove(prev);
                self.remove(merged);
                merged = prev.merge(merged);
                self.insert(merged);
            }
        }

        if let Some(next) = self.successor(merged.end) {
            if merged.precedes(&next) {
                self.remove(merged);
                self.remove(next);
                merged = merged.merge(next);
                self.insert(merged);
            }
        }

        merged
    }

    /// Free region starting strictly before `begin`, closest first.
    fn predecessor(&self, begin: ChunkIndex) -> Option<Region> {
        self.by_start
            .range(..begin)
            .next_back()
            .map(|(&b, &e)| Region::new(b, e))
    }

    /// First free region starting at or after `end`.
    fn successor(&self, end: ChunkIndex) -> Option<Region> {
        self.by_start
            .range(end..)
            .next()
            .map(|(&b, &e)| Region::new(b, e))
    }

    /// Total free chunks.
    #[inline]
    #[must_use]
    pub const fn free_chunks(&self) -> usize {
        self.free_chunks
    }

    /// Number of free regions (fragments).
    #[inline]
    #[must_use]
    pub fn fragments(&self) -> usize {
        self.by_start.len()
    }

    /// True if no chunk is free.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    /// The largest free region, if any.
    #[must_use]
    pub fn largest(&self) -> Option<Region> {
        self.by_size
            .last()
            .map(|&(len, begin)| Region::with_len(begin, len))
    }

    /// Iterates free regions in address order.
    pub fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        self.by_start.iter().map(|(&b, &e)| Region::new(b, e))
    }

    /// True if no two free regions touch or overlap.
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        let mut iter = self.iter();
        let Some(mut prev) = iter.next() else {
            return true;
        };
        for region in iter {
            if prev.end >= region.begin {
                return false;
            }
            prev = region;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(regions: &[(usize, usize)]) -> FreeRegionIndex {
        let mut index = FreeRegionIndex::new();
        for &(b, e) in regions {
            index.insert(Region::new(b, e));
        }
        index
    }

    #[test]
    fn test_best_fit_empty() {
        let index = FreeRegionIndex::new();
        assert!(index.find_best_fit(1).is_none());
        assert!(index.find_best_fit(0).is_none());
    }

    #[test]
    fn test_best_fit_smallest_sufficient() {
        let index = index_of(&[(0, 5), (10, 12), (20, 23)]);
        assert_eq!(index.find_best_fit(1), Some(Region::new(10, 12)));
        assert_eq!(index.find_best_fit(3), Some(Region::new(20, 23)));
        assert_eq!(index.find_best_fit(4), Some(Region::new(0, 5)));
        assert!(index.find_best_fit(6).is_none());
    }

    #[test]
    fn test_best_fit_tie_lowest_start() {
        let index = index_of(&[(30, 32), (10, 12), (20, 22)]);
        assert_eq!(index.find_best_fit(2), Some(Region::new(10, 12)));
    }

    #[test]
    fn test_remove_keeps_both_orderings() {
        let mut index = index_of(&[(0, 2), (4, 8)]);
        index.remove(Region::new(0, 2));
        assert_eq!(index.fragments(), 1);
        assert_eq!(index.free_chunks(), 4);
        assert_eq!(index.find_best_fit(1), Some(Region::new(4, 8)));
    }

    #[test]
    #[should_panic(expected = "missing from index")]
    fn test_remove_absent_panics() {
        let mut index = index_of(&[(0, 4)]);
        index.remove(Region::new(0, 2));
    }

    #[test]
    #[should_panic(expected = "inserted twice")]
    fn test_insert_duplicate_panics() {
        let mut index = index_of(&[(0, 4)]);
        index.insert(Region::new(0, 4));
    }

    #[test]
    fn test_coalesce_both_sides() {
        let mut index = index_of(&[(0, 2), (6, 8)]);
        index.insert(Region::new(2, 6));
        let merged = index.coalesce_around(Region::new(2, 6));
        assert_eq!(merged, Region::new(0, 8));
        assert_eq!(index.fragments(), 1);
        assert_eq!(index.free_chunks(), 8);
        assert!(index.is_coalesced());
    }

    #[test]
    fn test_coalesce_left_only() {
        let mut index = index_of(&[(0, 2), (7, 8)]);
        index.insert(Region::new(2, 4));
        assert_eq!(index.coalesce_around(Region::new(2, 4)), Region::new(0, 4));
        assert_eq!(index.fragments(), 2);
    }

    #[test]
    fn test_coalesce_right_only() {
        let mut index = index_of(&[(5, 8)]);
        index.insert(Region::new(3, 5));
        assert_eq!(index.coalesce_around(Region::new(3, 5)), Region::new(3, 8));
        assert_eq!(index.fragments(), 1);
    }

    #[test]
    fn test_coalesce_isolated() {
        let mut index = index_of(&[(0, 1), (9, 10)]);
        index.insert(Region::new(4, 5));
        assert_eq!(index.coalesce_around(Region::new(4, 5)), Region::new(4, 5));
        assert_eq!(index.fragments(), 3);
        assert!(index.is_coalesced());
    }

    #[test]
    fn test_largest() {
        let index = index_of(&[(0, 3), (5, 6), (10, 13)]);
        assert_eq!(index.largest(), Some(Region::new(10, 13)));
    }
}
