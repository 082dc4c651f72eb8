//! Randomized allocate/deallocate sequences checking the pool
//! invariants after every step.
//!
//! Sequences are driven by a seeded `ChaCha8Rng` so failures reproduce.

use chunk_pool_core::{BytePtr, ChunkPool, MultiPool, DEFAULT_CHUNK_SIZE};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::thread;

const STEPS: usize = 2_000;

fn check_pool(pool: &ChunkPool) {
    assert_eq!(
        pool.free_chunks() + pool.allocated_chunks(),
        pool.total_chunks(),
        "partition broken:\n{pool}"
    );
    assert!(pool.free_index().is_coalesced(), "adjacent free regions:\n{pool}");
    assert_eq!(pool.free_index().fragments(), pool.free_fragments());

    // Occupancy string must agree with the counters.
    let occupancy = pool.occupancy();
    let marked = occupancy.chars().filter(|&c| c == 'X').count();
    assert_eq!(marked, pool.allocated_chunks());

    // Free regions and allocations never overlap.
    for free in pool.free_index().iter() {
        for (_, granted) in pool.allocations() {
            assert!(free.end <= granted.begin || granted.end <= free.begin);
        }
    }
}

#[test]
fn test_random_ops_single_pool() {
    for seed in 0..8 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut pool = ChunkPool::new(64);
        let mut live: Vec<BytePtr> = Vec::new();

        for _ in 0..STEPS {
            if live.is_empty() || rng.gen_bool(0.55) {
                let bytes = rng.gen_range(0..8 * DEFAULT_CHUNK_SIZE);
                let free_before = pool.free_chunks();
                match pool.allocate(bytes) {
                    Some(ptr) => {
                        let granted = pool.region_of(ptr).unwrap();
                        assert!(granted.len() * DEFAULT_CHUNK_SIZE >= bytes);
                        live.push(ptr);
                    }
                    None => {
                        assert!(pool.largest_free_chunks() * DEFAULT_CHUNK_SIZE < bytes.max(1));
                        assert_eq!(pool.free_chunks(), free_before);
                    }
                }
            } else {
                let ptr = live.swap_remove(rng.gen_range(0..live.len()));
                pool.deallocate(ptr);
            }
            check_pool(&pool);
        }

        for ptr in live.drain(..) {
            pool.deallocate(ptr);
        }
        assert_eq!(pool.free_fragments(), 1);
        assert_eq!(pool.free_chunks(), 64);
    }
}

#[test]
fn test_allocate_then_free_restores_fragments() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut pool = ChunkPool::new(128);
    let mut live: Vec<BytePtr> = Vec::new();

    // Fragment the pool first.
    for _ in 0..60 {
        if let Some(ptr) = pool.allocate(rng.gen_range(1..4 * DEFAULT_CHUNK_SIZE)) {
            live.push(ptr);
        }
    }
    for i in (0..live.len()).rev().step_by(2) {
        pool.deallocate(live.swap_remove(i));
    }

    for _ in 0..500 {
        let fragments = pool.free_fragments();
        let free = pool.free_chunks();
        let bytes = rng.gen_range(1..6 * DEFAULT_CHUNK_SIZE);

        if let Some(ptr) = pool.allocate(bytes) {
            pool.deallocate(ptr);
        }
        assert_eq!(pool.free_fragments(), fragments);
        assert_eq!(pool.free_chunks(), free);
    }
}

#[test]
fn test_random_ops_multi_pool() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut pool = MultiPool::new(8);
    let mut live: Vec<BytePtr> = Vec::new();
    let mut pools_seen = pool.pool_count();

    for _ in 0..STEPS {
        if live.is_empty() || rng.gen_bool(0.6) {
            let bytes = rng.gen_range(1..24 * DEFAULT_CHUNK_SIZE);
            live.push(pool.allocate(bytes).unwrap());
        } else {
            let ptr = live.swap_remove(rng.gen_range(0..live.len()));
            pool.deallocate(ptr);
        }

        assert!(pool.pool_count() >= pools_seen, "pools are never released");
        pools_seen = pool.pool_count();
        assert_eq!(pool.allocation_count(), live.len());
        for member in pool.pools() {
            check_pool(member);
        }
    }

    for ptr in live.drain(..) {
        pool.deallocate(ptr);
    }
    assert_eq!(pool.allocated_chunks(), 0);
    assert_eq!(pool.free_fragments(), pool.pool_count());
}

#[test]
fn test_externally_locked_sharing() {
    let pool = Arc::new(Mutex::new(MultiPool::new(16)));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(t);
                let mut mine = Vec::new();
                for _ in 0..200 {
                    let bytes = rng.gen_range(1..4 * DEFAULT_CHUNK_SIZE);
                    mine.push(pool.lock().allocate(bytes).unwrap());
                }
                for ptr in mine {
                    pool.lock().deallocate(ptr);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let pool = pool.lock();
    assert_eq!(pool.allocation_count(), 0);
    assert_eq!(pool.free_fragments(), pool.pool_count());
}
