//! # Chunk Pool Core
//!
//! Chunk-granular best-fit memory pools designed for:
//! - Variable-length allocations out of pre-allocated buffers
//! - Logarithmic best-fit search and neighbour coalescing
//! - Deterministic placement (lowest address wins ties)
//!
//! ## Architecture
//!
//! 1. **Free-region index** - free chunk ranges ordered by size and by start
//! 2. **Chunk pool** - one fixed buffer, best-fit allocate, coalescing free
//! 3. **Multi-pool** - pools tried in creation order, grows when all fail
//! 4. **Typed views** - `[T]` over granted bytes for plain-old-data `T`
//!
//! ## Example
//!
//! ```rust
//! use chunk_pool_core::MultiPool;
//!
//! let mut pool = MultiPool::new(4); // 4 chunks of 128 bytes
//!
//! let view = pool.allocate_view::<u32>(10).unwrap();
//! pool.view_mut(&view).unwrap()[0] = 42;
//! assert_eq!(pool.view(&view).unwrap()[0], 42);
//!
//! pool.deallocate_view(view);
//! assert_eq!(pool.allocation_count(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod config;
pub mod error;
pub mod free_index;
pub mod multi_pool;
pub mod pool;
pub mod region;
pub mod storage;
pub mod view;

pub use chunk::{required_chunks, reserved_chunks, BytePtr, ChunkIndex, DEFAULT_CHUNK_SIZE};
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use free_index::FreeRegionIndex;
pub use multi_pool::MultiPool;
pub use pool::ChunkPool;
pub use region::Region;
pub use storage::{HeapStorage, StorageProvider};
pub use view::TypedView;
