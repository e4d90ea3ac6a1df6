//! Memory pool configuration

use crate::error::{PoolError, PoolResult};
use crate::pool::Chunk;

/// Default payload capacity of every chunk (4 KiB)
pub const DEFAULT_CHUNK_CAPACITY: usize = 4 * 1024;

/// Default number of misses a chunk may take before it stops being the
/// allocation target
pub const DEFAULT_MAX_FAILED: usize = 4;

/// Bookkeeping bytes accounted to every chunk on top of its payload
pub const CHUNK_HEADER_SIZE: usize = core::mem::size_of::<Chunk>();

/// Configuration for a [`MemoryPool`](crate::MemoryPool)
///
/// Every pool owns its own copy, so pools with different policies can live
/// side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Payload bytes carved out of every chunk in the chain
    pub chunk_capacity: usize,

    /// Largest request served from a chunk; anything bigger becomes a large block
    pub max_alloc: usize,

    /// Misses tolerated on the current chunk before `current` moves past it
    pub max_failed: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            max_alloc: DEFAULT_CHUNK_CAPACITY,
            max_failed: DEFAULT_MAX_FAILED,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given chunk payload capacity
    ///
    /// `max_alloc` follows the capacity so any request that fits a fresh
    /// chunk is bump-allocated.
    #[must_use]
    pub fn new(chunk_capacity: usize) -> Self {
        Self {
            chunk_capacity,
            max_alloc: chunk_capacity,
            ..Self::default()
        }
    }

    /// Configuration where each chunk, header included, occupies `chunk_size` bytes
    #[must_use]
    pub fn from_chunk_size(chunk_size: usize) -> Self {
        Self::new(chunk_size.saturating_sub(CHUNK_HEADER_SIZE))
    }

    /// Production configuration - fewer, larger chunks
    #[must_use]
    pub fn production() -> Self {
        Self::new(16 * 1024)
    }

    /// Debug configuration - tiny chunks so chaining and large blocks show up early
    #[must_use]
    pub fn debug() -> Self {
        Self {
            max_failed: 1,
            ..Self::new(256)
        }
    }

    /// Override the small/large threshold
    #[must_use = "builder methods must be chained or built"]
    pub fn with_max_alloc(mut self, max_alloc: usize) -> Self {
        self.max_alloc = max_alloc;
        self
    }

    /// Override the failed-attempt threshold
    #[must_use = "builder methods must be chained or built"]
    pub fn with_max_failed(mut self, max_failed: usize) -> Self {
        self.max_failed = max_failed;
        self
    }

    /// True when a request of `size` bytes is served from the large-block list
    #[inline]
    pub fn is_large(&self, size: usize) -> bool {
        size > self.max_alloc
    }

    /// Validate pool configuration
    pub fn validate(&self) -> PoolResult<()> {
        if self.chunk_capacity == 0 {
            return Err(PoolError::invalid_config("chunk_capacity cannot be zero"));
        }

        if self.max_alloc == 0 {
            return Err(PoolError::invalid_config("max_alloc cannot be zero"));
        }

        if self.max_alloc > self.chunk_capacity {
            return Err(PoolError::invalid_config(
                "max_alloc must be <= chunk_capacity",
            ));
        }

        Ok(())
    }
}
