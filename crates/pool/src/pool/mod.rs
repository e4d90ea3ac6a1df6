//! The memory pool: a chain of bump chunks plus a large-block side list
//!
//! Small requests are carved off the chunk chain starting at the `current`
//! chunk; requests above [`PoolConfig::max_alloc`] get a dedicated block from
//! the backing allocator and are tracked individually so they can be released
//! before the next reset.
//!
//! # Safety
//!
//! - Regions returned by [`MemoryPool::alloc`] stay valid until the next
//!   [`reset`](MemoryPool::reset), the matching
//!   [`free_large`](MemoryPool::free_large), or the pool is dropped; the pool
//!   never reads or writes them
//! - Chunks and large blocks are released exactly once, through the backing
//!   allocator that produced them
//!
//! ## Invariants
//!
//! - `chunks` is never empty; `chunks[0]` is the head chunk
//! - `current < chunks.len()`, and `current` only moves forward between resets
//! - Every chunk has `config.chunk_capacity` payload bytes

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

mod chunk;
mod large;

pub use chunk::{BLOCK_ALIGN, Chunk};
pub use large::LargeBlock;
use large::LargeList;

use crate::backing::{BackingAllocator, SystemBacking};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::stats::{PoolCounters, PoolStats};

/// Request-scoped memory pool
///
/// Not thread-safe: every operation takes `&mut self`. Give each thread or
/// task its own pool.
pub struct MemoryPool<A: BackingAllocator = SystemBacking> {
    config: PoolConfig,
    chunks: Vec<Chunk>,
    current: usize,
    large: LargeList,
    counters: PoolCounters,
    backing: A,
}

// SAFETY: The pool exclusively owns every chunk and large block it points to;
// nothing is shared with other pools or threads, so moving the whole pool is
// sound whenever the backing allocator itself may move.
unsafe impl<A: BackingAllocator + Send> Send for MemoryPool<A> {}

impl MemoryPool<SystemBacking> {
    /// Creates a pool with the default configuration on the system allocator
    pub fn new() -> PoolResult<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a pool with `config` on the system allocator
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::with_backing(config, SystemBacking)
    }
}

impl<A: BackingAllocator> MemoryPool<A> {
    /// Creates a pool whose chunks and large blocks come from `backing`
    ///
    /// Allocates the head chunk up front; fails if the configuration is
    /// invalid or the backing allocator cannot provide it.
    pub fn with_backing(config: PoolConfig, backing: A) -> PoolResult<Self> {
        config.validate()?;
        let head = Chunk::new(&backing, config.chunk_capacity)?;

        #[cfg(feature = "logging")]
        debug!(
            chunk_capacity = config.chunk_capacity,
            max_alloc = config.max_alloc,
            max_failed = config.max_failed,
            "memory pool created"
        );

        Ok(Self {
            config,
            chunks: vec![head],
            current: 0,
            large: LargeList::new(),
            counters: PoolCounters::default(),
            backing,
        })
    }

    /// Allocates `size` bytes
    ///
    /// Requests up to `max_alloc` are bump-allocated from the chunk chain,
    /// growing it by one chunk when nothing fits. Larger requests become a
    /// large block that can be released early with
    /// [`free_large`](Self::free_large).
    ///
    /// The returned region is uninitialized. On error the pool is unchanged
    /// apart from miss bookkeeping and stays usable.
    pub fn alloc(&mut self, size: usize) -> PoolResult<NonNull<[u8]>> {
        let result = if self.config.is_large(size) {
            self.alloc_large(size)
        } else {
            self.alloc_small(size)
        };

        if result.is_err() {
            self.counters.oom_failures += 1;
        }
        result
    }

    fn alloc_small(&mut self, size: usize) -> PoolResult<NonNull<[u8]>> {
        for index in self.current..self.chunks.len() {
            self.counters.bump_probes += 1;
            if let Some(region) = self.chunks[index].try_bump(size) {
                self.counters.small_allocations += 1;
                return Ok(region);
            }

            self.counters.bump_misses += 1;
            let failed = self.chunks[index].record_failure();
            if index == self.current
                && failed > self.config.max_failed
                && index + 1 < self.chunks.len()
            {
                self.advance_current(index + 1);
            }
        }

        self.grow(size)
    }

    /// Appends a fresh chunk and serves `size` bytes from it
    fn grow(&mut self, size: usize) -> PoolResult<NonNull<[u8]>> {
        let mut chunk = Chunk::new(&self.backing, self.config.chunk_capacity)?;
        let Some(region) = chunk.try_bump(size) else {
            // SAFETY: the chunk was never linked and handed nothing out.
            unsafe { chunk.release(&self.backing) };
            return Err(PoolError::allocation_failed(size, BLOCK_ALIGN));
        };

        self.chunks.push(chunk);
        self.counters.chunk_growths += 1;
        self.counters.small_allocations += 1;

        #[cfg(feature = "logging")]
        trace!(chunks = self.chunks.len(), size, "memory pool grew a chunk");

        let newest = self.chunks.len() - 1;
        if self.chunks[self.current].failed() > self.config.max_failed {
            self.advance_current(newest);
        }

        Ok(region)
    }

    fn advance_current(&mut self, to: usize) {
        debug_assert!(to > self.current && to < self.chunks.len());

        #[cfg(feature = "logging")]
        trace!(
            from = self.current,
            to,
            failed = self.chunks[self.current].failed(),
            "current chunk advanced"
        );

        self.current = to;
    }

    /// Obtains a dedicated block and links it at the head of the large list
    ///
    /// Only reached through [`alloc`](Self::alloc) once a request is
    /// classified as large.
    fn alloc_large(&mut self, size: usize) -> PoolResult<NonNull<[u8]>> {
        let region = self.large.push(&self.backing, size)?.region();
        self.counters.large_allocations += 1;

        #[cfg(feature = "logging")]
        trace!(size, large = self.large.len(), "large block allocated");

        Ok(region)
    }

    /// Releases a large block before the next reset
    ///
    /// `ptr` must be the start of a region returned by [`alloc`](Self::alloc)
    /// on this pool for a large request that has not been released yet. Any
    /// other pointer (small allocation, already freed, another pool's block)
    /// yields [`PoolError::UnknownLargeBlock`] and leaves the pool untouched.
    pub fn free_large(&mut self, ptr: NonNull<u8>) -> PoolResult<()> {
        // SAFETY: every block in `large` came from `self.backing`.
        let _size = unsafe { self.large.remove(&self.backing, ptr.as_ptr())? };
        self.counters.large_releases += 1;

        #[cfg(feature = "logging")]
        trace!(size = _size, large = self.large.len(), "large block released");

        Ok(())
    }

    /// Returns the pool to its freshly created state, keeping every chunk
    ///
    /// All chunk cursors and miss counters rewind, `current` goes back to the
    /// head, and every large block is released. Regions handed out earlier
    /// must not be used afterwards.
    pub fn reset(&mut self) {
        #[cfg(feature = "logging")]
        debug!(
            chunks = self.chunks.len(),
            large = self.large.len(),
            "memory pool reset"
        );

        for chunk in &mut self.chunks {
            chunk.reset();
        }
        self.current = 0;

        // SAFETY: every block in `large` came from `self.backing`.
        unsafe { self.large.clear(&self.backing) };
        self.counters.resets += 1;
    }

    /// Releases every large block and every chunk, consuming the pool
    ///
    /// Equivalent to dropping the pool; spelled out for call sites that want
    /// the teardown to be explicit.
    pub fn destroy(self) {
        #[cfg(feature = "logging")]
        debug!(
            chunks = self.chunks.len(),
            large = self.large.len(),
            "memory pool destroyed"
        );

        drop(self);
    }

    fn release_all(&mut self) {
        // SAFETY: blocks and chunks all came from `self.backing`; both
        // collections are drained, so nothing is released twice.
        unsafe {
            self.large.clear(&self.backing);
            for chunk in self.chunks.drain(..) {
                chunk.release(&self.backing);
            }
        }
    }

    // ------------------------------------------------------------------
    // Read-only inspection
    // ------------------------------------------------------------------

    /// Configuration this pool was created with
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Chunk chain in allocation order, head first
    pub fn chunks(&self) -> impl ExactSizeIterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Chunk at `index` in the chain
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Index of the chunk small allocations currently start from
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_chunk(&self) -> &Chunk {
        &self.chunks[self.current]
    }

    /// Index of the chunk whose payload contains `ptr`
    pub fn chunk_index_of(&self, ptr: *const u8) -> Option<usize> {
        self.chunks.iter().position(|chunk| chunk.contains(ptr))
    }

    /// Live large blocks, most recently allocated first
    pub fn large_blocks(&self) -> impl ExactSizeIterator<Item = &LargeBlock> {
        self.large.iter()
    }

    #[inline]
    pub fn large_count(&self) -> usize {
        self.large.len()
    }

    /// True if `ptr` is the start of a live large block of this pool
    pub fn owns_large(&self, ptr: *const u8) -> bool {
        self.large.contains(ptr)
    }

    /// Bytes handed out from chunks
    pub fn used_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::used).sum()
    }

    /// Bytes still free across all chunks
    pub fn free_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::free_space).sum()
    }

    /// Bytes held by live large blocks
    pub fn large_bytes(&self) -> usize {
        self.large.total_bytes()
    }

    /// Snapshot of structure and cumulative counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            chunk_count: self.chunks.len(),
            current_index: self.current,
            large_count: self.large.len(),
            chunk_bytes_used: self.used_bytes(),
            chunk_bytes_free: self.free_bytes(),
            large_bytes: self.large_bytes(),
            ..PoolStats::default()
        }
        .with_counters(&self.counters)
    }

    /// The backing allocator chunks and large blocks come from
    pub fn backing(&self) -> &A {
        &self.backing
    }
}

impl<A: BackingAllocator> Drop for MemoryPool<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<A: BackingAllocator> core::fmt::Debug for MemoryPool<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("config", &self.config)
            .field("current", &self.current)
            .field("chunks", &self.chunks)
            .field("large", &self.large_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::TrackedBacking;

    fn small_config() -> PoolConfig {
        PoolConfig::new(64).with_max_failed(2)
    }

    #[test]
    fn test_create_initial_state() {
        let pool = MemoryPool::with_config(small_config()).unwrap();

        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.current_index(), 0);
        assert_eq!(pool.large_count(), 0);
        assert_eq!(pool.current_chunk().free_space(), 64);
        assert_eq!(pool.current_chunk().failed(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = MemoryPool::with_config(PoolConfig::new(0)).unwrap_err();
        assert_eq!(err.code(), "POOL:CONFIG:INVALID");
    }

    #[test]
    fn test_create_fails_without_memory() {
        let backing = TrackedBacking::system().with_allocation_limit(0);
        let err = MemoryPool::with_backing(small_config(), &backing).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(backing.live_allocations(), 0);
    }

    #[test]
    fn test_consecutive_small_allocations_are_adjacent() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        let a = pool.alloc(10).unwrap();
        let b = pool.alloc(20).unwrap();

        assert_eq!(a.len(), 10);
        assert_eq!(b.len(), 20);
        assert_eq!(
            b.cast::<u8>().as_ptr() as usize,
            a.cast::<u8>().as_ptr() as usize + 10
        );
        assert_eq!(pool.current_chunk().free_space(), 34);
    }

    #[test]
    fn test_miss_grows_chain() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        pool.alloc(32).unwrap();
        let second = pool.alloc(33).unwrap();

        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.chunk_index_of(second.cast::<u8>().as_ptr()), Some(1));
        assert_eq!(pool.chunk(0).unwrap().failed(), 1);
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_later_chunk_serves_before_growing() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        pool.alloc(60).unwrap();
        pool.alloc(40).unwrap(); // grows chunk #1
        let fits_second = pool.alloc(20).unwrap();

        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(
            pool.chunk_index_of(fits_second.cast::<u8>().as_ptr()),
            Some(1)
        );
    }

    #[test]
    fn test_current_advances_past_exhausted_chunk() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        // Every request takes most of a chunk, so each one misses on every
        // older chunk it probes.
        for _ in 0..6 {
            pool.alloc(40).unwrap();
        }

        assert!(pool.current_index() > 0);
        let head_failed = pool.chunk(0).unwrap().failed();
        assert_eq!(head_failed, small_config().max_failed + 1);

        for _ in 0..4 {
            pool.alloc(40).unwrap();
        }
        assert_eq!(pool.chunk(0).unwrap().failed(), head_failed);
    }

    #[test]
    fn test_large_request_bypasses_chunks() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        let block = pool.alloc(65).unwrap();
        let ptr = block.cast::<u8>().as_ptr();

        assert_eq!(block.len(), 65);
        assert!(pool.owns_large(ptr));
        assert_eq!(pool.chunk_index_of(ptr), None);
        assert_eq!(pool.used_bytes(), 0);
        assert_eq!(pool.large_bytes(), 65);
    }

    #[test]
    fn test_growth_failure_keeps_pool_usable() {
        let backing = TrackedBacking::system().with_allocation_limit(1);
        let mut pool = MemoryPool::with_backing(small_config(), &backing).unwrap();

        pool.alloc(60).unwrap();
        let err = pool.alloc(60).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.stats().oom_failures, 1);

        // existing chunk still serves what fits
        pool.alloc(4).unwrap();
        assert_eq!(pool.current_chunk().free_space(), 0);
    }

    #[test]
    fn test_free_large_rejects_small_pointer() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        let small = pool.alloc(8).unwrap();
        let err = pool.free_large(small.cast()).unwrap_err();
        assert!(err.is_misuse());
    }

    #[test]
    fn test_reset_rewinds_everything() {
        let mut pool = MemoryPool::with_config(small_config()).unwrap();

        for _ in 0..6 {
            pool.alloc(40).unwrap();
        }
        pool.alloc(1000).unwrap();
        let chunks = pool.chunk_count();

        pool.reset();

        assert_eq!(pool.chunk_count(), chunks);
        assert_eq!(pool.current_index(), 0);
        assert_eq!(pool.large_count(), 0);
        assert!(pool.chunks().all(|c| c.used() == 0 && c.failed() == 0));
        assert_eq!(pool.stats().resets, 1);
    }

    #[test]
    fn test_debug_output_lists_chunks() {
        let pool = MemoryPool::with_config(small_config()).unwrap();
        let text = format!("{pool:?}");
        assert!(text.contains("MemoryPool"));
        assert!(text.contains("free_space: 64"));
    }
}
