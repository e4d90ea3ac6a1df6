//! Sub-pool chunk: one fixed-size bump region
//!
//! ## Invariants
//!
//! - `last <= capacity` (cursor never passes the end of the payload)
//! - Handed-out ranges `[base + a, base + a + n)` never overlap within a generation
//! - The payload block is owned exclusively and released exactly once, through
//!   the backing allocator that produced it

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::backing::BackingAllocator;
use crate::error::{PoolError, PoolResult};

/// Alignment of every chunk payload and large block
pub const BLOCK_ALIGN: usize = core::mem::align_of::<usize>();

/// One chunk of the sub-pool chain
///
/// Offsets are relative to the chunk's payload start; `end` is implied by
/// `capacity`.
pub struct Chunk {
    base: NonNull<u8>,
    capacity: usize,
    last: usize,
    failed: usize,
}

impl Chunk {
    /// Obtains a fresh payload block of `capacity` bytes from `backing`
    pub(crate) fn new<A: BackingAllocator>(backing: &A, capacity: usize) -> PoolResult<Self> {
        let layout = Self::layout_for(capacity)?;
        // SAFETY: capacity > 0 is guaranteed by PoolConfig::validate.
        let base = unsafe { backing.allocate(layout)? };

        Ok(Self {
            base,
            capacity,
            last: 0,
            failed: 0,
        })
    }

    fn layout_for(capacity: usize) -> PoolResult<Layout> {
        Layout::from_size_align(capacity, BLOCK_ALIGN)
            .map_err(|_| PoolError::allocation_failed(capacity, BLOCK_ALIGN))
    }

    /// Carves `size` bytes off the cursor, or `None` if they don't fit
    #[inline]
    pub(crate) fn try_bump(&mut self, size: usize) -> Option<NonNull<[u8]>> {
        if self.capacity - self.last < size {
            return None;
        }

        // SAFETY: last + size <= capacity, so the offset stays inside the
        // payload block (or one past its end for zero-sized requests).
        let ptr = unsafe { self.base.add(self.last) };
        self.last += size;
        Some(NonNull::slice_from_raw_parts(ptr, size))
    }

    /// Records a miss and returns the updated miss count
    #[inline]
    pub(crate) fn record_failure(&mut self) -> usize {
        self.failed += 1;
        self.failed
    }

    /// Rewinds the cursor and clears the miss count
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.last = 0;
        self.failed = 0;
    }

    /// Returns the payload block to `backing`
    ///
    /// # Safety
    /// `backing` is the allocator this chunk was created with, and no region
    /// handed out by this chunk is used afterwards.
    pub(crate) unsafe fn release<A: BackingAllocator>(self, backing: &A) {
        // The layout was valid when the chunk was created.
        if let Ok(layout) = Self::layout_for(self.capacity) {
            // SAFETY: base was allocated with this layout (caller contract).
            unsafe { backing.deallocate(self.base, layout) };
        }
    }

    /// Start of the payload region
    #[inline]
    pub fn start(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// True if `ptr` points into this chunk's payload
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + self.capacity
    }

    /// Payload capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes already handed out
    #[inline]
    pub fn used(&self) -> usize {
        self.last
    }

    /// Bytes left between the cursor and the end of the payload
    #[inline]
    pub fn free_space(&self) -> usize {
        self.capacity - self.last
    }

    /// Misses taken since creation or the last reset
    #[inline]
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl core::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Chunk")
            .field("start", &self.base)
            .field("free_space", &self.free_space())
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::TrackedBacking;

    #[test]
    fn test_bump_until_full() {
        let backing = TrackedBacking::system();
        let mut chunk = Chunk::new(&backing, 64).unwrap();

        let a = chunk.try_bump(40).unwrap();
        assert_eq!(a.len(), 40);
        assert_eq!(chunk.free_space(), 24);

        assert!(chunk.try_bump(25).is_none());
        let b = chunk.try_bump(24).unwrap();
        assert_eq!(b.cast::<u8>().as_ptr() as usize, a.cast::<u8>().as_ptr() as usize + 40);
        assert_eq!(chunk.free_space(), 0);

        // zero-sized requests still fit a full chunk
        assert!(chunk.try_bump(0).is_some());

        unsafe { chunk.release(&backing) };
        assert_eq!(backing.live_allocations(), 0);
    }

    #[test]
    fn test_reset_rewinds_cursor_and_failures() {
        let backing = TrackedBacking::system();
        let mut chunk = Chunk::new(&backing, 32).unwrap();

        let first = chunk.try_bump(32).unwrap();
        assert_eq!(chunk.record_failure(), 1);
        assert_eq!(chunk.record_failure(), 2);

        chunk.reset();
        assert_eq!(chunk.failed(), 0);
        assert_eq!(chunk.used(), 0);

        let again = chunk.try_bump(32).unwrap();
        assert_eq!(first.cast::<u8>(), again.cast::<u8>());
        assert!(chunk.contains(again.cast::<u8>().as_ptr()));

        unsafe { chunk.release(&backing) };
    }

    #[test]
    fn test_creation_failure_propagates() {
        let backing = TrackedBacking::system().with_allocation_limit(0);
        let err = Chunk::new(&backing, 128).unwrap_err();
        assert!(err.is_out_of_memory());
    }
}
