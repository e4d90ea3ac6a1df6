//! System backing allocator
//!
//! Wraps the process-wide system allocator.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use std::alloc::System;

use super::BackingAllocator;
use crate::error::{PoolError, PoolResult};

/// Wrapper for the system's default allocator
///
/// Stateless and zero-sized; every pool created with
/// [`MemoryPool::new`](crate::MemoryPool::new) uses it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBacking;

impl SystemBacking {
    /// Creates a new `SystemBacking`
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

// SAFETY: `System` upholds the GlobalAlloc contract, and null results are
// turned into errors before a pointer escapes.
unsafe impl BackingAllocator for SystemBacking {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "pool never requests zero-sized blocks");

        // SAFETY: layout is non-zero-sized (caller contract).
        let ptr = unsafe { System.alloc(layout) };
        NonNull::new(ptr).ok_or_else(|| PoolError::allocation_failed_with_layout(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: ptr/layout came from `allocate` above (caller contract).
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_system() {
        let backing = SystemBacking::new();
        let layout = Layout::from_size_align(256, 8).unwrap();

        unsafe {
            let ptr = backing.allocate(layout).unwrap();
            core::ptr::write_bytes(ptr.as_ptr(), 0x5A, layout.size());
            assert_eq!(*ptr.as_ptr().add(255), 0x5A);
            backing.deallocate(ptr, layout);
        }
    }
}
