//! Backing memory systems for pools
//!
//! A pool never talks to the global allocator directly. Chunks and large
//! blocks are requested through [`BackingAllocator`], which lets tests swap in
//! an instrumented implementation and count every request and release.
//!
//! # Safety
//!
//! ## Trait Safety Contracts
//!
//! - `allocate` must return a pointer valid for reads and writes of
//!   `layout.size()` bytes, aligned to `layout.align()`, and not aliased by any
//!   other live allocation.
//! - `deallocate` is only called with a pointer/layout pair previously
//!   returned by `allocate` on the same allocator, exactly once.
//!
//! ## Blanket Implementation Safety
//!
//! The impl for `&A` forwards every call to `A`, preserving its contract.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::PoolResult;

mod system;
mod tracked;

pub use system::SystemBacking;
pub use tracked::TrackedBacking;

/// Source of raw memory for chunks and large blocks
///
/// # Safety
///
/// Implementors must hand out exclusive, correctly sized and aligned memory
/// and accept it back through `deallocate`.
pub unsafe trait BackingAllocator {
    /// Allocates memory with the given layout
    ///
    /// # Safety
    /// - `layout.size()` is non-zero
    /// - Memory content is uninitialized
    ///
    /// # Errors
    /// Returns [`PoolError::AllocationFailed`](crate::PoolError::AllocationFailed)
    /// when the request cannot be satisfied.
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<u8>>;

    /// Returns memory obtained from [`allocate`](Self::allocate)
    ///
    /// # Safety
    /// - `ptr` was returned by `allocate` on this allocator with this `layout`
    /// - `ptr` is not used afterwards
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

// SAFETY: Forwarding to the referenced allocator keeps its contract intact.
unsafe impl<A: BackingAllocator + ?Sized> BackingAllocator for &A {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<u8>> {
        // SAFETY: caller upholds `allocate`'s contract for `A`.
        unsafe { (**self).allocate(layout) }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller upholds `deallocate`'s contract for `A`.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}
