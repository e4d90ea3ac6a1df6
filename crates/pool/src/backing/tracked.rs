//! Tracked backing allocator
//!
//! Wraps another backing allocator and records every request and release.
//! Pools are single-threaded, so the counters are plain `Cell`s.
//!
//! ## Invariants
//!
//! - Every successful allocation is recorded in the live set
//! - A release is forwarded to the inner allocator only if its pointer is in
//!   the live set with a matching layout; anything else is counted as an
//!   invalid release and dropped
//! - Denied requests (limit reached or inner failure) never touch the live set

use core::alloc::Layout;
use core::cell::{Cell, RefCell};
use core::ptr::NonNull;
use std::collections::HashMap;

use super::{BackingAllocator, SystemBacking};
use crate::error::{PoolError, PoolResult};

/// Backing allocator that counts everything passing through it
#[derive(Debug, Default)]
pub struct TrackedBacking<A = SystemBacking> {
    inner: A,
    live: RefCell<HashMap<usize, Layout>>,
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    denied: Cell<usize>,
    invalid_releases: Cell<usize>,
    live_bytes: Cell<usize>,
    peak_bytes: Cell<usize>,
    limit: Cell<Option<usize>>,
}

impl TrackedBacking<SystemBacking> {
    /// Tracks the system allocator
    pub fn system() -> Self {
        Self::new(SystemBacking)
    }
}

impl<A> TrackedBacking<A> {
    /// Creates a tracker wrapping the provided allocator
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            live: RefCell::new(HashMap::new()),
            allocations: Cell::new(0),
            deallocations: Cell::new(0),
            denied: Cell::new(0),
            invalid_releases: Cell::new(0),
            live_bytes: Cell::new(0),
            peak_bytes: Cell::new(0),
            limit: Cell::new(None),
        }
    }

    /// Refuse requests once `limit` allocations have been granted in total
    #[must_use = "builder methods must be chained or built"]
    pub fn with_allocation_limit(self, limit: usize) -> Self {
        self.limit.set(Some(limit));
        self
    }

    /// Change or lift the allocation limit
    pub fn set_allocation_limit(&self, limit: Option<usize>) {
        self.limit.set(limit);
    }

    /// Gets a reference to the underlying allocator
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Total successful allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.get()
    }

    /// Total releases forwarded to the inner allocator
    pub fn deallocation_count(&self) -> usize {
        self.deallocations.get()
    }

    /// Requests refused by the limit or by the inner allocator
    pub fn denied_count(&self) -> usize {
        self.denied.get()
    }

    /// Releases of pointers that were not live (double or foreign frees)
    pub fn invalid_release_count(&self) -> usize {
        self.invalid_releases.get()
    }

    /// Number of blocks currently handed out
    pub fn live_allocations(&self) -> usize {
        self.live.borrow().len()
    }

    /// Bytes currently handed out
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Highest value `live_bytes` ever reached
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.get()
    }

    /// True if a block at `ptr` is currently handed out
    pub fn is_live(&self, ptr: *const u8) -> bool {
        self.live.borrow().contains_key(&(ptr as usize))
    }

    /// Check if there are any memory leaks (allocations > deallocations)
    pub fn has_leaks(&self) -> bool {
        self.allocations.get() > self.deallocations.get()
    }

    fn limit_reached(&self) -> bool {
        self.limit
            .get()
            .is_some_and(|limit| self.allocations.get() >= limit)
    }
}

// SAFETY: Requests are forwarded to `A` untouched; releases are forwarded only
// for pointers `A` handed out with the same layout.
unsafe impl<A: BackingAllocator> BackingAllocator for TrackedBacking<A> {
    unsafe fn allocate(&self, layout: Layout) -> PoolResult<NonNull<u8>> {
        if self.limit_reached() {
            self.denied.set(self.denied.get() + 1);
            return Err(PoolError::allocation_failed_with_layout(layout));
        }

        // SAFETY: forwarding the caller's contract.
        match unsafe { self.inner.allocate(layout) } {
            Ok(ptr) => {
                self.live.borrow_mut().insert(ptr.as_ptr() as usize, layout);
                self.allocations.set(self.allocations.get() + 1);
                let live = self.live_bytes.get() + layout.size();
                self.live_bytes.set(live);
                self.peak_bytes.set(self.peak_bytes.get().max(live));
                Ok(ptr)
            }
            Err(e) => {
                self.denied.set(self.denied.get() + 1);
                Err(e)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let addr = ptr.as_ptr() as usize;
        let recorded = self.live.borrow().get(&addr).copied();
        if recorded != Some(layout) {
            self.invalid_releases.set(self.invalid_releases.get() + 1);
            return;
        }

        self.live.borrow_mut().remove(&addr);
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());

        // SAFETY: the pointer is live with exactly this layout (checked above).
        unsafe { self.inner.deallocate(ptr, layout) };
    }
}
