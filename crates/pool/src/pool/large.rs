//! Large-block list
//!
//! Oversized requests bypass the chunk chain and get a dedicated block from
//! the backing allocator. Records are kept newest-last in a `Vec` and exposed
//! newest-first, matching head insertion on a singly linked list.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::backing::BackingAllocator;
use crate::error::{PoolError, PoolResult};
use crate::pool::chunk::BLOCK_ALIGN;

/// A block obtained directly from the backing allocator
pub struct LargeBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl LargeBlock {
    /// Start of the block
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Size in bytes, exactly as requested
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn region(&self) -> NonNull<[u8]> {
        NonNull::slice_from_raw_parts(self.ptr, self.layout.size())
    }
}

impl core::fmt::Debug for LargeBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LargeBlock")
            .field("ptr", &self.ptr)
            .field("size", &self.layout.size())
            .finish()
    }
}

/// Owning list of large blocks
#[derive(Debug, Default)]
pub(crate) struct LargeList {
    blocks: Vec<LargeBlock>,
}

impl LargeList {
    pub(crate) fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Allocates a block of `size` bytes and links it at the head
    ///
    /// Nothing is inserted when the backing allocator fails.
    pub(crate) fn push<A: BackingAllocator>(
        &mut self,
        backing: &A,
        size: usize,
    ) -> PoolResult<&LargeBlock> {
        let layout = Layout::from_size_align(size, BLOCK_ALIGN)
            .map_err(|_| PoolError::allocation_failed(size, BLOCK_ALIGN))?;
        // SAFETY: size > max_alloc >= 1, so the layout is never zero-sized.
        let ptr = unsafe { backing.allocate(layout)? };

        self.blocks.push(LargeBlock { ptr, layout });
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Unlinks and releases the block starting at `ptr`
    ///
    /// # Safety
    /// `backing` is the allocator every block in this list came from.
    pub(crate) unsafe fn remove<A: BackingAllocator>(
        &mut self,
        backing: &A,
        ptr: *const u8,
    ) -> PoolResult<usize> {
        let index = self
            .blocks
            .iter()
            .rposition(|block| block.as_ptr() == ptr)
            .ok_or_else(|| PoolError::unknown_large_block(ptr as usize))?;

        let block = self.blocks.remove(index);
        let size = block.size();
        // SAFETY: block was allocated from `backing` with this layout and has
        // just been unlinked, so it is released exactly once.
        unsafe { backing.deallocate(block.ptr, block.layout) };
        Ok(size)
    }

    /// Releases every block, newest first; returns how many were released
    ///
    /// # Safety
    /// `backing` is the allocator every block in this list came from.
    pub(crate) unsafe fn clear<A: BackingAllocator>(&mut self, backing: &A) -> usize {
        let count = self.blocks.len();
        while let Some(block) = self.blocks.pop() {
            // SAFETY: popped blocks are no longer reachable from the list.
            unsafe { backing.deallocate(block.ptr, block.layout) };
        }
        count
    }

    pub(crate) fn contains(&self, ptr: *const u8) -> bool {
        self.blocks.iter().any(|block| block.as_ptr() == ptr)
    }

    /// Newest-first traversal
    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &LargeBlock> + ExactSizeIterator {
        self.blocks.iter().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn total_bytes(&self) -> usize {
        self.blocks.iter().map(LargeBlock::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::TrackedBacking;

    #[test]
    fn test_head_insertion_order() {
        let backing = TrackedBacking::system();
        let mut list = LargeList::new();

        let first = list.push(&backing, 100).unwrap().as_ptr();
        let second = list.push(&backing, 200).unwrap().as_ptr();

        let order: Vec<_> = list.iter().map(LargeBlock::as_ptr).collect();
        assert_eq!(order, vec![second, first]);
        assert_eq!(list.total_bytes(), 300);

        assert_eq!(unsafe { list.clear(&backing) }, 2);
        assert_eq!(backing.live_allocations(), 0);
    }

    #[test]
    fn test_remove_middle_keeps_others() {
        let backing = TrackedBacking::system();
        let mut list = LargeList::new();

        let a = list.push(&backing, 64).unwrap().as_ptr();
        let b = list.push(&backing, 64).unwrap().as_ptr();
        let c = list.push(&backing, 64).unwrap().as_ptr();

        assert_eq!(unsafe { list.remove(&backing, b) }, Ok(64));
        let order: Vec<_> = list.iter().map(LargeBlock::as_ptr).collect();
        assert_eq!(order, vec![c, a]);

        let err = unsafe { list.remove(&backing, b) }.unwrap_err();
        assert!(err.is_misuse());
        assert_eq!(list.len(), 2);
        assert_eq!(backing.invalid_release_count(), 0);

        unsafe { list.clear(&backing) };
    }

    #[test]
    fn test_failed_push_inserts_nothing() {
        let backing = TrackedBacking::system().with_allocation_limit(0);
        let mut list = LargeList::new();

        assert!(list.push(&backing, 1 << 20).is_err());
        assert_eq!(list.len(), 0);
    }
}
