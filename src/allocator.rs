//! The allocation capability used by every container in this crate.
//!
//! Containers are generic over an [`Allocator`] and default to [`Heap`], the
//! global allocator. The allocator is a value: a table owns its instance and
//! returns every block to the same instance it came from.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocError;

/// A source of raw memory blocks.
///
/// # Safety contract for implementors
///
/// A pointer returned by `allocate(layout)` must be valid for reads and writes
/// of `layout.size()` bytes, aligned to `layout.align()`, and stay valid until
/// it is passed to `deallocate` with the same layout. Allocators that compare
/// equal must be able to free each other's blocks.
pub trait Allocator {
    /// Allocates a block described by `layout`.
    ///
    /// Zero-sized layouts never reach the allocator; containers substitute a
    /// dangling pointer for them.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator (or one
    /// equal to it) with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The global heap allocator.
///
/// Every `Heap` compares equal to every other, so tables using it can always
/// be swapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Heap;

impl Allocator for Heap {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // SAFETY: Containers never request zero-sized blocks.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Instrumented allocator for tests: carries an identity tag and tracks the
/// number of live bytes across every clone sharing the same counter.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct TrackingAlloc {
    pub(crate) id: u32,
    pub(crate) live: alloc::rc::Rc<core::cell::Cell<usize>>,
    pub(crate) allocations: alloc::rc::Rc<core::cell::Cell<usize>>,
}

#[cfg(test)]
impl TrackingAlloc {
    pub(crate) fn with_id(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn allocation_count(&self) -> usize {
        self.allocations.get()
    }
}

#[cfg(test)]
impl PartialEq for TrackingAlloc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
impl Allocator for TrackingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = Heap.allocate(layout)?;
        self.live.set(self.live.get() + layout.size());
        self.allocations.set(self.allocations.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - layout.size());
        // SAFETY: Forwarded contract.
        unsafe { Heap.deallocate(ptr, layout) }
    }
}

/// Allocator that refuses every request.
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FailingAlloc;

#[cfg(test)]
impl Allocator for FailingAlloc {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("nothing was ever allocated")
    }
}
