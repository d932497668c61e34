//! Physical memory allocator, for user processes,
//! kernel stacks, page-table pages,
//! and pipe buffers.
//!
//! Allocates whole 4096-byte pages.

use core::{
    alloc::{AllocError, Allocator, Layout},
    ptr::{self, NonNull},
};

use page_alloc::{PageFrameAllocator as RawPageFrameAllocator, RetrievePageFrameAllocator};

use super::{PageRound as _, layout::PHYS_TOP};
use crate::{
    error::KernelError,
    sync::{Once, SpinLock, SpinLockGuard},
};

pub const PAGE_SIZE: usize = super::PAGE_SIZE;

/// First address after kernel.
const fn end() -> NonNull<u8> {
    unsafe extern "C" {
        /// First address after kernel.
        ///
        /// defined by `kernel.ld`
        #[link_name = "end"]
        static mut END: [u8; 0];
    }

    NonNull::new(&raw mut END).unwrap().cast()
}

const fn top() -> NonNull<u8> {
    NonNull::new(ptr::without_provenance_mut(PHYS_TOP)).unwrap()
}

static ALLOCATOR: Once<SpinLock<RawPageFrameAllocator<PAGE_SIZE>>> = Once::new();

pub fn init() {
    let pa_start = end().page_roundup();
    let pa_end = top().page_rounddown();

    unsafe {
        ALLOCATOR.init(SpinLock::new(RawPageFrameAllocator::new(
            pa_start.as_ptr()..pa_end.as_ptr(),
        )));
    }
}

fn lock_allocator() -> SpinLockGuard<'static, RawPageFrameAllocator<PAGE_SIZE>> {
    ALLOCATOR.get().lock()
}

/// Frees the page of physical memory pointed at by `pa`, which normally
/// should have been returned by a call to [`alloc_page`] or
/// [`alloc_zeroed_page`].
///
/// # Safety
///
/// `pa` must have been allocated by this allocator and not freed since.
pub unsafe fn free_page(pa: NonNull<u8>) {
    // Fill with junk to catch dangling refs.
    unsafe {
        pa.write_bytes(1, PAGE_SIZE);
    }
    unsafe { lock_allocator().free(pa) }
}

/// Allocates one 4096-byte page of physical memory.
pub fn alloc_page() -> Result<NonNull<u8>, KernelError> {
    let p = lock_allocator().alloc().ok_or(KernelError::NoFreePage)?;
    unsafe {
        p.write_bytes(5, PAGE_SIZE);
    }
    Ok(p)
}

/// Allocates one 4096-byte zeroed page of physical memory.
pub fn alloc_zeroed_page() -> Result<NonNull<u8>, KernelError> {
    lock_allocator()
        .alloc_zeroed()
        .ok_or(KernelError::NoFreePage)
}

/// Zero-sized handle onto the global page-frame allocator.
///
/// Implements [`core::alloc::Allocator`] so that page-table pages and other
/// exactly-one-page kernel objects can be allocated with `Box::try_new_in`
/// without going through a separate bump allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFrameAllocator;

unsafe impl Allocator for PageFrameAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() > PAGE_SIZE || layout.align() > PAGE_SIZE {
            return Err(AllocError);
        }
        let p = lock_allocator().alloc().ok_or(AllocError)?;
        Ok(NonNull::slice_from_raw_parts(p, PAGE_SIZE))
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() > PAGE_SIZE || layout.align() > PAGE_SIZE {
            return Err(AllocError);
        }
        let p = lock_allocator().alloc_zeroed().ok_or(AllocError)?;
        Ok(NonNull::slice_from_raw_parts(p, PAGE_SIZE))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        unsafe { lock_allocator().free(ptr) }
    }
}

impl RetrievePageFrameAllocator<PAGE_SIZE> for PageFrameAllocator {
    type AllocatorRef = SpinLockGuard<'static, RawPageFrameAllocator<PAGE_SIZE>>;

    fn retrieve_allocator() -> Self::AllocatorRef {
        lock_allocator()
    }
}
