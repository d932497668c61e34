//! A single mapped region of a process's address space.

use alloc::sync::Arc;
use core::ops::Range;

use bitflags::bitflags;

use super::mobj::MObj;
use crate::memory::{PAGE_SIZE, PageRound as _, VirtAddr};

bitflags! {
    /// Protection bits requested for a mapping, independent of what the
    /// hardware page table ends up installing (a read fault only needs
    /// [`Prot::READ`] even on a writable area).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Prot: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u8 {
        /// Writes are copy-on-write, private to this process.
        const PRIVATE = 1 << 0;
        /// Writes are visible to every mapper of the same MObj.
        const SHARED = 1 << 1;
        /// Backed by an anonymous (zero-fill) object rather than a file.
        const ANON = 1 << 2;
        /// Caller requested an exact address; `VMMap::map` must not relocate it.
        const FIXED = 1 << 3;
    }
}

/// A mapped, page-aligned virtual address range backed by one [`MObj`].
pub struct VMArea {
    range: Range<VirtAddr>,
    /// Offset into the MObj, in pages, of `range.start`.
    obj_offset: usize,
    prot: Prot,
    flags: MapFlags,
    mobj: Arc<MObj>,
}

impl VMArea {
    pub fn new(range: Range<VirtAddr>, obj_offset: usize, prot: Prot, flags: MapFlags, mobj: Arc<MObj>) -> Self {
        assert!(range.start.is_page_aligned());
        assert!(range.end.is_page_aligned());
        assert!(range.start < range.end);
        Self {
            range,
            obj_offset,
            prot,
            flags,
            mobj,
        }
    }

    pub fn range(&self) -> Range<VirtAddr> {
        self.range.clone()
    }

    pub fn start(&self) -> VirtAddr {
        self.range.start
    }

    pub fn end(&self) -> VirtAddr {
        self.range.end
    }

    pub fn prot(&self) -> Prot {
        self.prot
    }

    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    pub fn mobj(&self) -> &Arc<MObj> {
        &self.mobj
    }

    pub fn npages(&self) -> usize {
        (self.range.end.addr() - self.range.start.addr()) / PAGE_SIZE
    }

    pub fn contains(&self, va: VirtAddr) -> bool {
        self.range.start <= va && va < self.range.end
    }

    /// Page number within the backing MObj for virtual address `va`.
    ///
    /// `va` must fall within [`Self::range`].
    pub fn obj_pagenum(&self, va: VirtAddr) -> usize {
        assert!(self.contains(va));
        self.obj_offset + (va.addr() - self.range.start.addr()) / PAGE_SIZE
    }

    /// Splits off the head of this area up to (excluding) `at`, returning
    /// `(head, tail)` where `tail` keeps `self`'s identity (offset, prot,
    /// flags, MObj) and `head` is a fresh area over the same MObj.
    ///
    /// Used by `VMMap::remove` to carve a hole out of the middle or either
    /// end of an existing area without disturbing the object it maps.
    pub fn split_at(self, at: VirtAddr) -> (Self, Self) {
        assert!(self.contains(at) || at == self.range.end);
        let head_offset = self.obj_offset;
        let tail_offset = self.obj_offset + (at.addr() - self.range.start.addr()) / PAGE_SIZE;
        let head = Self {
            range: self.range.start..at,
            obj_offset: head_offset,
            prot: self.prot,
            flags: self.flags,
            mobj: Arc::clone(&self.mobj),
        };
        let tail = Self {
            range: at..self.range.end,
            obj_offset: tail_offset,
            prot: self.prot,
            flags: self.flags,
            mobj: self.mobj,
        };
        (head, tail)
    }

    /// Makes a copy-on-write sibling area over a freshly shadowed MObj.
    ///
    /// Used at fork time: both the parent's and the child's copy of a
    /// PRIVATE area end up pointing at distinct shadow layers over the same
    /// bottom object.
    pub fn reshadow(&self) -> Self {
        Self {
            range: self.range.clone(),
            obj_offset: self.obj_offset,
            prot: self.prot,
            flags: self.flags,
            mobj: MObj::new_shadow(&self.mobj),
        }
    }

    pub fn clone_shared(&self) -> Self {
        Self {
            range: self.range.clone(),
            obj_offset: self.obj_offset,
            prot: self.prot,
            flags: self.flags,
            mobj: Arc::clone(&self.mobj),
        }
    }
}
