//! A process's address space: an ordered, non-overlapping set of
//! [`VMArea`]s backed by the page table that realizes them.

use alloc::{sync::Arc, vec::Vec};
use core::ops::Range;

use super::{
    mobj::MObj,
    vmarea::{MapFlags, Prot, VMArea},
};
use crate::{
    error::KernelError,
    memory::{PAGE_SIZE, PageRound as _, VirtAddr, layout, page_table::PtEntryFlags, vm_user::UserPageTable},
    proc::TrapFrame,
};

/// Lowest usable user virtual address.
pub fn user_low() -> VirtAddr {
    VirtAddr::MIN
}

/// One past the highest usable user virtual address: the trampoline and
/// trapframe pages live above this and are never under VMMap's control.
pub fn user_high() -> VirtAddr {
    layout::TRAPFRAME
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Search from `user_low()` upward; return the lowest free gap's start.
    LoHi,
    /// Search from `user_high()` downward; return the highest free gap's
    /// start (i.e. `gap_start + gap_size - npages`).
    HiLo,
}

pub struct VMMap {
    areas: Vec<VMArea>,
    page_table: UserPageTable,
}

impl VMMap {
    pub fn new(tf: &TrapFrame) -> Result<Self, KernelError> {
        Ok(Self {
            areas: Vec::new(),
            page_table: UserPageTable::new(tf)?,
        })
    }

    pub fn page_table(&self) -> &UserPageTable {
        &self.page_table
    }

    pub fn page_table_mut(&mut self) -> &mut UserPageTable {
        &mut self.page_table
    }

    pub fn areas(&self) -> &[VMArea] {
        &self.areas
    }

    fn index_of(&self, start: VirtAddr) -> Result<usize, usize> {
        self.areas.binary_search_by_key(&start, VMArea::start)
    }

    /// Inserts `area` keeping the area list sorted by start address.
    ///
    /// # Panics
    ///
    /// Panics if `area` overlaps an existing area or falls outside
    /// `[user_low(), user_high())` — callers are expected to have checked
    /// with [`Self::is_range_empty`] first.
    pub fn insert(&mut self, area: VMArea) {
        assert!(area.start() >= user_low());
        assert!(area.end() <= user_high());
        let pos = self
            .areas
            .partition_point(|existing| existing.start() < area.start());
        if let Some(prev) = pos.checked_sub(1).and_then(|i| self.areas.get(i)) {
            assert!(prev.end() <= area.start(), "overlaps preceding area");
        }
        if let Some(next) = self.areas.get(pos) {
            assert!(area.end() <= next.start(), "overlaps following area");
        }
        self.areas.insert(pos, area);
    }

    /// Returns the area containing page `va`, if any.
    pub fn lookup(&self, va: VirtAddr) -> Option<&VMArea> {
        self.areas.iter().find(|a| a.contains(va))
    }

    pub fn lookup_mut(&mut self, va: VirtAddr) -> Option<&mut VMArea> {
        self.areas.iter_mut().find(|a| a.contains(va))
    }

    /// True iff no area intersects `[start, start + npages*PAGE_SIZE)`.
    pub fn is_range_empty(&self, start: VirtAddr, npages: usize) -> bool {
        let Ok(end) = start.byte_add(npages * PAGE_SIZE) else {
            return false;
        };
        !self
            .areas
            .iter()
            .any(|a| a.start() < end && start < a.end())
    }

    /// First-fit search for a free gap of `npages` pages.
    pub fn find_range(&self, npages: usize, direction: Direction) -> Option<VirtAddr> {
        let want = npages * PAGE_SIZE;
        match direction {
            Direction::LoHi => {
                let mut cursor = user_low();
                for area in &self.areas {
                    if area.start().addr() - cursor.addr() >= want {
                        return Some(cursor);
                    }
                    cursor = area.end();
                }
                (user_high().addr() - cursor.addr() >= want).then_some(cursor)
            }
            Direction::HiLo => {
                let mut cursor = user_high();
                for area in self.areas.iter().rev() {
                    if cursor.addr() - area.end().addr() >= want {
                        return cursor.byte_sub(want).ok();
                    }
                    cursor = area.start();
                }
                if cursor.addr() - user_low().addr() >= want {
                    cursor.byte_sub(want).ok()
                } else {
                    None
                }
            }
        }
    }

    /// Finds or honors `placement_hint`, creates the backing MObj, builds a
    /// [`VMArea`], and inserts it.
    ///
    /// Passing `mobj` in directly (rather than deriving it from a vnode)
    /// keeps this kernel's file-backed-mmap surface out of scope here; a
    /// file-backed caller constructs its MObj via the vnode's `mmap`
    /// operation and passes it through unchanged.
    pub fn map(
        &mut self,
        placement_hint: Option<VirtAddr>,
        npages: usize,
        prot: Prot,
        flags: MapFlags,
        mobj: Arc<MObj>,
        obj_page_offset: usize,
        direction: Direction,
    ) -> Result<VirtAddr, KernelError> {
        let start = if flags.contains(MapFlags::FIXED) {
            let start = placement_hint.ok_or(KernelError::InvalidArgument)?;
            if !self.is_range_empty(start, npages) {
                return Err(KernelError::AddressRangeOccupied);
            }
            start
        } else if let Some(hint) = placement_hint.filter(|&h| self.is_range_empty(h, npages)) {
            hint
        } else {
            self.find_range(npages, direction)
                .ok_or(KernelError::NoFreeAddressRange)?
        };

        let end = start.byte_add(npages * PAGE_SIZE)?;
        self.insert(VMArea::new(start..end, obj_page_offset, prot, flags, mobj));
        Ok(start)
    }

    /// Removes `[start, start + npages*PAGE_SIZE)`, splitting or truncating
    /// any area that only partially overlaps it, and tears down the
    /// corresponding hardware mappings.
    pub fn remove(&mut self, start: VirtAddr, npages: usize) -> Result<(), KernelError> {
        let end = start.byte_add(npages * PAGE_SIZE)?;
        self.unmap_installed(start..end);

        let mut i = 0;
        while i < self.areas.len() {
            let a_start = self.areas[i].start();
            let a_end = self.areas[i].end();
            if a_end <= start || end <= a_start {
                i += 1;
                continue;
            }

            if start <= a_start && a_end <= end {
                // entirely contained: detach and free.
                self.areas.remove(i);
            } else if a_start < start && a_end <= end {
                // tail-overlap from the removed range's point of view: the
                // area's tail is cut off, so truncate to `start`.
                let area = self.areas.remove(i);
                let (head, _tail) = area.split_at(start);
                self.areas.insert(i, head);
                i += 1;
            } else if start <= a_start && end < a_end {
                // head-overlap: the area's head is cut off; what remains
                // starts at `end` with an adjusted object offset.
                let area = self.areas.remove(i);
                let (_head, tail) = area.split_at(end);
                self.areas.insert(i, tail);
                i += 1;
            } else {
                // strictly interior: split into two, offsets adjusted
                // proportionally, both reinserted in order.
                let area = self.areas.remove(i);
                let (left, rest) = area.split_at(start);
                let (_hole, right) = rest.split_at(end);
                self.areas.insert(i, left);
                self.areas.insert(i + 1, right);
                i += 2;
            }
        }
        Ok(())
    }

    fn unmap_installed(&mut self, range: Range<VirtAddr>) {
        let mut va = range.start;
        while va < range.end {
            self.page_table.uninstall_page(va);
            va = va.byte_add(PAGE_SIZE).unwrap();
        }
        crate::memory::vmm::pagefault::flush_tlb();
    }

    /// Produces a new VMMap with structurally identical areas over the same
    /// MObjs (refcounts bumped). Callers doing a COW fork reshadow the
    /// PRIVATE areas of both copies afterward; see `proc::fork`.
    pub fn try_clone_into(&self, target: &mut Self) -> Result<(), KernelError> {
        for area in &self.areas {
            target.areas.push(area.clone_shared());
        }
        Ok(())
    }

    /// Reshadows every PRIVATE area in place, used by `fork` on both the
    /// parent's and the child's copy of the address space.
    pub fn reshadow_private_areas(&mut self) {
        for area in &mut self.areas {
            if area.flags().contains(MapFlags::PRIVATE) {
                *area = area.reshadow();
            }
        }
    }

    /// Tears down the hardware mappings under every PRIVATE area without
    /// touching the area list itself.
    ///
    /// Called on both sides of a fork right after `reshadow_private_areas`:
    /// the areas now point at fresh shadow MObjs, but any page installed
    /// before the fork is still the old, shared physical page. Without this,
    /// a write through the still-installed PTE would land directly on the
    /// page the other process also sees, bypassing the new shadow entirely.
    pub fn unmap_private_pages(&mut self) {
        let ranges: Vec<Range<VirtAddr>> = self
            .areas
            .iter()
            .filter(|a| a.flags().contains(MapFlags::PRIVATE))
            .map(VMArea::range)
            .collect();
        for range in ranges {
            self.unmap_installed(range);
        }
    }

    /// Copies `buf.len()` bytes starting at `vaddr`, routed through each
    /// area's MObj rather than the hardware page table.
    pub fn read(&self, vaddr: VirtAddr, buf: &mut [u8]) -> Result<(), KernelError> {
        self.copy(vaddr, buf.len(), false, |pf, page_off, dst_off, n| {
            buf[dst_off..][..n].copy_from_slice(&pf.as_bytes()[page_off..][..n]);
        })
    }

    pub fn write(&mut self, vaddr: VirtAddr, buf: &[u8]) -> Result<(), KernelError> {
        self.copy_mut(vaddr, buf.len(), |pf, page_off, src_off, n| {
            pf.as_bytes_mut()[page_off..][..n].copy_from_slice(&buf[src_off..][..n]);
        })
    }

    fn copy(
        &self,
        vaddr: VirtAddr,
        len: usize,
        forwrite: bool,
        mut f: impl FnMut(&super::mobj::PFrame, usize, usize, usize),
    ) -> Result<(), KernelError> {
        let mut done = 0;
        while done < len {
            let va = vaddr.byte_add(done)?;
            let area = self.lookup(va).ok_or(KernelError::MemoryFault)?;
            let page_off = va.addr() % PAGE_SIZE;
            let n = usize::min(PAGE_SIZE - page_off, len - done);
            let pf = area.mobj().get_pframe(area.obj_pagenum(va.page_rounddown()), forwrite)?;
            f(&pf.lock(), page_off, done, n);
            done += n;
        }
        Ok(())
    }

    fn copy_mut(
        &mut self,
        vaddr: VirtAddr,
        len: usize,
        mut f: impl FnMut(&mut super::mobj::PFrame, usize, usize, usize),
    ) -> Result<(), KernelError> {
        let mut done = 0;
        while done < len {
            let va = vaddr.byte_add(done)?;
            let area = self.lookup(va).ok_or(KernelError::MemoryFault)?;
            if !area.prot().contains(Prot::WRITE) {
                return Err(KernelError::InaccessibleMemory(va));
            }
            let page_off = va.addr() % PAGE_SIZE;
            let n = usize::min(PAGE_SIZE - page_off, len - done);
            let pf = area.mobj().get_pframe(area.obj_pagenum(va.page_rounddown()), true)?;
            f(&mut pf.lock(), page_off, done, n);
            done += n;
        }
        Ok(())
    }
}

pub(super) fn prot_to_pte_flags(prot: Prot, forwrite: bool) -> PtEntryFlags {
    let mut flags = PtEntryFlags::V | PtEntryFlags::U;
    if prot.contains(Prot::READ) {
        flags |= PtEntryFlags::R;
    }
    if prot.contains(Prot::EXEC) {
        flags |= PtEntryFlags::X;
    }
    if forwrite && prot.contains(Prot::WRITE) {
        flags |= PtEntryFlags::W;
    }
    flags
}
