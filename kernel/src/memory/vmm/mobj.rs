//! Memory objects: the abstraction over "where does the data behind this
//! page come from".
//!
//! An [`MObj`] is a reference-counted, page-resident cache in front of some
//! backing source. [`Kind::Anon`] fabricates zero-filled pages out of thin
//! air; [`Kind::Shadow`] layers copy-on-write over another MObj; file-backed
//! and block-device objects (ambient, not wired to a filesystem in this
//! kernel yet) would fill pages from a vnode or raw device.

use alloc::{collections::BTreeMap, sync::Arc};
use core::ptr::NonNull;

use crate::{
    error::KernelError,
    memory::page,
    sync::SpinLock,
};

/// One page cached by an [`MObj`].
///
/// Owned by exactly one MObj at a time; moved between MObjs (shadow
/// collapse) by transferring the entry in the resident map, never copied.
pub struct PFrame {
    page: NonNull<u8>,
    dirty: bool,
}

unsafe impl Send for PFrame {}

impl PFrame {
    fn alloc_zeroed() -> Result<Self, KernelError> {
        Ok(Self {
            page: page::alloc_zeroed_page()?,
            dirty: false,
        })
    }

    pub fn as_bytes(&self) -> &[u8; page::PAGE_SIZE] {
        unsafe { self.page.cast().as_ref() }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; page::PAGE_SIZE] {
        self.dirty = true;
        unsafe { self.page.cast().as_mut() }
    }

    pub fn phys_addr(&self) -> crate::memory::PhysAddr {
        crate::memory::PhysAddr::new(self.page.addr().get())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clone_contents(&self) -> Result<Self, KernelError> {
        let mut new = Self::alloc_zeroed()?;
        new.as_bytes_mut().copy_from_slice(self.as_bytes());
        Ok(new)
    }
}

impl Drop for PFrame {
    fn drop(&mut self) {
        unsafe { page::free_page(self.page) }
    }
}

pub type PFrameRef = Arc<SpinLock<PFrame>>;

struct ShadowData {
    /// The MObj this shadow was layered over at creation (or collapse) time.
    ///
    /// Re-pointed by [`MObj::shadow_collapse`]; may itself be a shadow.
    shadowed: SpinLock<Arc<MObj>>,
    /// The non-shadow MObj at the bottom of the chain. Never changes: it is
    /// the original data source every layer above ultimately reads through
    /// to.
    bottom: Arc<MObj>,
}

enum Kind {
    Anon,
    Shadow(ShadowData),
}

/// A reference-counted source of page frames.
///
/// Refcounting is the `Arc` itself: the last owner (a [`super::vmarea::VMArea`]
/// or another MObj's shadow chain) to drop its `Arc<MObj>` runs `Drop`, which
/// releases every resident pframe.
pub struct MObj {
    kind: Kind,
    pframes: SpinLock<BTreeMap<usize, PFrameRef>>,
}

impl MObj {
    pub fn new_anon() -> Arc<Self> {
        Arc::new(Self {
            kind: Kind::Anon,
            pframes: SpinLock::new(BTreeMap::new()),
        })
    }

    /// Wraps `bottom` in a fresh shadow layer.
    ///
    /// If `bottom` is itself a shadow, the new layer's `bottom` is inherited
    /// from it rather than pointing at `bottom` directly, so the chain never
    /// grows a shadow-of-shadow-of-shadow tail purely from re-shadowing: only
    /// `fork` lengthens the chain, by one link per generation.
    pub fn new_shadow(shadowed: &Arc<Self>) -> Arc<Self> {
        let bottom = match &shadowed.kind {
            Kind::Shadow(s) => Arc::clone(&s.bottom),
            Kind::Anon => Arc::clone(shadowed),
        };
        Arc::new(Self {
            kind: Kind::Shadow(ShadowData {
                shadowed: SpinLock::new(Arc::clone(shadowed)),
                bottom,
            }),
            pframes: SpinLock::new(BTreeMap::new()),
        })
    }

    pub fn is_shadow(&self) -> bool {
        matches!(self.kind, Kind::Shadow(_))
    }

    /// Returns the cached pframe for `pagenum`, filling it on first touch.
    ///
    /// `forwrite` matters only for shadow objects: a write fault must land on
    /// a page private to this object (copy-on-write), while a read fault may
    /// be satisfied by any ancestor in the chain.
    pub fn get_pframe(self: &Arc<Self>, pagenum: usize, forwrite: bool) -> Result<PFrameRef, KernelError> {
        match &self.kind {
            Kind::Anon => self.get_or_fill(pagenum, Self::fill_zero),
            Kind::Shadow(shadow) => self.shadow_get_pframe(shadow, pagenum, forwrite),
        }
    }

    fn get_or_fill(
        &self,
        pagenum: usize,
        fill: impl FnOnce(&Self, usize) -> Result<PFrame, KernelError>,
    ) -> Result<PFrameRef, KernelError> {
        let mut pframes = self.pframes.lock();
        if let Some(pf) = pframes.get(&pagenum) {
            return Ok(Arc::clone(pf));
        }
        let pf = Arc::new(SpinLock::new(fill(self, pagenum)?));
        pframes.insert(pagenum, Arc::clone(&pf));
        Ok(pf)
    }

    fn fill_zero(&self, _pagenum: usize) -> Result<PFrame, KernelError> {
        PFrame::alloc_zeroed()
    }

    fn shadow_get_pframe(
        self: &Arc<Self>,
        shadow: &ShadowData,
        pagenum: usize,
        forwrite: bool,
    ) -> Result<PFrameRef, KernelError> {
        if !forwrite {
            if let Some(pf) = self.pframes.lock().get(&pagenum) {
                return Ok(Arc::clone(pf));
            }
            // Walk the chain looking for a resident copy without allocating
            // anything; only a write fault is allowed to materialize a new
            // private page in this object.
            let mut cur = Arc::clone(&shadow.shadowed.lock());
            loop {
                if let Some(pf) = cur.pframes.lock().get(&pagenum) {
                    return Ok(Arc::clone(pf));
                }
                let next = match &cur.kind {
                    Kind::Shadow(s) => Arc::clone(&s.shadowed.lock()),
                    Kind::Anon => break,
                };
                cur = next;
            }
            return shadow.bottom.get_pframe(pagenum, false);
        }

        self.get_or_fill(pagenum, |_this, pagenum| {
            // Find the nearest existing copy (resident anywhere in the
            // chain) and duplicate its contents; otherwise fill from the
            // bottom object's backing source.
            let mut cur = Arc::clone(&shadow.shadowed.lock());
            loop {
                if let Some(pf) = cur.pframes.lock().get(&pagenum) {
                    return pf.lock().clone_contents();
                }
                let next = match &cur.kind {
                    Kind::Shadow(s) => Arc::clone(&s.shadowed.lock()),
                    Kind::Anon => break,
                };
                cur = next;
            }
            let bottom_pf = shadow.bottom.get_pframe(pagenum, false)?;
            bottom_pf.lock().clone_contents()
        })
    }

    /// Collapses a redundant link out of the shadow chain.
    ///
    /// When this object's `shadowed` layer has no other owner (the other
    /// side of a fork already dropped or overwrote every page it cared
    /// about), migrate its resident pframes down into `self` and skip over
    /// it, shortening lookups for every future fault through this object.
    pub fn shadow_collapse(self: &Arc<Self>) {
        let Kind::Shadow(shadow) = &self.kind else {
            return;
        };
        let mut shadowed_slot = shadow.shadowed.lock();
        if Arc::strong_count(&shadowed_slot) > 1 {
            return;
        }

        let mut victim_frames = shadowed_slot.pframes.lock();
        let mut self_frames = self.pframes.lock();
        for (pagenum, pf) in victim_frames.iter() {
            self_frames.entry(*pagenum).or_insert_with(|| Arc::clone(pf));
        }
        drop(self_frames);

        let next = match &shadowed_slot.kind {
            Kind::Shadow(s) => Arc::clone(&s.shadowed.lock()),
            Kind::Anon => Arc::clone(&shadow.bottom),
        };
        drop(victim_frames);
        *shadowed_slot = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_object_fills_zeroed_pages() {
        let obj = MObj::new_anon();
        let pf = obj.get_pframe(0, false).unwrap();
        assert!(pf.lock().as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn anon_object_caches_pframe_across_calls() {
        let obj = MObj::new_anon();
        let a = obj.get_pframe(3, false).unwrap();
        a.lock().as_bytes_mut()[0] = 0xAB;
        let b = obj.get_pframe(3, false).unwrap();
        assert_eq!(b.lock().as_bytes()[0], 0xAB);
    }

    #[test]
    fn shadow_write_fault_copies_without_disturbing_sibling() {
        let bottom = MObj::new_anon();
        bottom.get_pframe(0, false).unwrap().lock().as_bytes_mut()[0] = 1;

        let left = MObj::new_shadow(&bottom);
        let right = MObj::new_shadow(&bottom);

        let left_pf = left.get_pframe(0, true).unwrap();
        left_pf.lock().as_bytes_mut()[0] = 2;

        let right_pf = right.get_pframe(0, false).unwrap();
        assert_eq!(right_pf.lock().as_bytes()[0], 1);
        assert_eq!(left.get_pframe(0, false).unwrap().lock().as_bytes()[0], 2);
    }

    #[test]
    fn shadow_chain_terminates_in_bottom() {
        let bottom = MObj::new_anon();
        let mid = MObj::new_shadow(&bottom);
        let top = MObj::new_shadow(&mid);
        assert!(top.is_shadow());
        // top's bottom must be `bottom`, not `mid`: chain length is bounded
        // by fork depth, not by repeated re-shadowing.
        let Kind::Shadow(s) = &top.kind else {
            unreachable!()
        };
        assert!(Arc::ptr_eq(&s.bottom, &bottom));
    }
}
