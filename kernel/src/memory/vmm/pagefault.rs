//! Resolves a user-mode page fault against the faulting process's VMMap.

use riscv::asm;

use super::{
    vmarea::Prot,
    vmmap::{VMMap, prot_to_pte_flags},
};
use crate::{
    error::KernelError,
    memory::{PageRound as _, VirtAddr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    Read,
    Write,
    Exec,
}

impl FaultCause {
    fn required_prot(self) -> Prot {
        match self {
            Self::Read => Prot::READ,
            Self::Write => Prot::WRITE,
            Self::Exec => Prot::EXEC,
        }
    }

    fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

/// Runs the page-fault resolution algorithm for `vaddr` in `vmmap`.
///
/// Never called on behalf of a fault taken in kernel mode: the trap
/// dispatcher is expected to have already distinguished supervisor- from
/// user-mode faults and to kill the kernel outright on the former (a fault
/// on a kernel address is always a bug, never something to recover from).
pub fn handle(vmmap: &mut VMMap, vaddr: VirtAddr, cause: FaultCause) -> Result<(), KernelError> {
    let page = vaddr.page_rounddown();

    let area = vmmap.lookup(page).ok_or(KernelError::MemoryFault)?;
    if !area.prot().contains(cause.required_prot()) {
        return Err(KernelError::InaccessibleMemory(vaddr));
    }

    let obj_pagenum = area.obj_pagenum(page);
    let forwrite = cause.is_write();
    let pframe = area.mobj().get_pframe(obj_pagenum, forwrite)?;
    let pa = pframe.lock().phys_addr();
    let perm = prot_to_pte_flags(area.prot(), forwrite);

    // The area may have been faulted on before (e.g. a read fault followed
    // later by a write fault to the same page): replace rather than assert
    // no previous mapping.
    vmmap.page_table_mut().uninstall_page(page);
    vmmap.page_table_mut().install_page(page, pa, perm)?;
    flush_tlb();

    Ok(())
}

pub fn flush_tlb() {
    asm::sfence_vma_all();
}
