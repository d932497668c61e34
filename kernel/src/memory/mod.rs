pub use self::addr::{
    AddressChunk, AddressChunks, AsVirtAddrRange, GenericMutSlice, GenericSlice, PageRound,
    PhysAddr, PhysPageNum, VirtAddr,
};
pub use self::kernel::KernelPageTable;
pub use self::page_table::{PageTable, PtEntryFlags};
pub use self::vm_user::UserPageTable;
pub use self::vmm::{Direction, FaultCause, MObj, MapFlags, Prot, VMArea, VMMap};

/// Bytes per page
pub const PAGE_SIZE: usize = 4096;

/// Bits of offset within a page
pub const PAGE_SHIFT: usize = 12;

pub mod addr;
pub mod heap;
pub mod kernel;
pub mod layout;
pub mod page;
pub mod page_table;
pub mod vm_user;
pub mod vmm;
