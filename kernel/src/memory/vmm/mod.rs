//! Virtual memory management: memory objects, per-process address spaces,
//! and the page-fault handler that ties them to the hardware page table.

pub use self::mobj::MObj;
pub use self::pagefault::FaultCause;
pub use self::vmarea::{MapFlags, Prot, VMArea};
pub use self::vmmap::{Direction, VMMap, user_high, user_low};

pub mod mobj;
pub mod pagefault;
pub mod vmarea;
pub mod vmmap;
