use core::num::NonZero;

use ov6_syscall::{ReturnType, syscall as sys};
use ov6_types::process::ProcId;

use crate::{
    error::KernelError,
    interrupt::trap::{TICKS, TICKS_UPDATED},
    memory::{
        PAGE_SIZE, VirtAddr,
        vmm::{Direction, MObj, MapFlags, Prot},
    },
    proc::{self, Proc, ProcPrivateDataGuard},
    syscall,
};

pub fn sys_fork(
    p: &'static Proc,
    private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Fork> {
    let private = private.as_mut().unwrap();
    let pid = proc::fork(p, private)?;
    Ok(Some(pid))
}

pub fn sys_exit(
    p: &'static Proc,
    private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Exit> {
    let private = private.take().unwrap();
    let n = syscall::arg_int(&private, 0);
    proc::exit(p, private, i32::try_from(n).unwrap());
}

pub fn sys_wait(
    p: &'static Proc,
    private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Wait> {
    let private = private.as_mut().unwrap();
    let addr = syscall::arg_addr(private, 0);
    let pid = proc::wait(p, private, addr)?;
    Ok(pid)
}

pub fn sys_kill(
    _p: &'static Proc,
    private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Kill> {
    let private = private.as_mut().unwrap();
    let pid = syscall::arg_int(private, 0);
    let pid = u32::try_from(pid).map_err(|_| KernelError::Unknown)?;
    let pid = NonZero::new(pid).ok_or(KernelError::Unknown)?;
    proc::kill(ProcId::new(pid))?;
    Ok(())
}

pub fn sys_getpid(
    p: &'static Proc,
    _private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Getpid> {
    p.shared().lock().pid()
}

/// Grows or shrinks the break by the signed byte count in `a0`.
///
/// Bypasses the `ReturnType`/`RegisterValue` dispatch machinery and decodes
/// its argument straight out of the trapframe, the same way `sys_exec` does,
/// since `proc::grow_proc` now needs a live `ProcPrivateDataGuard` to touch
/// the address space rather than a plain integer argument.
pub fn sys_sbrk(private: &mut ProcPrivateDataGuard) -> Result<usize, KernelError> {
    let n = private.trapframe().a0.cast_signed();
    let addr = private.size();
    proc::grow_proc(private, n)?;
    Ok(addr)
}

/// Maps `a1` bytes of anonymous memory with protection `a2` and flags `a3`,
/// at the hint address `a0` (0 for "pick one").
pub fn sys_mmap(private: &mut ProcPrivateDataGuard) -> Result<usize, KernelError> {
    let tf = *private.trapframe();
    let hint = (tf.a0 != 0)
        .then(|| VirtAddr::new(tf.a0))
        .transpose()?;
    let npages = tf.a1.div_ceil(PAGE_SIZE).max(1);
    let prot = Prot::from_bits_truncate(u8::try_from(tf.a2).unwrap_or(u8::MAX));
    let flags = MapFlags::from_bits_truncate(u8::try_from(tf.a3).unwrap_or(u8::MAX))
        | MapFlags::ANON;

    let addr = private.vmmap_mut().map(
        hint,
        npages,
        prot,
        flags,
        MObj::new_anon(),
        0,
        Direction::LoHi,
    )?;
    Ok(addr.addr())
}

/// Unmaps `a1` bytes starting at `a0`.
pub fn sys_munmap(private: &mut ProcPrivateDataGuard) -> Result<usize, KernelError> {
    let tf = *private.trapframe();
    let addr = VirtAddr::new(tf.a0)?;
    let npages = tf.a1.div_ceil(PAGE_SIZE).max(1);
    private.vmmap_mut().remove(addr, npages)?;
    Ok(0)
}

pub fn sys_sleep(
    p: &'static Proc,
    private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Sleep> {
    let private = private.as_mut().unwrap();
    let n = syscall::arg_int(private, 0) as u64;
    let mut ticks = TICKS.lock();
    let ticks0 = *ticks;
    while *ticks - ticks0 < n {
        if p.shared().lock().killed() {
            // process is killed, so return value will never read.
            return;
        }
        ticks = TICKS_UPDATED.wait(ticks);
    }
}

pub fn sys_uptime(
    _p: &'static Proc,
    _private: &mut Option<ProcPrivateDataGuard>,
) -> ReturnType<sys::Uptime> {
    *TICKS.lock()
}
