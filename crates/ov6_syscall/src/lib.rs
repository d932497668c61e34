#![no_std]

use core::{convert::Infallible, marker::PhantomData, num::TryFromIntError};

use bitflags::bitflags;
use dataview::Pod;
use strum::FromRepr;

mod register;

/// A pointer into a process's address space, tagged with the type it points
/// to. Syscall arguments carry these instead of raw `usize`s so that the
/// memory-management code that resolves them can't mix up user and kernel
/// pointers.
pub struct UserRef<T: ?Sized> {
    addr: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: ?Sized> UserRef<T> {
    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl<T> UserRef<T> {
    pub fn size(&self) -> usize {
        size_of::<T>()
    }
}

impl<T: ?Sized> Clone for UserRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for UserRef<T> {}

/// Like [`UserRef`], but for a pointer the kernel is expected to write
/// through.
pub struct UserMutRef<T: ?Sized> {
    addr: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: ?Sized> UserMutRef<T> {
    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl<T> UserMutRef<T> {
    pub fn size(&self) -> usize {
        size_of::<T>()
    }
}

impl<T: ?Sized> Clone for UserMutRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for UserMutRef<T> {}

/// A `(pointer, length)` pair describing a read-only buffer in user space.
pub struct UserSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> UserSlice<T> {
    pub fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size(&self) -> Option<usize> {
        self.len.checked_mul(size_of::<T>())
    }

    #[must_use]
    pub fn skip(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr + amt * size_of::<T>(), self.len - amt)
    }

    #[must_use]
    pub fn take(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr, amt)
    }
}

impl<T> Clone for UserSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UserSlice<T> {}

/// A `(pointer, length)` pair describing a writable buffer in user space.
pub struct UserMutSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> UserMutSlice<T> {
    pub fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size(&self) -> Option<usize> {
        self.len.checked_mul(size_of::<T>())
    }

    #[must_use]
    pub fn skip_mut(&mut self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr + amt * size_of::<T>(), self.len - amt)
    }

    #[must_use]
    pub fn take_mut(&mut self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr, amt)
    }
}

impl<T> Clone for UserMutSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UserMutSlice<T> {}

/// Everything that can go wrong while decoding a syscall argument or return
/// value out of its raw register representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterDecodeError {
    #[error("invalid syscall error number: {0}")]
    InvalidSyscallErrorNo(isize),
    #[error("invalid result designator: {0}")]
    InvalidResultDesignator(usize),
    #[error("invalid open flags: {0:#x}")]
    InvalidOpenFlags(usize),
    #[error("value out of range for target type")]
    OutOfRange,
    #[error("unexpected zero value")]
    UnexpectedZero,
}

impl From<Infallible> for RegisterDecodeError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl From<TryFromIntError> for RegisterDecodeError {
    fn from(_value: TryFromIntError) -> Self {
        Self::OutOfRange
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct OpenFlags: usize {
        const READ_ONLY = 0x000;
        const WRITE_ONLY = 0x001;
        const READ_WRITE = 0x002;
        const CREATE = 0x200;
        const TRUNC = 0x400;
    }
}

#[repr(C)]
#[derive(Pod)]
pub struct Stat {
    /// File system's disk device
    pub dev: i32,
    /// Inode number
    pub ino: u32,
    /// Type of file
    pub ty: i16,
    /// Number of links to file
    pub nlink: i16,
    pub padding: [u8; 4],
    /// Size of file in bytes
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[repr(i16)]
pub enum StatType {
    Dir = 1,
    File = 2,
    Dev = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(usize)]
pub enum SyscallCode {
    Fork = 1,
    Exit = 2,
    Wait = 3,
    Pipe = 4,
    Read = 5,
    Kill = 6,
    Exec = 7,
    Fstat = 8,
    Chdir = 9,
    Dup = 10,
    Getpid = 11,
    Sbrk = 12,
    Sleep = 13,
    Uptime = 14,
    Open = 15,
    Write = 16,
    Mknod = 17,
    Unlink = 18,
    Link = 19,
    Mkdir = 20,
    Close = 21,
    Brk = 22,
    Mmap = 23,
    Munmap = 24,
}

pub trait Syscall {
    const CODE: SyscallCode;
    type Return: RegisterValue;
}

pub type ReturnType<T> = <T as Syscall>::Return;
pub type ReturnTypeRepr<T> = <<T as Syscall>::Return as RegisterValue>::Repr;

#[must_use]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register<T, const N: usize> {
    pub a: [usize; N],
    _phantom: PhantomData<T>,
}

pub trait RegisterValue: Sized {
    type Repr;
    type DecodeError;

    fn encode(self) -> Self::Repr;
    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError>;
}

pub mod syscall {
    use core::convert::Infallible;

    use ov6_types::{fs::RawFd, process::ProcId};

    use crate::{Syscall, SyscallCode, SyscallError};

    macro_rules! syscall {
        ($name:ident => fn(..) -> $ret:ty) => {
            pub struct $name {}

            impl Syscall for $name {
                type Return = $ret;

                const CODE: SyscallCode = SyscallCode::$name;
            }
        };
    }

    syscall!(Fork => fn(..) -> Result<Option<ProcId>, SyscallError>);
    syscall!(Exit => fn(..) -> Infallible);
    syscall!(Wait => fn(..) -> Result<ProcId, SyscallError>);
    syscall!(Pipe => fn(..) -> Result<(), SyscallError>);
    syscall!(Read => fn(..) -> Result<usize, SyscallError>);
    syscall!(Kill => fn(..) -> Result<(), SyscallError>);
    syscall!(Exec => fn(..) -> Result<Infallible, SyscallError>);
    syscall!(Fstat => fn(..) -> Result<(), SyscallError>);
    syscall!(Chdir => fn(..) -> Result<(), SyscallError>);
    syscall!(Dup => fn(..) -> Result<RawFd, SyscallError>);
    syscall!(Getpid => fn(..) -> ProcId);
    syscall!(Sbrk => fn(..) -> Result<usize, SyscallError>);
    syscall!(Sleep => fn(..) -> ());
    syscall!(Uptime => fn(..) -> u64);
    syscall!(Open => fn(..) -> Result<RawFd, SyscallError>);
    syscall!(Write => fn(..) -> Result<usize, SyscallError>);
    syscall!(Mknod => fn(..) -> Result<(), SyscallError>);
    syscall!(Unlink => fn(..) -> Result<(), SyscallError>);
    syscall!(Link => fn(..) -> Result<(), SyscallError>);
    syscall!(Mkdir => fn(..) -> Result<(), SyscallError>);
    syscall!(Close => fn(..) -> Result<(), SyscallError>);
    syscall!(Brk => fn(..) -> Result<usize, SyscallError>);
    syscall!(Mmap => fn(..) -> Result<usize, SyscallError>);
    syscall!(Munmap => fn(..) -> Result<(), SyscallError>);
}

/// Wire representation of a failed syscall.
///
/// This is deliberately much coarser than [`crate::RegisterDecodeError`] or
/// the kernel's internal error type: only as many kinds as user space
/// actually needs to branch on cross the syscall boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(isize)]
pub enum SyscallError {
    Unknown = -1,
    NoMemory = -2,
    BadFileDescriptor = -3,
    NoSuchProcess = -4,
    BadAddress = -5,
    InvalidArgument = -6,
    Unsupported = -7,
    Interrupted = -8,
    IsDirectory = -9,
    NotDirectory = -10,
    NameTooLong = -11,
    NoSuchFileOrDirectory = -12,
    DirectoryNotEmpty = -13,
    FileExists = -14,
    PermissionDenied = -15,
    NoSuchDevice = -16,
}
