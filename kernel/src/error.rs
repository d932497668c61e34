//! Kernel-wide error type.
//!
//! Every fallible kernel operation returns `Result<T, KernelError>`. The
//! syscall dispatcher narrows this down to the small wire representation
//! `ov6_syscall::SyscallError` expects; internal code never deals in raw
//! integers.

use ov6_fs_types::InodeNo;
use ov6_types::{fs::RawFd, process::ProcId};

use crate::memory::VirtAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("out of physical memory")]
    NoFreePage,
    #[error("no free process slots")]
    NoFreeProc,
    #[error("no free file descriptor table entry")]
    NoFreeFileDescriptorTableEntry,
    #[error("file descriptor {1:?}[{0:?}] not found")]
    FileDescriptorNotFound(RawFd, ProcId),
    #[error("file descriptor is not readable")]
    FileDescriptorNotReadable,
    #[error("file descriptor is not writable")]
    FileDescriptorNotWritable,
    #[error("process {0:?} not found")]
    ProcessNotFound(ProcId),
    #[error("no child process")]
    NoChildProcess,
    #[error("virtual address {0:?} is not mapped")]
    AddressNotMapped(VirtAddr),
    #[error("virtual address {0:?} is not accessible with the requested permissions")]
    InaccessibleMemory(VirtAddr),
    #[error("virtual address {0:#x} is too large")]
    TooLargeVirtualAddress(usize),
    #[error("virtual address arithmetic underflowed")]
    VirtualAddressUnderflow,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("operation not supported")]
    Unsupported,
    #[error("operation interrupted")]
    Interrupted,
    #[error("memory access fault")]
    MemoryFault,
    #[error("requested virtual memory range overlaps an existing mapping")]
    AddressRangeOccupied,
    #[error("no virtual address range of the requested size is free")]
    NoFreeAddressRange,
    #[error("is a directory")]
    IsDirectory,
    #[error("is not a directory")]
    NotDirectory,
    #[error("name too long")]
    NameTooLong,
    #[error("no such file or directory")]
    NoSuchEntry,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("file already exists")]
    AlreadyExists,
    #[error("permission denied")]
    AccessDenied,
    #[error("no such device")]
    NoSuchDevice,
    #[error("inode {0:?} has corrupted type {1}")]
    CorruptedInodeType(InodeNo, i16),
    #[error("path too long")]
    PathTooLong,
    #[error("cannot open a directory for writing")]
    OpenDirAsWritable,
    #[error("cannot chdir into a non-directory")]
    ChdirNotDir,
    #[error("argument list too large for the target buffer")]
    ArgumentListTooLarge,
    #[error("argument list too long")]
    ArgumentListTooLong,
    #[error("executable image is invalid")]
    InvalidExecutable,
    #[error("too many open files in the system")]
    TooManyOpenFilesSystem,
    #[error("unknown error")]
    Unknown,
}

impl From<KernelError> for ov6_syscall::SyscallError {
    fn from(error: KernelError) -> Self {
        match error {
            KernelError::NoFreePage => Self::NoMemory,
            KernelError::NoFreeProc => Self::NoMemory,
            KernelError::NoFreeFileDescriptorTableEntry | KernelError::FileDescriptorNotFound(..) => {
                Self::BadFileDescriptor
            }
            KernelError::FileDescriptorNotReadable | KernelError::FileDescriptorNotWritable => {
                Self::BadFileDescriptor
            }
            KernelError::ProcessNotFound(_) | KernelError::NoChildProcess => Self::NoSuchProcess,
            KernelError::AddressNotMapped(_)
            | KernelError::InaccessibleMemory(_)
            | KernelError::MemoryFault => Self::BadAddress,
            KernelError::TooLargeVirtualAddress(_)
            | KernelError::VirtualAddressUnderflow
            | KernelError::InvalidArgument => Self::InvalidArgument,
            KernelError::Unsupported => Self::Unsupported,
            KernelError::Interrupted => Self::Interrupted,
            KernelError::AddressRangeOccupied | KernelError::NoFreeAddressRange => {
                Self::InvalidArgument
            }
            KernelError::IsDirectory => Self::IsDirectory,
            KernelError::NotDirectory => Self::NotDirectory,
            KernelError::NameTooLong => Self::NameTooLong,
            KernelError::NoSuchEntry => Self::NoSuchFileOrDirectory,
            KernelError::DirectoryNotEmpty => Self::DirectoryNotEmpty,
            KernelError::AlreadyExists => Self::FileExists,
            KernelError::AccessDenied => Self::PermissionDenied,
            KernelError::NoSuchDevice => Self::NoSuchDevice,
            KernelError::CorruptedInodeType(..) => Self::Unknown,
            KernelError::PathTooLong => Self::NameTooLong,
            KernelError::OpenDirAsWritable => Self::IsDirectory,
            KernelError::ChdirNotDir => Self::NotDirectory,
            KernelError::ArgumentListTooLarge | KernelError::ArgumentListTooLong => {
                Self::InvalidArgument
            }
            KernelError::InvalidExecutable => Self::InvalidArgument,
            KernelError::TooManyOpenFilesSystem => Self::NoMemory,
            KernelError::Unknown => Self::Unknown,
        }
    }
}
