//! Kernel error types
//!
//! One central error enum covers every fallible kernel interface. The
//! syscall layer maps all of these to the −1 ABI convention; internal
//! callers match on the variant.

use core::fmt;

/// Result alias used throughout the kernel.
pub type KernelResult<T> = Result<T, KernelError>;

/// Main kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Bad value, out-of-range id, unknown syscall number, bad flags.
    InvalidArgument,
    /// A user pointer failed page-table validation.
    BadUserPointer { addr: u32, len: u32 },
    /// No physical frame available.
    OutOfFrames,
    /// Kernel heap allocation failed.
    OutOfMemory,
    /// A fixed-size table (fds, pipe waiters) is full.
    TableFull { table: &'static str },
    /// Path or descriptor does not name anything.
    NotFound,
    /// The object exists but the operation does not apply to it.
    WrongKind,
    /// User-mode attempt to touch the kernel range, or a mapping
    /// request outside the user window with the user bit set.
    PermissionDenied,
    /// Write to a pipe with no readers left.
    PipeNoReaders,
    /// The target process does not exist.
    NoSuchProcess { pid: u32 },
    /// The caller has no child matching the wait request.
    NoSuchChild,
    /// An executable image failed validation.
    BadExecutable { reason: &'static str },
    /// The mapping already exists and replacement was not requested.
    AlreadyMapped { virt: u32 },
    /// Virtual address has no mapping.
    NotMapped { virt: u32 },
    /// The requested device is not present.
    NoDevice,
    /// Unsupported operation for this object.
    Unsupported,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InvalidArgument => write!(f, "invalid argument"),
            KernelError::BadUserPointer { addr, len } => {
                write!(f, "bad user pointer {:#010x}+{}", addr, len)
            }
            KernelError::OutOfFrames => write!(f, "out of physical frames"),
            KernelError::OutOfMemory => write!(f, "out of kernel heap"),
            KernelError::TableFull { table } => write!(f, "{} table full", table),
            KernelError::NotFound => write!(f, "not found"),
            KernelError::WrongKind => write!(f, "wrong object kind"),
            KernelError::PermissionDenied => write!(f, "permission denied"),
            KernelError::PipeNoReaders => write!(f, "pipe has no readers"),
            KernelError::NoSuchProcess { pid } => write!(f, "no such process {}", pid),
            KernelError::NoSuchChild => write!(f, "no matching child"),
            KernelError::BadExecutable { reason } => write!(f, "bad executable: {}", reason),
            KernelError::AlreadyMapped { virt } => {
                write!(f, "page {:#010x} already mapped", virt)
            }
            KernelError::NotMapped { virt } => write!(f, "page {:#010x} not mapped", virt),
            KernelError::NoDevice => write!(f, "no such device"),
            KernelError::Unsupported => write!(f, "operation not supported"),
        }
    }
}
