//! FerriteOS kernel library
//!
//! A small protected-mode operating system for 32-bit x86. The kernel is
//! multiboot-loaded, lives in the higher half at `0xC000_0000`, and runs
//! preemptively scheduled ring-3 processes isolated by per-process page
//! directories with copy-on-write fork and a numbered syscall ABI.
//!
//! The crate builds for two targets:
//!
//! - `i686-unknown-none` (`target_arch = "x86"`, `target_os = "none"`):
//!   the real kernel, with the arch layer, drivers and the bitmap heap
//!   as the global allocator.
//! - the host: everything except the arch layer compiles, backed by the
//!   system allocator, so the memory/process/pipe/syscall core is
//!   exercised by the standard `#[test]` harness against an in-memory
//!   physical arena.

#![no_std]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]

extern crate alloc;

// Host target: use the system allocator so unit tests can allocate
// normally and the std panic machinery reports failures.
#[cfg(not(target_os = "none"))]
extern crate std;

#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: mm::heap::LockedHeap = mm::heap::LockedHeap::empty();

#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[macro_use]
pub mod print;

pub mod arch;
pub mod drivers;
pub mod elf;
pub mod error;
pub mod fs;
pub mod ipc;
pub mod kernel;
pub mod logger;
pub mod mm;
pub mod process;
pub mod sched;
pub mod shellsvc;
pub mod syscall;
pub mod trap;

pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
pub use mm::{PhysAddr, VirtAddr, PAGE_SIZE};

/// Get a reference to the global allocator (bare metal only).
#[cfg(target_os = "none")]
pub fn get_allocator() -> &'static mm::heap::LockedHeap {
    &ALLOCATOR
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    serial_println!("KERNEL PANIC: {}", info);
    arch::halt_forever();
}

#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap exhausted allocating {} bytes", layout.size());
}
