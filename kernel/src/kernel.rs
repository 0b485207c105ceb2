//! The kernel execution context
//!
//! Every long-lived singleton — frame allocator, kernel address-space
//! template, process table, scheduler, filesystem, shell services —
//! lives in one [`Kernel`] value, constructed once at boot in a fixed
//! order and reached from trap context through [`with_kernel`]. Host
//! tests build their own `Kernel` over an arena instead, which keeps
//! them isolated from each other and from any global state.

use alloc::boxed::Box;

use spin::Mutex;

use crate::arch;
use crate::error::KernelResult;
use crate::fs::FileSystem;
use crate::mm::{AddressSpace, FrameAllocator, PhysAddr, PhysWindow};
use crate::process::ProcessManager;
use crate::sched::Scheduler;
use crate::shellsvc::ShellServices;

/// The execution-context handle.
pub struct Kernel {
    pub phys: PhysWindow,
    pub frames: Box<FrameAllocator>,
    /// Kernel address-space template; its upper half is copied into
    /// every process directory and its directory is the kernel CR3.
    pub kernel_space: AddressSpace,
    pub pm: ProcessManager,
    pub sched: Scheduler,
    pub fs: FileSystem,
    pub shell: ShellServices,
}

impl Kernel {
    /// Bring up the memory core and empty tables over the given
    /// physical pool. `phys_limit` bounds the kernel direct map (and
    /// therefore the template's upper half).
    pub fn new(
        phys: PhysWindow,
        pool_base: PhysAddr,
        pool_frames: usize,
        phys_limit: u32,
    ) -> KernelResult<Box<Kernel>> {
        let mut frames = FrameAllocator::empty_boxed();
        frames.init(pool_base, pool_frames);
        let kernel_space = AddressSpace::kernel_template(&phys, &mut frames, phys_limit)?;
        Ok(Box::new(Kernel {
            phys,
            frames,
            kernel_space,
            pm: ProcessManager::new(),
            sched: Scheduler::new(),
            fs: FileSystem::new(),
            shell: ShellServices::new(),
        }))
    }
}

static KERNEL: Mutex<Option<Box<Kernel>>> = Mutex::new(None);

/// Install the boot-constructed kernel context.
pub fn install(kernel: Box<Kernel>) {
    let mut slot = KERNEL.lock();
    assert!(slot.is_none(), "kernel context installed twice");
    *slot = Some(kernel);
}

/// Run `f` against the global kernel context with interrupts masked.
///
/// Trap handlers enter with interrupts already disabled and never
/// re-enter, so the lock is always uncontended; the masking matters for
/// the few call sites that run with interrupts enabled (boot tail,
/// drivers).
pub fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    arch::without_interrupts(|| {
        let mut slot = KERNEL.lock();
        let kernel = slot.as_mut().expect("kernel context not installed");
        f(kernel)
    })
}
