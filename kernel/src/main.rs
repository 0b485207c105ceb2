//! FerriteOS kernel binary
//!
//! The multiboot stub in the arch layer lands in `kernel_entry`, which
//! brings the machine up in a fixed order — segments, interrupt
//! plumbing, logging, heap, the kernel context (frames, paging
//! template, tables), drivers, the seeded filesystem — then spawns the
//! shell and becomes the idle loop. From the first timer tick onward
//! the scheduler owns the CPU.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boot {
    use ferrite_kernel::mm::{
        PhysAddr, PhysWindow, FRAME_POOL_CEILING, FRAME_POOL_START, HEAP_SIZE, HEAP_VIRT_START,
        KERNEL_VIRT_BASE, PAGE_SIZE,
    };
    use ferrite_kernel::sched::TIMER_HZ;
    use ferrite_kernel::{arch, drivers, kernel, logger, println, Kernel};

    const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

    /// Rust entry, called by `_start` with the multiboot magic and the
    /// physical address of the boot information.
    #[no_mangle]
    pub extern "C" fn kernel_entry(magic: u32, mb_info: u32) -> ! {
        arch::x86::gdt::init();
        arch::x86::idt::init();
        drivers::serial::init();
        logger::init(log::LevelFilter::Info);
        drivers::vga::init();
        println!("FerriteOS {}", env!("CARGO_PKG_VERSION"));

        // The heap window is fixed virtual memory already mapped by the
        // boot page tables; bring it up before the kernel context so
        // the context's tables can live on it.
        // SAFETY: the window is mapped, writable and otherwise unused.
        unsafe {
            ferrite_kernel::get_allocator().init(HEAP_VIRT_START as usize, HEAP_SIZE);
        }

        let pool_end = memory_limit(magic, mb_info).unwrap_or(FRAME_POOL_CEILING);
        let pool_frames = ((pool_end - FRAME_POOL_START) as usize) / PAGE_SIZE;
        log::info!(
            "physical pool {:#010x}..{:#010x} ({} frames)",
            FRAME_POOL_START,
            pool_end,
            pool_frames
        );

        let mut kern = Kernel::new(
            PhysWindow::kernel(),
            PhysAddr::new(FRAME_POOL_START),
            pool_frames,
            pool_end,
        )
        .expect("kernel context construction failed");

        // Leave the provisional boot directory for the real template;
        // from here on, entry/exit CR3 switches are live.
        let kernel_cr3 = kern.kernel_space.directory_phys().as_u32();
        arch::x86::load_directory(kernel_cr3);
        arch::x86::trampoline::init(kernel_cr3);

        drivers::pit::init(TIMER_HZ);
        drivers::keyboard::init();
        drivers::mouse::init();

        kern.fs.seed();

        match kern.spawn("/bin/shell", b"") {
            Ok(pid) => log::info!("shell ready as pid {}", pid),
            Err(e) => log::warn!("no shell at /bin/shell: {}", e),
        }

        kernel::install(kern);

        // This boot context is now the idle loop; the first timer tick
        // dispatches the shell.
        arch::enable_interrupts();
        loop {
            arch::halt();
        }
    }

    /// Highest usable physical address of the region containing the
    /// frame pool, from the multiboot memory map.
    fn memory_limit(magic: u32, mb_info: u32) -> Option<u32> {
        use multiboot::information::{MemoryManagement, MemoryType, Multiboot, PAddr};

        if magic != MULTIBOOT_BOOTLOADER_MAGIC {
            log::warn!("bad multiboot magic {:#010x}", magic);
            return None;
        }

        struct DirectMapped;

        impl MemoryManagement for DirectMapped {
            unsafe fn paddr_to_slice(&self, addr: PAddr, size: usize) -> Option<&'static [u8]> {
                let virt = (addr as usize).checked_add(KERNEL_VIRT_BASE as usize)?;
                // SAFETY: boot info lives in low memory, inside the
                // kernel direct map.
                unsafe { Some(core::slice::from_raw_parts(virt as *const u8, size)) }
            }

            unsafe fn allocate(&mut self, _length: usize) -> Option<(PAddr, &mut [u8])> {
                None
            }

            unsafe fn deallocate(&mut self, addr: PAddr) {
                assert_eq!(addr, 0, "no multiboot allocations to free");
            }
        }

        let mut mem = DirectMapped;
        // SAFETY: the loader passed a valid info structure at mb_info.
        let info = unsafe { Multiboot::from_ptr(mb_info as PAddr, &mut mem) }?;
        let regions = info.memory_regions()?;
        for region in regions {
            if region.memory_type() != MemoryType::Available {
                continue;
            }
            let base = region.base_address();
            let end = base + region.length();
            if base <= FRAME_POOL_START as u64 && (FRAME_POOL_START as u64) < end {
                return Some(end.min(FRAME_POOL_CEILING as u64) as u32);
            }
        }
        None
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    // The kernel proper only runs on the bare-metal target; the host
    // build exists for the test suite.
    eprintln!("ferrite-kernel is a bare-metal image; run the test suite instead");
}
