//! GDT and TSS
//!
//! Six descriptors: null, ring-0 code/data, ring-3 code/data, TSS.
//! The TSS supplies `ss0:esp0` on every ring-3 → ring-0 transition;
//! `esp0` is rewritten on each dispatch to the incoming process's
//! kernel-stack top.

use spin::Mutex;
use x86::dtables::{lgdt, DescriptorTablePointer};
use x86::segmentation::SegmentSelector;
use x86::Ring;

use crate::arch::{KERNEL_DATA_SELECTOR, TSS_SELECTOR};

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_middle: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn new(base: u32, limit: u32, access: u8, gran: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_middle: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (((limit >> 16) & 0x0F) as u8) | (gran & 0xF0),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

/// 32-bit TSS. Only `ss0`/`esp0` (and the iomap base) matter; the
/// hardware task-switching fields are dead weight required by the
/// format.
#[derive(Clone, Copy)]
#[repr(C)]
struct TaskStateSegment {
    prev_tss: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

impl TaskStateSegment {
    const fn zeroed() -> Self {
        // SAFETY: all fields are plain integers; zero is a valid value.
        unsafe { core::mem::zeroed() }
    }
}

static GDT: Mutex<[GdtEntry; 6]> = Mutex::new([GdtEntry::new(0, 0, 0, 0); 6]);
static TSS: Mutex<TaskStateSegment> = Mutex::new(TaskStateSegment::zeroed());

/// Fallback ring-0 stack used until the first process dispatch points
/// esp0 at a per-process kernel stack.
static BOOT_TSS_STACK: Mutex<[u8; 4096]> = Mutex::new([0; 4096]);

/// Build and load the GDT, then load the task register.
pub fn init() {
    let mut gdt = GDT.lock();
    let mut tss = TSS.lock();

    let tss_base = &*tss as *const TaskStateSegment as u32;
    let tss_limit = core::mem::size_of::<TaskStateSegment>() as u32 - 1;

    tss.ss0 = KERNEL_DATA_SELECTOR;
    tss.esp0 = {
        let stack = BOOT_TSS_STACK.lock();
        stack.as_ptr() as u32 + stack.len() as u32
    };
    tss.iomap_base = core::mem::size_of::<TaskStateSegment>() as u16;

    gdt[0] = GdtEntry::new(0, 0, 0, 0);
    gdt[1] = GdtEntry::new(0, 0xFFFFF, 0x9A, 0xCF); // ring-0 code
    gdt[2] = GdtEntry::new(0, 0xFFFFF, 0x92, 0xCF); // ring-0 data
    gdt[3] = GdtEntry::new(0, 0xFFFFF, 0xFA, 0xCF); // ring-3 code
    gdt[4] = GdtEntry::new(0, 0xFFFFF, 0xF2, 0xCF); // ring-3 data
    gdt[5] = GdtEntry::new(tss_base, tss_limit, 0x89, 0x00); // 32-bit TSS

    let ptr = DescriptorTablePointer {
        limit: (core::mem::size_of::<[GdtEntry; 6]>() - 1) as u16,
        base: gdt.as_ptr(),
    };

    // SAFETY: the GDT lives in a static and stays valid; the selector
    // constants below match the table just built.
    unsafe {
        lgdt(&ptr);
        // Reload CS with a far return, then the data segments.
        core::arch::asm!(
            "push 0x08",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            "mov ax, 0x10",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            out("eax") _,
        );
        x86::task::load_tr(SegmentSelector::new(TSS_SELECTOR >> 3, Ring::Ring0));
    }

    log::info!("gdt: loaded ring-0/3 segments and tss");
}

/// Rewrite `esp0`; called by the scheduler on every dispatch.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
