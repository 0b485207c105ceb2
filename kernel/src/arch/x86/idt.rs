//! IDT
//!
//! 256 gates: the first 32 wired to the exception stubs, 16 remapped
//! IRQ gates at 0x20, and the syscall gate at 0x80 with DPL 3 so ring-3
//! code may raise it. Everything funnels into the uniform trap frame
//! path in [`super::stubs`].

use spin::Mutex;
use x86::dtables::{lidt, DescriptorTablePointer};

use super::{pic, stubs};
use crate::arch::SYSCALL_VECTOR;

const IDT_ENTRIES: usize = 256;

/// Present, ring-0, 32-bit interrupt gate.
const GATE_KERNEL: u8 = 0x8E;
/// Present, ring-3-callable, 32-bit interrupt gate.
const GATE_USER: u8 = 0xEE;

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    attributes: u8,
    offset_high: u16,
}

impl IdtEntry {
    fn gate(handler: u32, attributes: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: crate::arch::KERNEL_CODE_SELECTOR as u16,
            zero: 0,
            attributes,
            offset_high: (handler >> 16) as u16,
        }
    }
}

static IDT: Mutex<[IdtEntry; IDT_ENTRIES]> = Mutex::new([IdtEntry {
    offset_low: 0,
    selector: 0,
    zero: 0,
    attributes: 0,
    offset_high: 0,
}; IDT_ENTRIES]);

/// Fill and load the IDT, remapping the PIC out of the exception range
/// first. Interrupts stay off; the caller enables them once the timer
/// and scheduler are up.
pub fn init() {
    let mut idt = IDT.lock();

    for (vector, stub) in stubs::EXCEPTION_STUBS.iter().enumerate() {
        idt[vector] = IdtEntry::gate(*stub as u32, GATE_KERNEL);
    }

    pic::remap(pic::IRQ_BASE_VECTOR, pic::IRQ_BASE_VECTOR + 8);

    for (line, stub) in stubs::IRQ_STUBS.iter().enumerate() {
        idt[pic::IRQ_BASE_VECTOR as usize + line] = IdtEntry::gate(*stub as u32, GATE_KERNEL);
    }

    idt[SYSCALL_VECTOR as usize] = IdtEntry::gate(stubs::syscall_stub as u32, GATE_USER);

    let ptr = DescriptorTablePointer {
        limit: (core::mem::size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
        base: idt.as_ptr(),
    };
    // SAFETY: the IDT is a static whose entries were just written to
    // valid stubs.
    unsafe { lidt(&ptr) };

    log::info!("idt: 32 exceptions, 16 irqs at {:#x}, syscall gate {:#x}", pic::IRQ_BASE_VECTOR, SYSCALL_VECTOR);
}
