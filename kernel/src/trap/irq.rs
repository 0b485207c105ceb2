//! IRQ dispatch
//!
//! Fixed table of 16 line handlers. Drivers register at init; the
//! timer line additionally drives the scheduler tick, and every line
//! is acknowledged at the PIC on the way out.

use spin::Mutex;

use crate::arch;
use crate::trap::TrapFrame;

pub const IRQ_LINES: usize = 16;

pub type IrqHandler = fn(u8);

static HANDLERS: Mutex<[Option<IrqHandler>; IRQ_LINES]> = Mutex::new([None; IRQ_LINES]);

pub fn register(line: u8, handler: IrqHandler) {
    if (line as usize) < IRQ_LINES {
        arch::without_interrupts(|| {
            HANDLERS.lock()[line as usize] = Some(handler);
        });
    }
}

pub fn unregister(line: u8) {
    if (line as usize) < IRQ_LINES {
        arch::without_interrupts(|| {
            HANDLERS.lock()[line as usize] = None;
        });
    }
}

/// Handle a remapped IRQ vector: registered driver first, then the
/// scheduler tick for the timer line, then EOI.
pub fn handle(frame: &mut TrapFrame) {
    let line = (frame.vector - 32) as u8;
    let handler = HANDLERS.lock()[line as usize];
    if let Some(handler) = handler {
        handler(line);
    }

    if line == 0 {
        crate::kernel::with_kernel(|k| {
            k.timer_tick(frame);
            crate::drivers::speaker::on_tick(k.sched.ticks);
        });
    }

    #[cfg(all(target_arch = "x86", target_os = "none"))]
    crate::arch::x86::pic::end_of_interrupt(line);
}
