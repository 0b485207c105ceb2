//! PS/2 keyboard
//!
//! IRQ1 handler reads scancodes from port 0x60, decodes them with the
//! `pc-keyboard` state machine and queues the resulting bytes for the
//! getchar / keyboard_has_input syscalls. Reads are non-blocking; an
//! empty queue is simply "no input yet".

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use alloc::collections::VecDeque;

    use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
    use spin::Mutex;
    use x86::io::inb;

    const DATA_PORT: u16 = 0x60;
    const BUFFER_MAX: usize = 256;

    struct State {
        decoder: Keyboard<layouts::Us104Key, ScancodeSet1>,
        buffer: VecDeque<u8>,
    }

    static STATE: Mutex<Option<State>> = Mutex::new(None);

    fn on_irq(_irq: u8) {
        // SAFETY: reading the data port acknowledges the scancode.
        let scancode = unsafe { inb(DATA_PORT) };
        let mut guard = STATE.lock();
        let Some(state) = guard.as_mut() else { return };
        if let Ok(Some(event)) = state.decoder.add_byte(scancode) {
            if let Some(DecodedKey::Unicode(ch)) = state.decoder.process_keyevent(event) {
                let mut bytes = [0u8; 4];
                for &b in ch.encode_utf8(&mut bytes).as_bytes() {
                    if state.buffer.len() < BUFFER_MAX {
                        state.buffer.push_back(b);
                    }
                }
            }
        }
    }

    pub fn init() {
        *STATE.lock() = Some(State {
            decoder: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::Ignore,
            ),
            buffer: VecDeque::new(),
        });
        crate::trap::irq::register(1, on_irq);
        crate::arch::x86::pic::unmask(1);
        log::info!("keyboard: ps/2 decoder on irq1");
    }

    pub fn getchar() -> Option<u8> {
        crate::arch::without_interrupts(|| STATE.lock().as_mut()?.buffer.pop_front())
    }

    pub fn has_input() -> bool {
        crate::arch::without_interrupts(|| {
            STATE
                .lock()
                .as_ref()
                .map(|s| !s.buffer.is_empty())
                .unwrap_or(false)
        })
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::{getchar, has_input, init};

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod host {
    pub fn init() {}

    pub fn getchar() -> Option<u8> {
        None
    }

    pub fn has_input() -> bool {
        false
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub use host::{getchar, has_input, init};
