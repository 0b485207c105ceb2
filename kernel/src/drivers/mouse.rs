//! PS/2 mouse
//!
//! Standard three-byte packets on IRQ12, accumulated into an absolute
//! cursor position clamped to the text screen and a button mask for
//! the mouse_get_state syscall.

/// Snapshot for the mouse_get_state syscall (x, y, buttons).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseState {
    pub x: i32,
    pub y: i32,
    pub buttons: u32,
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use spin::Mutex;
    use x86::io::{inb, outb};

    use super::MouseState;

    const DATA_PORT: u16 = 0x60;
    const STATUS_PORT: u16 = 0x64;

    struct State {
        packet: [u8; 3],
        index: usize,
        current: MouseState,
    }

    static STATE: Mutex<State> = Mutex::new(State {
        packet: [0; 3],
        index: 0,
        current: MouseState { x: 40, y: 12, buttons: 0 },
    });

    fn controller_wait_write() {
        // SAFETY: polling the status register.
        unsafe { while inb(STATUS_PORT) & 0x02 != 0 {} }
    }

    fn controller_wait_read() {
        // SAFETY: polling the status register.
        unsafe { while inb(STATUS_PORT) & 0x01 == 0 {} }
    }

    fn aux_command(byte: u8) {
        // SAFETY: 0xD4 routes the next data byte to the aux device.
        unsafe {
            controller_wait_write();
            outb(STATUS_PORT, 0xD4);
            controller_wait_write();
            outb(DATA_PORT, byte);
            controller_wait_read();
            inb(DATA_PORT); // ACK
        }
    }

    fn on_irq(_irq: u8) {
        // SAFETY: reading the data port consumes the byte.
        let byte = unsafe { inb(DATA_PORT) };
        let mut s = STATE.lock();
        if s.index == 0 && byte & 0x08 == 0 {
            return; // resync: first byte always has bit 3 set
        }
        let idx = s.index;
        s.packet[idx] = byte;
        s.index += 1;
        if s.index < 3 {
            return;
        }
        s.index = 0;

        let flags = s.packet[0];
        let dx = s.packet[1] as i8 as i32;
        let dy = s.packet[2] as i8 as i32;
        s.current.buttons = (flags & 0x07) as u32;
        s.current.x = (s.current.x + dx).clamp(0, 79);
        s.current.y = (s.current.y - dy).clamp(0, 24);
    }

    pub fn init() {
        // SAFETY: standard aux-device bring-up on the 8042.
        unsafe {
            controller_wait_write();
            outb(STATUS_PORT, 0xA8); // enable aux device
            controller_wait_write();
            outb(STATUS_PORT, 0x20); // read command byte
            controller_wait_read();
            let cmd = inb(DATA_PORT) | 0x02; // enable IRQ12
            controller_wait_write();
            outb(STATUS_PORT, 0x60);
            controller_wait_write();
            outb(DATA_PORT, cmd);
        }
        aux_command(0xF6); // defaults
        aux_command(0xF4); // enable reporting
        crate::trap::irq::register(12, on_irq);
        crate::arch::x86::pic::unmask(2); // cascade
        crate::arch::x86::pic::unmask(12);
        log::info!("mouse: ps/2 packets on irq12");
    }

    pub fn state() -> Option<MouseState> {
        Some(crate::arch::without_interrupts(|| STATE.lock().current))
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::{init, state};

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod host {
    use super::MouseState;

    pub fn init() {}

    /// No pointing device on the host.
    pub fn state() -> Option<MouseState> {
        None
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub use host::{init, state};
