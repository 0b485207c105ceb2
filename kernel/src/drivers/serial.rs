//! COM1 serial port
//!
//! Log and panic output. 115200 8N1, polled writes only.

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use core::fmt::{self, Write};

    use spin::Mutex;
    use x86::io::{inb, outb};

    const COM1: u16 = 0x3F8;

    struct SerialPort;

    impl SerialPort {
        fn init(&mut self) {
            // SAFETY: standard 16550 init on the COM1 ports.
            unsafe {
                outb(COM1 + 1, 0x00); // disable interrupts
                outb(COM1 + 3, 0x80); // DLAB
                outb(COM1 + 0, 0x01); // 115200 baud
                outb(COM1 + 1, 0x00);
                outb(COM1 + 3, 0x03); // 8N1
                outb(COM1 + 2, 0xC7); // FIFO
                outb(COM1 + 4, 0x0B); // RTS/DSR, OUT2
            }
        }

        fn write_byte(&mut self, byte: u8) {
            // SAFETY: polling the line-status register then writing the
            // data register is the documented transmit sequence.
            unsafe {
                while inb(COM1 + 5) & 0x20 == 0 {}
                outb(COM1, byte);
            }
        }
    }

    impl Write for SerialPort {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                if b == b'\n' {
                    self.write_byte(b'\r');
                }
                self.write_byte(b);
            }
            Ok(())
        }
    }

    static PORT: Mutex<SerialPort> = Mutex::new(SerialPort);

    pub fn init() {
        PORT.lock().init();
    }

    #[doc(hidden)]
    pub fn _print(args: fmt::Arguments) {
        crate::arch::without_interrupts(|| {
            let _ = PORT.lock().write_fmt(args);
        });
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::{_print, init};

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub fn init() {}
