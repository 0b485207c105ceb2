//! VGA text console
//!
//! 80×25 text mode at the direct-mapped `0xB8000` buffer: the console
//! behind `println!` and the tty syscalls (write, clear, setcolor).
//! Scrolls by copying rows up; the hardware cursor follows the write
//! position.

/// tty color codes of the setcolor syscall (standard VGA palette
/// indices).
pub const COLOR_DEFAULT_FG: u8 = 7;
pub const COLOR_DEFAULT_BG: u8 = 0;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use core::fmt::{self, Write};

    use spin::Mutex;
    use x86::io::outb;

    use super::{COLOR_DEFAULT_BG, COLOR_DEFAULT_FG};
    use crate::mm::KERNEL_VIRT_BASE;

    const WIDTH: usize = 80;
    const HEIGHT: usize = 25;
    const BUFFER_PHYS: u32 = 0xB8000;

    struct Console {
        col: usize,
        row: usize,
        color: u8,
    }

    impl Console {
        fn buffer(&mut self) -> &'static mut [[u16; WIDTH]; HEIGHT] {
            // SAFETY: the text buffer is direct-mapped in the kernel
            // half and nothing else writes it.
            unsafe { &mut *((KERNEL_VIRT_BASE + BUFFER_PHYS) as *mut [[u16; WIDTH]; HEIGHT]) }
        }

        fn cell(&self, byte: u8) -> u16 {
            (self.color as u16) << 8 | byte as u16
        }

        fn clear(&mut self) {
            let blank = self.cell(b' ');
            for row in self.buffer().iter_mut() {
                row.fill(blank);
            }
            self.col = 0;
            self.row = 0;
            self.update_cursor();
        }

        fn newline(&mut self) {
            self.col = 0;
            if self.row + 1 < HEIGHT {
                self.row += 1;
                return;
            }
            let blank = self.cell(b' ');
            let buf = self.buffer();
            for row in 1..HEIGHT {
                buf[row - 1] = buf[row];
            }
            buf[HEIGHT - 1].fill(blank);
        }

        fn put_byte(&mut self, byte: u8) {
            match byte {
                b'\n' => self.newline(),
                b'\r' => self.col = 0,
                0x08 => {
                    if self.col > 0 {
                        self.col -= 1;
                        let cell = self.cell(b' ');
                        let (row, col) = (self.row, self.col);
                        self.buffer()[row][col] = cell;
                    }
                }
                byte => {
                    if self.col == WIDTH {
                        self.newline();
                    }
                    let cell = self.cell(byte);
                    let (row, col) = (self.row, self.col);
                    self.buffer()[row][col] = cell;
                    self.col += 1;
                }
            }
        }

        fn update_cursor(&self) {
            let pos = (self.row * WIDTH + self.col) as u16;
            // SAFETY: CRTC cursor-position registers.
            unsafe {
                outb(0x3D4, 0x0F);
                outb(0x3D5, (pos & 0xFF) as u8);
                outb(0x3D4, 0x0E);
                outb(0x3D5, (pos >> 8) as u8);
            }
        }
    }

    impl Write for Console {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                self.put_byte(b);
            }
            self.update_cursor();
            Ok(())
        }
    }

    static CONSOLE: Mutex<Console> = Mutex::new(Console {
        col: 0,
        row: 0,
        color: (COLOR_DEFAULT_BG << 4) | COLOR_DEFAULT_FG,
    });

    pub fn init() {
        crate::arch::without_interrupts(|| CONSOLE.lock().clear());
    }

    pub fn clear() {
        crate::arch::without_interrupts(|| CONSOLE.lock().clear());
    }

    pub fn set_color(fg: u8, bg: u8) {
        crate::arch::without_interrupts(|| {
            CONSOLE.lock().color = (bg & 0xF) << 4 | (fg & 0xF);
        });
    }

    pub fn write_bytes(bytes: &[u8]) {
        crate::arch::without_interrupts(|| {
            let mut console = CONSOLE.lock();
            for &b in bytes {
                console.put_byte(b);
            }
            console.update_cursor();
        });
    }

    #[doc(hidden)]
    pub fn _print(args: fmt::Arguments) {
        crate::arch::without_interrupts(|| {
            let _ = CONSOLE.lock().write_fmt(args);
        });
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::{_print, clear, init, set_color, write_bytes};

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod host {
    pub fn init() {}

    pub fn clear() {}

    pub fn set_color(_fg: u8, _bg: u8) {}

    /// Host tty writes land on stdout so scenario tests can observe
    /// byte counts without a VGA buffer.
    pub fn write_bytes(bytes: &[u8]) {
        if let Ok(s) = core::str::from_utf8(bytes) {
            crate::print!("{}", s);
        }
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub use host::{clear, init, set_color, write_bytes};
