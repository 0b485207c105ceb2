//! VGA mode-13h graphics
//!
//! 320×200 at 8 bpp, linear framebuffer at `0xA0000`. The driver owns
//! mode switching (register-level, with a text-mode restore), the
//! drawing primitives behind the gfx syscalls, and an optional kernel
//! double buffer flipped to the hardware framebuffer on demand.

use crate::error::{KernelError, KernelResult};

pub const MODE_TEXT: u32 = 0;
pub const MODE_13H: u32 = 13;

pub const WIDTH_13H: u32 = 320;
pub const HEIGHT_13H: u32 = 200;

/// Rectangle parameters as passed by the gfx rect/line syscalls.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RectParams {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub color: u32,
}

/// Line parameters (x0, y0, x1, y1, color).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParams {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub color: u32,
}

/// Character cell parameters (x, y, ch, color).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CharParams {
    pub x: i32,
    pub y: i32,
    pub ch: u32,
    pub color: u32,
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use alloc::boxed::Box;
    use alloc::vec;

    use spin::Mutex;
    use x86::io::{inb, outb};

    use super::*;
    use crate::mm::KERNEL_VIRT_BASE;

    const FRAMEBUFFER_PHYS: u32 = 0xA0000;
    const FRAME_BYTES: usize = (WIDTH_13H * HEIGHT_13H) as usize;

    struct Graphics {
        mode: u32,
        back_buffer: Option<Box<[u8]>>,
    }

    static GRAPHICS: Mutex<Graphics> = Mutex::new(Graphics {
        mode: MODE_TEXT,
        back_buffer: None,
    });

    // Register values for mode 13h and 80x25 text, in the order
    // (misc, sequencer[5], crtc[25], graphics[9], attribute[21]).
    const MODE_13H_REGS: ([u8; 1], [u8; 5], [u8; 25], [u8; 9], [u8; 21]) = (
        [0x63],
        [0x03, 0x01, 0x0F, 0x00, 0x0E],
        [
            0x5F, 0x4F, 0x50, 0x82, 0x54, 0x80, 0xBF, 0x1F, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x9C, 0x0E, 0x8F, 0x28, 0x40, 0x96, 0xB9, 0xA3, 0xFF,
        ],
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x05, 0x0F, 0xFF],
        [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F, 0x41, 0x00, 0x0F, 0x00, 0x00,
        ],
    );

    const MODE_TEXT_REGS: ([u8; 1], [u8; 5], [u8; 25], [u8; 9], [u8; 21]) = (
        [0x67],
        [0x03, 0x00, 0x03, 0x00, 0x02],
        [
            0x5F, 0x4F, 0x50, 0x82, 0x55, 0x81, 0xBF, 0x1F, 0x00, 0x4F, 0x0D, 0x0E, 0x00, 0x00,
            0x00, 0x50, 0x9C, 0x0E, 0x8F, 0x28, 0x1F, 0x96, 0xB9, 0xA3, 0xFF,
        ],
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x0E, 0x00, 0xFF],
        [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x14, 0x07, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D,
            0x3E, 0x3F, 0x0C, 0x00, 0x0F, 0x08, 0x00,
        ],
    );

    fn write_regs(regs: &([u8; 1], [u8; 5], [u8; 25], [u8; 9], [u8; 21])) {
        let (misc, seq, crtc, gfx, attr) = regs;
        // SAFETY: standard VGA register programming sequence; ports
        // 0x3C0..0x3DA belong to the VGA adapter.
        unsafe {
            outb(0x3C2, misc[0]);
            for (i, &v) in seq.iter().enumerate() {
                outb(0x3C4, i as u8);
                outb(0x3C5, v);
            }
            // Unlock CRTC registers 0-7.
            outb(0x3D4, 0x11);
            let unlock = inb(0x3D5) & 0x7F;
            outb(0x3D4, 0x11);
            outb(0x3D5, unlock);
            for (i, &v) in crtc.iter().enumerate() {
                outb(0x3D4, i as u8);
                outb(0x3D5, v);
            }
            for (i, &v) in gfx.iter().enumerate() {
                outb(0x3CE, i as u8);
                outb(0x3CF, v);
            }
            for (i, &v) in attr.iter().enumerate() {
                inb(0x3DA);
                outb(0x3C0, i as u8);
                outb(0x3C0, v);
            }
            inb(0x3DA);
            outb(0x3C0, 0x20); // re-enable display
        }
    }

    fn hardware_framebuffer() -> &'static mut [u8] {
        // SAFETY: the VGA window is direct-mapped in the kernel half
        // and only touched while mode 13h is active.
        unsafe {
            core::slice::from_raw_parts_mut(
                (KERNEL_VIRT_BASE + FRAMEBUFFER_PHYS) as *mut u8,
                FRAME_BYTES,
            )
        }
    }

    impl Graphics {
        fn target(&mut self) -> &mut [u8] {
            match self.back_buffer.as_mut() {
                Some(buf) => buf,
                None => hardware_framebuffer(),
            }
        }

        fn require_13h(&self) -> KernelResult<()> {
            if self.mode == MODE_13H {
                Ok(())
            } else {
                Err(KernelError::WrongKind)
            }
        }

        fn put(&mut self, x: i32, y: i32, color: u8) {
            if (0..WIDTH_13H as i32).contains(&x) && (0..HEIGHT_13H as i32).contains(&y) {
                self.target()[(y as u32 * WIDTH_13H + x as u32) as usize] = color;
            }
        }
    }

    pub fn set_mode(mode: u32) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        match mode {
            MODE_13H => {
                write_regs(&MODE_13H_REGS);
                hardware_framebuffer().fill(0);
                g.mode = MODE_13H;
                Ok(())
            }
            MODE_TEXT => {
                write_regs(&MODE_TEXT_REGS);
                g.mode = MODE_TEXT;
                g.back_buffer = None;
                drop(g);
                crate::drivers::vga::init();
                Ok(())
            }
            _ => Err(KernelError::InvalidArgument),
        }
    }

    pub fn mode() -> u32 {
        GRAPHICS.lock().mode
    }

    pub fn clear(color: u8) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        g.target().fill(color);
        Ok(())
    }

    pub fn putpixel(x: i32, y: i32, color: u8) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        g.put(x, y, color);
        Ok(())
    }

    pub fn draw_rect(p: &RectParams) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        let color = p.color as u8;
        for x in p.x..p.x + p.w {
            g.put(x, p.y, color);
            g.put(x, p.y + p.h - 1, color);
        }
        for y in p.y..p.y + p.h {
            g.put(p.x, y, color);
            g.put(p.x + p.w - 1, y, color);
        }
        Ok(())
    }

    pub fn fill_rect(p: &RectParams) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        let color = p.color as u8;
        for y in p.y..p.y + p.h {
            for x in p.x..p.x + p.w {
                g.put(x, y, color);
            }
        }
        Ok(())
    }

    pub fn draw_line(p: &LineParams) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        let color = p.color as u8;
        // Bresenham.
        let (mut x, mut y) = (p.x0, p.y0);
        let dx = (p.x1 - p.x0).abs();
        let dy = -(p.y1 - p.y0).abs();
        let sx = if p.x0 < p.x1 { 1 } else { -1 };
        let sy = if p.y0 < p.y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            g.put(x, y, color);
            if x == p.x1 && y == p.y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        Ok(())
    }

    pub fn draw_char(p: &CharParams) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        draw_char_at(&mut g, p.x, p.y, p.ch as u8 as char, p.color as u8);
        Ok(())
    }

    fn draw_char_at(g: &mut Graphics, x: i32, y: i32, ch: char, color: u8) {
        let glyph = super::font::glyph(ch);
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) != 0 {
                    g.put(x + col, y + row as i32, color);
                }
            }
        }
    }

    pub fn print(x: i32, y: i32, text: &str, color: u8) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        let mut cx = x;
        for ch in text.chars() {
            draw_char_at(&mut g, cx, y, ch, color);
            cx += 8;
        }
        Ok(())
    }

    pub fn enable_double_buffer() -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        if g.back_buffer.is_none() {
            g.back_buffer = Some(vec![0u8; FRAME_BYTES].into_boxed_slice());
        }
        Ok(())
    }

    pub fn disable_double_buffer() {
        GRAPHICS.lock().back_buffer = None;
    }

    pub fn flip() -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        if let Some(buf) = g.back_buffer.take() {
            hardware_framebuffer().copy_from_slice(&buf);
            g.back_buffer = Some(buf);
        }
        Ok(())
    }

    /// Copy a byte image into the target buffer at (x, y).
    pub fn blit(x: i32, y: i32, w: u32, h: u32, data: &[u8]) -> KernelResult<()> {
        let mut g = GRAPHICS.lock();
        g.require_13h()?;
        if data.len() < (w * h) as usize {
            return Err(KernelError::InvalidArgument);
        }
        for row in 0..h as i32 {
            for col in 0..w as i32 {
                let px = data[(row as u32 * w + col as u32) as usize];
                g.put(x + col, y + row, px);
            }
        }
        Ok(())
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::{
    blit, clear, disable_double_buffer, draw_char, draw_line, draw_rect, enable_double_buffer,
    fill_rect, flip, mode, print, putpixel, set_mode,
};

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod host {
    use super::*;

    // No adapter on the host; every operation reports NoDevice after
    // the syscall layer has already validated its pointers.
    pub fn set_mode(_mode: u32) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn mode() -> u32 {
        MODE_TEXT
    }

    pub fn clear(_color: u8) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn putpixel(_x: i32, _y: i32, _color: u8) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn draw_rect(_p: &RectParams) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn fill_rect(_p: &RectParams) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn draw_line(_p: &LineParams) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn draw_char(_p: &CharParams) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn print(_x: i32, _y: i32, _text: &str, _color: u8) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn enable_double_buffer() -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn disable_double_buffer() {}

    pub fn flip() -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }

    pub fn blit(_x: i32, _y: i32, _w: u32, _h: u32, _data: &[u8]) -> KernelResult<()> {
        Err(KernelError::NoDevice)
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub use host::{
    blit, clear, disable_double_buffer, draw_char, draw_line, draw_rect, enable_double_buffer,
    fill_rect, flip, mode, print, putpixel, set_mode,
};

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod font {
    //! 8×8 bitmap font, rows top to bottom, bit 0 = leftmost pixel.
    //! The classic public-domain font8x8 basic-latin table.

    pub fn glyph(ch: char) -> [u8; 8] {
        let idx = ch as usize;
        if (0x20..0x80).contains(&idx) {
            FONT[idx - 0x20]
        } else {
            [0xFF, 0x81, 0x81, 0x81, 0x81, 0x81, 0x81, 0xFF] // box
        }
    }

    const FONT: [[u8; 8]; 96] = [
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
        [0x18, 0x3C, 0x3C, 0x18, 0x18, 0x00, 0x18, 0x00], // !
        [0x36, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // "
        [0x36, 0x36, 0x7F, 0x36, 0x7F, 0x36, 0x36, 0x00], // #
        [0x0C, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x0C, 0x00], // $
        [0x00, 0x63, 0x33, 0x18, 0x0C, 0x66, 0x63, 0x00], // %
        [0x1C, 0x36, 0x1C, 0x6E, 0x3B, 0x33, 0x6E, 0x00], // &
        [0x06, 0x06, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00], // '
        [0x18, 0x0C, 0x06, 0x06, 0x06, 0x0C, 0x18, 0x00], // (
        [0x06, 0x0C, 0x18, 0x18, 0x18, 0x0C, 0x06, 0x00], // )
        [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00], // *
        [0x00, 0x0C, 0x0C, 0x3F, 0x0C, 0x0C, 0x00, 0x00], // +
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ,
        [0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x00, 0x00], // -
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x00], // .
        [0x60, 0x30, 0x18, 0x0C, 0x06, 0x03, 0x01, 0x00], // /
        [0x3E, 0x63, 0x73, 0x7B, 0x6F, 0x67, 0x3E, 0x00], // 0
        [0x0C, 0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x3F, 0x00], // 1
        [0x1E, 0x33, 0x30, 0x1C, 0x06, 0x33, 0x3F, 0x00], // 2
        [0x1E, 0x33, 0x30, 0x1C, 0x30, 0x33, 0x1E, 0x00], // 3
        [0x38, 0x3C, 0x36, 0x33, 0x7F, 0x30, 0x78, 0x00], // 4
        [0x3F, 0x03, 0x1F, 0x30, 0x30, 0x33, 0x1E, 0x00], // 5
        [0x1C, 0x06, 0x03, 0x1F, 0x33, 0x33, 0x1E, 0x00], // 6
        [0x3F, 0x33, 0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x00], // 7
        [0x1E, 0x33, 0x33, 0x1E, 0x33, 0x33, 0x1E, 0x00], // 8
        [0x1E, 0x33, 0x33, 0x3E, 0x30, 0x18, 0x0E, 0x00], // 9
        [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x00], // :
        [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x06], // ;
        [0x18, 0x0C, 0x06, 0x03, 0x06, 0x0C, 0x18, 0x00], // <
        [0x00, 0x00, 0x3F, 0x00, 0x00, 0x3F, 0x00, 0x00], // =
        [0x06, 0x0C, 0x18, 0x30, 0x18, 0x0C, 0x06, 0x00], // >
        [0x1E, 0x33, 0x30, 0x18, 0x0C, 0x00, 0x0C, 0x00], // ?
        [0x3E, 0x63, 0x7B, 0x7B, 0x7B, 0x03, 0x1E, 0x00], // @
        [0x0C, 0x1E, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x00], // A
        [0x3F, 0x66, 0x66, 0x3E, 0x66, 0x66, 0x3F, 0x00], // B
        [0x3C, 0x66, 0x03, 0x03, 0x03, 0x66, 0x3C, 0x00], // C
        [0x1F, 0x36, 0x66, 0x66, 0x66, 0x36, 0x1F, 0x00], // D
        [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x46, 0x7F, 0x00], // E
        [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x06, 0x0F, 0x00], // F
        [0x3C, 0x66, 0x03, 0x03, 0x73, 0x66, 0x7C, 0x00], // G
        [0x33, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x33, 0x00], // H
        [0x1E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // I
        [0x78, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E, 0x00], // J
        [0x67, 0x66, 0x36, 0x1E, 0x36, 0x66, 0x67, 0x00], // K
        [0x0F, 0x06, 0x06, 0x06, 0x46, 0x66, 0x7F, 0x00], // L
        [0x63, 0x77, 0x7F, 0x7F, 0x6B, 0x63, 0x63, 0x00], // M
        [0x63, 0x67, 0x6F, 0x7B, 0x73, 0x63, 0x63, 0x00], // N
        [0x1C, 0x36, 0x63, 0x63, 0x63, 0x36, 0x1C, 0x00], // O
        [0x3F, 0x66, 0x66, 0x3E, 0x06, 0x06, 0x0F, 0x00], // P
        [0x1E, 0x33, 0x33, 0x33, 0x3B, 0x1E, 0x38, 0x00], // Q
        [0x3F, 0x66, 0x66, 0x3E, 0x36, 0x66, 0x67, 0x00], // R
        [0x1E, 0x33, 0x07, 0x0E, 0x38, 0x33, 0x1E, 0x00], // S
        [0x3F, 0x2D, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // T
        [0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3F, 0x00], // U
        [0x33, 0x33, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // V
        [0x63, 0x63, 0x63, 0x6B, 0x7F, 0x77, 0x63, 0x00], // W
        [0x63, 0x63, 0x36, 0x1C, 0x1C, 0x36, 0x63, 0x00], // X
        [0x33, 0x33, 0x33, 0x1E, 0x0C, 0x0C, 0x1E, 0x00], // Y
        [0x7F, 0x63, 0x31, 0x18, 0x4C, 0x66, 0x7F, 0x00], // Z
        [0x1E, 0x06, 0x06, 0x06, 0x06, 0x06, 0x1E, 0x00], // [
        [0x03, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x40, 0x00], // backslash
        [0x1E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x1E, 0x00], // ]
        [0x08, 0x1C, 0x36, 0x63, 0x00, 0x00, 0x00, 0x00], // ^
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // _
        [0x0C, 0x0C, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00], // `
        [0x00, 0x00, 0x1E, 0x30, 0x3E, 0x33, 0x6E, 0x00], // a
        [0x07, 0x06, 0x06, 0x3E, 0x66, 0x66, 0x3B, 0x00], // b
        [0x00, 0x00, 0x1E, 0x33, 0x03, 0x33, 0x1E, 0x00], // c
        [0x38, 0x30, 0x30, 0x3E, 0x33, 0x33, 0x6E, 0x00], // d
        [0x00, 0x00, 0x1E, 0x33, 0x3F, 0x03, 0x1E, 0x00], // e
        [0x1C, 0x36, 0x06, 0x0F, 0x06, 0x06, 0x0F, 0x00], // f
        [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x1F], // g
        [0x07, 0x06, 0x36, 0x6E, 0x66, 0x66, 0x67, 0x00], // h
        [0x0C, 0x00, 0x0E, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // i
        [0x30, 0x00, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E], // j
        [0x07, 0x06, 0x66, 0x36, 0x1E, 0x36, 0x67, 0x00], // k
        [0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00], // l
        [0x00, 0x00, 0x33, 0x7F, 0x7F, 0x6B, 0x63, 0x00], // m
        [0x00, 0x00, 0x1F, 0x33, 0x33, 0x33, 0x33, 0x00], // n
        [0x00, 0x00, 0x1E, 0x33, 0x33, 0x33, 0x1E, 0x00], // o
        [0x00, 0x00, 0x3B, 0x66, 0x66, 0x3E, 0x06, 0x0F], // p
        [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x78], // q
        [0x00, 0x00, 0x3B, 0x6E, 0x66, 0x06, 0x0F, 0x00], // r
        [0x00, 0x00, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x00], // s
        [0x08, 0x0C, 0x3E, 0x0C, 0x0C, 0x2C, 0x18, 0x00], // t
        [0x00, 0x00, 0x33, 0x33, 0x33, 0x33, 0x6E, 0x00], // u
        [0x00, 0x00, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00], // v
        [0x00, 0x00, 0x63, 0x6B, 0x7F, 0x7F, 0x36, 0x00], // w
        [0x00, 0x00, 0x63, 0x36, 0x1C, 0x36, 0x63, 0x00], // x
        [0x00, 0x00, 0x33, 0x33, 0x33, 0x3E, 0x30, 0x1F], // y
        [0x00, 0x00, 0x3F, 0x19, 0x0C, 0x26, 0x3F, 0x00], // z
        [0x38, 0x0C, 0x0C, 0x07, 0x0C, 0x0C, 0x38, 0x00], // {
        [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00], // |
        [0x07, 0x0C, 0x0C, 0x38, 0x0C, 0x0C, 0x07, 0x00], // }
        [0x6E, 0x3B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ~
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // DEL
    ];
}
