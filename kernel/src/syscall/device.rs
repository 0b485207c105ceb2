//! Console, input, shell-service and graphics system calls
//!
//! The graphics calls route to the mode-13h driver; their
//! pointer-bearing parameter blocks are validated and copied in before
//! the driver runs, so a bad pointer returns −1 whether or not an
//! adapter is present.

use super::{read_user_bytes, read_user_cstr, write_user_bytes};
use crate::drivers::{graphics, keyboard, mouse, vga};
use crate::kernel::Kernel;
use crate::shellsvc::LINE_MAX;

/// write(buf, len): output through descriptor 1 — the console by
/// default, a pipe after dup2. Zero length is a successful no-op (the
/// NULL-with-zero-length probe relies on this).
pub fn sys_write(
    k: &mut Kernel,
    frame: &mut crate::trap::TrapFrame,
    buf: u32,
    len: u32,
) -> Option<i32> {
    use crate::process::Fd;
    if len == 0 {
        return Some(0);
    }
    let stdout = k.pm.current()?.fd(1).cloned();
    match stdout {
        Some(Fd::PipeWrite(handle)) => k.pipe_write(frame, handle, buf, len),
        Some(Fd::Tty) | None => {
            let data = match read_user_bytes(k, buf, len) {
                Some(d) => d,
                None => return Some(-1),
            };
            vga::write_bytes(&data);
            Some(data.len() as i32)
        }
        Some(Fd::File { .. }) | Some(Fd::PipeRead(_)) => Some(-1),
    }
}

pub fn sys_clear() -> Option<i32> {
    vga::clear();
    Some(0)
}

pub fn sys_setcolor(fg: u32, bg: u32) -> Option<i32> {
    vga::set_color(fg as u8, bg as u8);
    Some(0)
}

/// getchar(): next pending input byte, or −1 without blocking.
pub fn sys_getchar() -> Option<i32> {
    Some(keyboard::getchar().map(|b| b as i32).unwrap_or(-1))
}

pub fn sys_keyboard_has_input() -> Option<i32> {
    Some(keyboard::has_input() as i32)
}

/// mouse_get_state(out): writes `{ x, y, buttons }`.
pub fn sys_mouse_get_state(k: &mut Kernel, out_ptr: u32) -> Option<i32> {
    if !k.validate_current_span(out_ptr, 12) {
        return Some(-1);
    }
    let state = match mouse::state() {
        Some(s) => s,
        None => return Some(-1),
    };
    let mut out = [0u8; 12];
    out[..4].copy_from_slice(&state.x.to_le_bytes());
    out[4..8].copy_from_slice(&state.y.to_le_bytes());
    out[8..].copy_from_slice(&state.buttons.to_le_bytes());
    match write_user_bytes(k, out_ptr, &out) {
        Some(()) => Some(0),
        None => Some(-1),
    }
}

/// history_get(index, buf, len): NUL-terminated entry; returns its
/// length.
pub fn sys_history_get(k: &mut Kernel, index: u32, buf: u32, len: u32) -> Option<i32> {
    let line = match k.shell.history(index as usize) {
        Some(l) => alloc::string::String::from(l),
        None => return Some(-1),
    };
    if len == 0 || (line.len() as u32) >= len {
        return Some(-1);
    }
    let mut bytes = line.into_bytes();
    bytes.push(0);
    let written = bytes.len() as i32 - 1;
    match write_user_bytes(k, buf, &bytes) {
        Some(()) => Some(written),
        None => Some(-1),
    }
}

pub fn sys_alias_set(k: &mut Kernel, name_ptr: u32, value_ptr: u32) -> Option<i32> {
    let name = match read_user_cstr(k, name_ptr, LINE_MAX as u32) {
        Some(s) => s,
        None => return Some(-1),
    };
    let value = match read_user_cstr(k, value_ptr, LINE_MAX as u32) {
        Some(s) => s,
        None => return Some(-1),
    };
    Some(if k.shell.alias_set(&name, &value) { 0 } else { -1 })
}

pub fn sys_alias_remove(k: &mut Kernel, name_ptr: u32) -> Option<i32> {
    let name = match read_user_cstr(k, name_ptr, LINE_MAX as u32) {
        Some(s) => s,
        None => return Some(-1),
    };
    Some(if k.shell.alias_remove(&name) { 0 } else { -1 })
}

/// alias_get(index, name_buf, value_buf): both buffers receive
/// NUL-terminated strings of at most LINE_MAX bytes.
pub fn sys_alias_get(k: &mut Kernel, index: u32, name_ptr: u32, value_ptr: u32) -> Option<i32> {
    let (name, value) = match k.shell.alias(index as usize) {
        Some(a) => (a.name.clone(), a.command.clone()),
        None => return Some(-1),
    };
    let mut name_bytes = name.into_bytes();
    name_bytes.push(0);
    let mut value_bytes = value.into_bytes();
    value_bytes.push(0);
    if write_user_bytes(k, name_ptr, &name_bytes).is_none() {
        return Some(-1);
    }
    match write_user_bytes(k, value_ptr, &value_bytes) {
        Some(()) => Some(0),
        None => Some(-1),
    }
}

// ---------------------------------------------------------------------
// Graphics
// ---------------------------------------------------------------------

fn gfx_result(r: crate::error::KernelResult<()>) -> Option<i32> {
    Some(match r {
        Ok(()) => 0,
        Err(_) => -1,
    })
}

pub fn sys_gfx_set_mode(mode: u32) -> Option<i32> {
    gfx_result(graphics::set_mode(mode))
}

pub fn sys_gfx_clear(color: u32) -> Option<i32> {
    gfx_result(graphics::clear(color as u8))
}

pub fn sys_gfx_putpixel(x: u32, y: u32, color: u32) -> Option<i32> {
    gfx_result(graphics::putpixel(x as i32, y as i32, color as u8))
}

fn read_five_words(k: &mut Kernel, ptr: u32) -> Option<[u32; 5]> {
    let bytes = read_user_bytes(k, ptr, 20)?;
    let mut words = [0u32; 5];
    for (i, w) in words.iter_mut().enumerate() {
        *w = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
    }
    Some(words)
}

pub fn sys_gfx_rect(k: &mut Kernel, params_ptr: u32, fill: bool) -> Option<i32> {
    let [x, y, w, h, color] = match read_five_words(k, params_ptr) {
        Some(v) => v,
        None => return Some(-1),
    };
    let p = graphics::RectParams {
        x: x as i32,
        y: y as i32,
        w: w as i32,
        h: h as i32,
        color,
    };
    gfx_result(if fill {
        graphics::fill_rect(&p)
    } else {
        graphics::draw_rect(&p)
    })
}

pub fn sys_gfx_line(k: &mut Kernel, params_ptr: u32) -> Option<i32> {
    let [x0, y0, x1, y1, color] = match read_five_words(k, params_ptr) {
        Some(v) => v,
        None => return Some(-1),
    };
    gfx_result(graphics::draw_line(&graphics::LineParams {
        x0: x0 as i32,
        y0: y0 as i32,
        x1: x1 as i32,
        y1: y1 as i32,
        color,
    }))
}

pub fn sys_gfx_char(k: &mut Kernel, params_ptr: u32) -> Option<i32> {
    let bytes = match read_user_bytes(k, params_ptr, 16) {
        Some(b) => b,
        None => return Some(-1),
    };
    let word = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
    gfx_result(graphics::draw_char(&graphics::CharParams {
        x: word(0) as i32,
        y: word(1) as i32,
        ch: word(2),
        color: word(3),
    }))
}

pub fn sys_gfx_print(k: &mut Kernel, x: u32, y: u32, text_ptr: u32) -> Option<i32> {
    let text = match read_user_cstr(k, text_ptr, 256) {
        Some(t) => t,
        None => return Some(-1),
    };
    gfx_result(graphics::print(x as i32, y as i32, &text, 15))
}

pub fn sys_gfx_flip() -> Option<i32> {
    gfx_result(graphics::flip())
}

pub fn sys_gfx_db_enable() -> Option<i32> {
    gfx_result(graphics::enable_double_buffer())
}

/// gfx_blit(params): `{ x, y, w, h, data_ptr }`, with `w*h` pixel
/// bytes at `data_ptr`.
pub fn sys_gfx_blit(k: &mut Kernel, params_ptr: u32) -> Option<i32> {
    let [x, y, w, h, data_ptr] = match read_five_words(k, params_ptr) {
        Some(v) => v,
        None => return Some(-1),
    };
    let len = match w.checked_mul(h) {
        Some(l) if l > 0 && l <= 320 * 200 => l,
        _ => return Some(-1),
    };
    let data = match read_user_bytes(k, data_ptr, len) {
        Some(d) => d,
        None => return Some(-1),
    };
    gfx_result(graphics::blit(x as i32, y as i32, w, h, &data))
}
