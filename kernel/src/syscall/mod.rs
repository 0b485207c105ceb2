//! System call dispatcher
//!
//! The numeric table is the ABI: numbers, argument order (EBX, ECX,
//! EDX) and return semantics are fixed, and the result lands in the
//! saved frame's EAX. Every user pointer is validated through the
//! page-table engine before a single byte moves, and all transfers go
//! through the sanctioned user-copy helpers; failures return −1 with
//! no side effects.
//!
//! Handlers that park the caller return `None`: the live frame then
//! already belongs to the next context and must not be written.

mod device;
mod fs;
mod process;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::kernel::Kernel;
use crate::trap::TrapFrame;

/// The system call numbers. Stable; new calls take the next free
/// number.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Write = 1,
    Exit = 2,
    Open = 3,
    Read = 4,
    Close = 5,
    Exec = 6,
    GetArgs = 7,
    Stat = 8,
    Seek = 9,
    ListDir = 10,
    Mkdir = 11,
    Rm = 12,
    Touch = 13,
    GetCwd = 14,
    SetCwd = 15,
    Clear = 16,
    SetColor = 17,
    WriteFile = 18,
    HistoryCount = 19,
    HistoryGet = 20,
    GetTicks = 21,
    GetCommandCount = 22,
    GetChar = 23,
    SleepMs = 24,
    AliasSet = 25,
    AliasRemove = 26,
    AliasCount = 27,
    AliasGet = 28,
    TimerStart = 29,
    TimerStop = 30,
    TimerStatus = 31,
    Beep = 32,
    Halt = 33,
    GfxDemo = 34,
    GfxAnim = 35,
    GfxPaint = 36,
    GuiDesktop = 37,
    Gui = 38,
    GuiPaint = 39,
    GuiCalc = 40,
    GuiFilemgr = 41,
    GfxSetMode = 42,
    GfxGetMode = 43,
    GfxGetWidth = 44,
    GfxGetHeight = 45,
    GfxClear = 46,
    GfxPutPixel = 47,
    GfxDrawRect = 48,
    GfxFillRect = 49,
    GfxDrawLine = 50,
    GfxDrawChar = 51,
    GfxPrint = 52,
    GfxFlip = 53,
    GfxDoubleBufferEnable = 54,
    GfxDoubleBufferDisable = 55,
    MouseGetState = 56,
    KeyboardHasInput = 57,
    Rename = 58,
    Fork = 59,
    Spawn = 60,
    Wait = 61,
    GetPid = 62,
    Brk = 63,
    Pipe = 64,
    Dup2 = 65,
    Kill = 66,
    ProcList = 67,
    SpeakerStart = 68,
    SpeakerStop = 69,
    AudioWrite = 70,
    AudioSetVolume = 71,
    GfxBlit = 72,
}

impl Syscall {
    pub fn from_number(n: u32) -> Option<Self> {
        if (1..=72).contains(&n) {
            // SAFETY: repr(u32) enum with contiguous discriminants
            // 1..=72, just range-checked.
            Some(unsafe { core::mem::transmute::<u32, Syscall>(n) })
        } else {
            None
        }
    }
}

/// Dispatch the syscall described by the saved frame and write its
/// result back into the frame's EAX (unless the caller was parked).
pub fn dispatch(k: &mut Kernel, frame: &mut TrapFrame) {
    let number = frame.eax;
    let (a, b, c) = (frame.ebx, frame.ecx, frame.edx);

    let result: Option<i32> = match Syscall::from_number(number) {
        None => {
            log::debug!("unknown syscall {}", number);
            Some(-1)
        }
        Some(call) => match call {
            // Process
            Syscall::Exit => {
                k.exit_current(frame, a as i32);
                None
            }
            Syscall::Exec => process::sys_exec(k, frame, a, b, c),
            Syscall::GetArgs => Some(k.getargs_current(a, b)),
            Syscall::Fork => process::sys_fork(k, frame),
            Syscall::Spawn => process::sys_spawn(k, a, b, c),
            Syscall::Wait => k.wait_current(frame, a as i32, b),
            Syscall::GetPid => Some(k.pm.current_pid().map(|p| p as i32).unwrap_or(-1)),
            Syscall::Brk => Some(k.brk_current(a)),
            Syscall::Pipe => Some(k.pipe_create(a)),
            Syscall::Dup2 => Some(k.dup2_current(a as i32, b as i32)),
            Syscall::Kill => k.kill_process(frame, a, b as i32),
            Syscall::ProcList => Some(process::sys_proclist(k, a, b)),
            Syscall::SleepMs => k.sleep_current(frame, a),
            Syscall::GetTicks => Some(k.sched.ticks as u32 as i32),
            Syscall::Halt => {
                log::error!("halt requested by process {:?}", k.pm.current_pid());
                crate::arch::halt_forever();
            }

            // Files
            Syscall::Open => fs::sys_open(k, a),
            Syscall::Read => fs::sys_read(k, frame, a as i32, b, c),
            Syscall::Close => Some(k.close_fd_current(a as i32)),
            Syscall::Seek => fs::sys_seek(k, a as i32, b as i32, c),
            Syscall::Stat => fs::sys_stat(k, a, b),
            Syscall::ListDir => fs::sys_listdir(k, a, b, c),
            Syscall::Mkdir => fs::sys_mkdir(k, a),
            Syscall::Rm => fs::sys_rm(k, a),
            Syscall::Touch => fs::sys_touch(k, a),
            Syscall::GetCwd => fs::sys_getcwd(k, a, b),
            Syscall::SetCwd => fs::sys_setcwd(k, a),
            Syscall::WriteFile => fs::sys_writefile(k, a, b, c),
            Syscall::Rename => fs::sys_rename(k, a, b),

            // Console, input, audio, shell services, graphics
            Syscall::Write => device::sys_write(k, frame, a, b),
            Syscall::Clear => device::sys_clear(),
            Syscall::SetColor => device::sys_setcolor(a, b),
            Syscall::GetChar => device::sys_getchar(),
            Syscall::KeyboardHasInput => device::sys_keyboard_has_input(),
            Syscall::MouseGetState => device::sys_mouse_get_state(k, a),
            Syscall::HistoryCount => Some(k.shell.history_len() as i32),
            Syscall::HistoryGet => device::sys_history_get(k, a, b, c),
            Syscall::GetCommandCount => Some(k.shell.command_count() as i32),
            Syscall::AliasSet => device::sys_alias_set(k, a, b),
            Syscall::AliasRemove => device::sys_alias_remove(k, a),
            Syscall::AliasCount => Some(k.shell.alias_count() as i32),
            Syscall::AliasGet => device::sys_alias_get(k, a, b, c),
            Syscall::TimerStart => {
                let now = k.sched.ticks;
                k.shell.timer_start(now);
                Some(0)
            }
            Syscall::TimerStop => {
                k.shell.timer_stop();
                Some(0)
            }
            Syscall::TimerStatus => Some(k.shell.timer_elapsed(k.sched.ticks) as u32 as i32),
            Syscall::Beep => {
                crate::drivers::speaker::beep(a, b, k.sched.ticks);
                Some(0)
            }
            Syscall::SpeakerStart => {
                crate::drivers::speaker::start(a);
                Some(0)
            }
            Syscall::SpeakerStop => {
                crate::drivers::speaker::stop();
                Some(0)
            }
            Syscall::AudioWrite | Syscall::AudioSetVolume => Some(-1), // no audio device

            // Demo/GUI launchers live with the window system, which is
            // not part of this kernel.
            Syscall::GfxDemo
            | Syscall::GfxAnim
            | Syscall::GfxPaint
            | Syscall::GuiDesktop
            | Syscall::Gui
            | Syscall::GuiPaint
            | Syscall::GuiCalc
            | Syscall::GuiFilemgr => Some(-1),

            Syscall::GfxSetMode => device::sys_gfx_set_mode(a),
            Syscall::GfxGetMode => Some(crate::drivers::graphics::mode() as i32),
            Syscall::GfxGetWidth => Some(crate::drivers::graphics::WIDTH_13H as i32),
            Syscall::GfxGetHeight => Some(crate::drivers::graphics::HEIGHT_13H as i32),
            Syscall::GfxClear => device::sys_gfx_clear(a),
            Syscall::GfxPutPixel => device::sys_gfx_putpixel(a, b, c),
            Syscall::GfxDrawRect => device::sys_gfx_rect(k, a, false),
            Syscall::GfxFillRect => device::sys_gfx_rect(k, a, true),
            Syscall::GfxDrawLine => device::sys_gfx_line(k, a),
            Syscall::GfxDrawChar => device::sys_gfx_char(k, a),
            Syscall::GfxPrint => device::sys_gfx_print(k, a, b, c),
            Syscall::GfxFlip => device::sys_gfx_flip(),
            Syscall::GfxDoubleBufferEnable => device::sys_gfx_db_enable(),
            Syscall::GfxDoubleBufferDisable => {
                crate::drivers::graphics::disable_double_buffer();
                Some(0)
            }
            Syscall::GfxBlit => device::sys_gfx_blit(k, a),
        },
    };

    if let Some(ret) = result {
        frame.eax = ret as u32;
    }
}

/// Copy `len` validated bytes from the current process.
pub(crate) fn read_user_bytes(k: &mut Kernel, addr: u32, len: u32) -> Option<Vec<u8>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if !k.validate_current_span(addr, len) {
        return None;
    }
    let mut buf = vec![0u8; len as usize];
    let proc = k.pm.current()?;
    proc.space.copy_from_user(&k.phys, &mut buf, addr).ok()?;
    Some(buf)
}

/// Copy validated bytes out to the current process.
pub(crate) fn write_user_bytes(k: &mut Kernel, addr: u32, data: &[u8]) -> Option<()> {
    if data.is_empty() {
        return Some(());
    }
    if !k.validate_current_span(addr, data.len() as u32) {
        return None;
    }
    let Kernel {
        ref phys,
        ref mut frames,
        ref pm,
        ..
    } = *k;
    let proc = pm.current()?;
    proc.space.copy_to_user(phys, frames, addr, data).ok()
}

/// Read a NUL-terminated user string of at most `max` bytes. Pages are
/// validated as the scan crosses them, so a string may end just before
/// an unmapped page.
pub(crate) fn read_user_cstr(k: &mut Kernel, addr: u32, max: u32) -> Option<String> {
    let mut bytes = Vec::new();
    let proc = k.pm.current()?;
    for i in 0..max {
        let cur = addr.checked_add(i)?;
        if !proc.space.user_range_mapped(&k.phys, cur, 1) {
            return None;
        }
        let mut byte = [0u8; 1];
        proc.space.copy_from_user(&k.phys, &mut byte, cur).ok()?;
        if byte[0] == 0 {
            return String::from_utf8(bytes).ok();
        }
        bytes.push(byte[0]);
    }
    None // unterminated
}

/// Optional argument blob: a null pointer or zero length is empty.
pub(crate) fn read_user_args(k: &mut Kernel, addr: u32, len: u32) -> Option<Vec<u8>> {
    if addr == 0 || len == 0 {
        return Some(Vec::new());
    }
    read_user_bytes(k, addr, len.min(crate::process::ARGS_MAX as u32))
}
