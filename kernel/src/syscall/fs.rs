//! Filesystem system calls
//!
//! Path arguments are NUL-terminated user strings resolved against the
//! caller's cwd; the on-wire structs (`struct stat`, `struct dirent`)
//! are serialized field by field so the ABI layout never depends on
//! Rust struct padding.

use alloc::vec;
use alloc::vec::Vec;

use super::{read_user_bytes, read_user_cstr, write_user_bytes};
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::process::{Fd, CWD_MAX, MAX_FDS};
use crate::trap::TrapFrame;

/// dirent name field width (the d_name ABI).
const DIRENT_NAME_MAX: usize = 28;
/// 28-byte name + type + size.
const DIRENT_SIZE: usize = DIRENT_NAME_MAX + 8;

const SEEK_SET: u32 = 0;
const SEEK_CUR: u32 = 1;
const SEEK_END: u32 = 2;

fn user_path(k: &mut Kernel, ptr: u32) -> Option<alloc::string::String> {
    read_user_cstr(k, ptr, CWD_MAX as u32)
}

/// open(path): files only; directories are listed, not opened.
pub fn sys_open(k: &mut Kernel, path_ptr: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    let stat = match k.fs.stat(&path, &cwd) {
        Ok(s) => s,
        Err(_) => return Some(-1),
    };
    if stat.kind != crate::fs::NodeKind::File {
        return Some(-1);
    }
    let abs = FileSystem::absolute(&path, &cwd);
    let proc = k.pm.current_mut()?;
    match proc.alloc_fd() {
        Some(slot) => {
            proc.fds[slot] = Some(Fd::File {
                path: abs,
                offset: 0,
            });
            Some(slot as i32)
        }
        None => Some(-1),
    }
}

/// read(fd, buf, len): files advance their offset, pipes may park the
/// caller, the tty drains pending keyboard input without blocking.
pub fn sys_read(
    k: &mut Kernel,
    frame: &mut TrapFrame,
    fd: i32,
    buf: u32,
    len: u32,
) -> Option<i32> {
    if !(0..MAX_FDS as i32).contains(&fd) {
        return Some(-1);
    }
    let entry = match k.pm.current()?.fd(fd) {
        Some(e) => e.clone(),
        None => return Some(-1),
    };
    match entry {
        Fd::File { path, offset } => {
            if len == 0 {
                return Some(0);
            }
            if !k.validate_current_span(buf, len) {
                return Some(-1);
            }
            let cwd = k.current_cwd();
            let mut data = vec![0u8; len as usize];
            let n = match k.fs.read_at(&path, &cwd, offset, &mut data) {
                Ok(n) => n,
                Err(_) => return Some(-1),
            };
            data.truncate(n);
            if write_user_bytes(k, buf, &data).is_none() {
                return Some(-1);
            }
            if let Some(Fd::File { offset, .. }) = k.pm.current_mut()?.fds[fd as usize].as_mut() {
                *offset += n as u32;
            }
            Some(n as i32)
        }
        Fd::PipeRead(handle) => k.pipe_read(frame, handle, buf, len),
        Fd::PipeWrite(_) => Some(-1),
        Fd::Tty => {
            if len == 0 {
                return Some(0);
            }
            if !k.validate_current_span(buf, len) {
                return Some(-1);
            }
            let mut data = Vec::new();
            while (data.len() as u32) < len {
                match crate::drivers::keyboard::getchar() {
                    Some(b) => data.push(b),
                    None => break,
                }
            }
            let n = data.len();
            if n > 0 && write_user_bytes(k, buf, &data).is_none() {
                return Some(-1);
            }
            Some(n as i32)
        }
    }
}

/// seek(fd, off, whence): files only.
pub fn sys_seek(k: &mut Kernel, fd: i32, off: i32, whence: u32) -> Option<i32> {
    if !(0..MAX_FDS as i32).contains(&fd) {
        return Some(-1);
    }
    let (path, offset) = match k.pm.current()?.fd(fd) {
        Some(Fd::File { path, offset }) => (path.clone(), *offset),
        _ => return Some(-1),
    };
    let cwd = k.current_cwd();
    let size = match k.fs.stat(&path, &cwd) {
        Ok(s) => s.size,
        Err(_) => return Some(-1),
    };
    let base: i64 = match whence {
        SEEK_SET => 0,
        SEEK_CUR => offset as i64,
        SEEK_END => size as i64,
        _ => return Some(-1),
    };
    let target = base + off as i64;
    if !(0..=u32::MAX as i64).contains(&target) {
        return Some(-1);
    }
    if let Some(Fd::File { offset, .. }) = k.pm.current_mut()?.fds[fd as usize].as_mut() {
        *offset = target as u32;
    }
    Some(target as i32)
}

/// stat(path, out): writes `{ st_size, st_type }`.
pub fn sys_stat(k: &mut Kernel, path_ptr: u32, out_ptr: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    let stat = match k.fs.stat(&path, &cwd) {
        Ok(s) => s,
        Err(_) => return Some(-1),
    };
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&stat.size.to_le_bytes());
    out[4..].copy_from_slice(&(stat.kind as u32).to_le_bytes());
    match write_user_bytes(k, out_ptr, &out) {
        Some(()) => Some(0),
        None => Some(-1),
    }
}

/// listdir(path, entries, max): fills `struct dirent` slots, returns
/// the count written.
pub fn sys_listdir(k: &mut Kernel, path_ptr: u32, out_ptr: u32, max: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    let entries = match k.fs.listdir(&path, &cwd) {
        Ok(e) => e,
        Err(_) => return Some(-1),
    };
    let count = entries.len().min(max as usize);
    let mut bytes = Vec::with_capacity(count * DIRENT_SIZE);
    for entry in entries.iter().take(count) {
        let mut name = [0u8; DIRENT_NAME_MAX];
        let src = entry.name.as_bytes();
        let n = src.len().min(DIRENT_NAME_MAX - 1);
        name[..n].copy_from_slice(&src[..n]);
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&(entry.kind as u32).to_le_bytes());
        bytes.extend_from_slice(&entry.size.to_le_bytes());
    }
    match write_user_bytes(k, out_ptr, &bytes) {
        Some(()) => Some(count as i32),
        None => Some(-1),
    }
}

pub fn sys_mkdir(k: &mut Kernel, path_ptr: u32) -> Option<i32> {
    path_op(k, path_ptr, |k, path, cwd| k.fs.mkdir(path, cwd).is_ok())
}

pub fn sys_rm(k: &mut Kernel, path_ptr: u32) -> Option<i32> {
    path_op(k, path_ptr, |k, path, cwd| k.fs.remove(path, cwd).is_ok())
}

pub fn sys_touch(k: &mut Kernel, path_ptr: u32) -> Option<i32> {
    path_op(k, path_ptr, |k, path, cwd| k.fs.touch(path, cwd).is_ok())
}

fn path_op(
    k: &mut Kernel,
    path_ptr: u32,
    op: impl FnOnce(&mut Kernel, &str, &str) -> bool,
) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    Some(if op(k, &path, &cwd) { 0 } else { -1 })
}

/// getcwd(buf, len): NUL-terminated; returns the path length.
pub fn sys_getcwd(k: &mut Kernel, buf: u32, len: u32) -> Option<i32> {
    let cwd = k.current_cwd();
    let needed = cwd.len() as u32 + 1;
    if len < needed {
        return Some(-1);
    }
    let mut bytes = cwd.into_bytes();
    bytes.push(0);
    match write_user_bytes(k, buf, &bytes) {
        Some(()) => Some(bytes.len() as i32 - 1),
        None => Some(-1),
    }
}

/// setcwd(path): must name an existing directory.
pub fn sys_setcwd(k: &mut Kernel, path_ptr: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    if !k.fs.is_dir(&path, &cwd) {
        return Some(-1);
    }
    let abs = FileSystem::absolute(&path, &cwd);
    if abs.len() >= CWD_MAX {
        return Some(-1);
    }
    k.pm.current_mut()?.cwd = abs;
    Some(0)
}

/// writefile(path, data, len): create or replace the whole file.
pub fn sys_writefile(k: &mut Kernel, path_ptr: u32, data_ptr: u32, len: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let data = match read_user_bytes(k, data_ptr, len) {
        Some(d) => d,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    Some(if k.fs.write_file(&path, &cwd, &data).is_ok() {
        0
    } else {
        -1
    })
}

/// rename(path, new_name).
pub fn sys_rename(k: &mut Kernel, path_ptr: u32, new_name_ptr: u32) -> Option<i32> {
    let path = match user_path(k, path_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let new_name = match user_path(k, new_name_ptr) {
        Some(p) => p,
        None => return Some(-1),
    };
    let cwd = k.current_cwd();
    Some(if k.fs.rename(&path, &cwd, &new_name).is_ok() {
        0
    } else {
        -1
    })
}
