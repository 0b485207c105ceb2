//! Process system calls

use alloc::vec::Vec;

use super::{read_user_args, read_user_cstr, write_user_bytes};
use crate::kernel::Kernel;
use crate::process::{ProcessInfo, CWD_MAX, NAME_MAX};
use crate::trap::TrapFrame;

/// exec(path, args, len): replace the caller's image. Only failures
/// return (as −1).
pub fn sys_exec(
    k: &mut Kernel,
    frame: &mut TrapFrame,
    path_ptr: u32,
    args_ptr: u32,
    args_len: u32,
) -> Option<i32> {
    let Some(path) = read_user_cstr(k, path_ptr, CWD_MAX as u32) else {
        return Some(-1);
    };
    let Some(args) = read_user_args(k, args_ptr, args_len) else {
        return Some(-1);
    };
    k.exec_current(frame, &path, &args)
}

/// fork(): child pid to the parent, zero to the child.
pub fn sys_fork(k: &mut Kernel, frame: &mut TrapFrame) -> Option<i32> {
    match k.fork_current(frame) {
        Ok(child) => Some(child as i32),
        Err(e) => {
            log::warn!("fork failed: {}", e);
            Some(-1)
        }
    }
}

/// spawn(path, args, len): new process from a filesystem executable.
pub fn sys_spawn(k: &mut Kernel, path_ptr: u32, args_ptr: u32, args_len: u32) -> Option<i32> {
    let Some(path) = read_user_cstr(k, path_ptr, CWD_MAX as u32) else {
        return Some(-1);
    };
    let Some(args) = read_user_args(k, args_ptr, args_len) else {
        return Some(-1);
    };
    // Spawns are how commands run; feed the shell history here.
    let mut line = path.clone();
    if !args.is_empty() {
        if let Ok(s) = core::str::from_utf8(&args) {
            line.push(' ');
            line.push_str(s);
        }
    }
    k.shell.record_command(&line);
    match k.spawn(&path, &args) {
        Ok(pid) => Some(pid as i32),
        Err(e) => {
            log::warn!("spawn {:?} failed: {}", path, e);
            Some(-1)
        }
    }
}

/// proclist(out, max): snapshot of the process table.
pub fn sys_proclist(k: &mut Kernel, out_ptr: u32, max: u32) -> i32 {
    let entries: Vec<ProcessInfo> = k
        .pm
        .iter()
        .take(max as usize)
        .map(|p| {
            let mut name = [0u8; NAME_MAX];
            let bytes = p.name.as_bytes();
            let n = bytes.len().min(NAME_MAX - 1);
            name[..n].copy_from_slice(&bytes[..n]);
            ProcessInfo {
                pid: p.pid,
                state: p.state.as_abi(),
                priority: p.priority,
                reserved: 0,
                time_slice: p.time_slice,
                total_time: p.total_ticks as u32,
                name,
            }
        })
        .collect();

    let mut bytes = Vec::with_capacity(entries.len() * core::mem::size_of::<ProcessInfo>());
    for e in &entries {
        bytes.extend_from_slice(&e.pid.to_le_bytes());
        bytes.push(e.state);
        bytes.push(e.priority);
        bytes.extend_from_slice(&e.reserved.to_le_bytes());
        bytes.extend_from_slice(&e.time_slice.to_le_bytes());
        bytes.extend_from_slice(&e.total_time.to_le_bytes());
        bytes.extend_from_slice(&e.name);
    }
    match write_user_bytes(k, out_ptr, &bytes) {
        Some(()) => entries.len() as i32,
        None => -1,
    }
}
