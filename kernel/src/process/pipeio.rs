//! Pipe I/O orchestration
//!
//! Read and write against pipe descriptors, including parking on a
//! pipe that cannot make progress and resuming parked transfers from
//! the peer side. The wake path performs the resumed copy itself,
//! against the parked process's own address space, using its recorded
//! transfer state — the woken process just finds its return value in
//! its saved frame.

use alloc::sync::Arc;
use alloc::vec;

use crate::ipc::{Pipe, PipeHandle};
use crate::kernel::Kernel;
use crate::process::{BlockReason, Fd, PipeOp, PipeWait, Pid, ProcessState};
use crate::trap::TrapFrame;

impl Kernel {
    /// pipe(): allocate a read/write descriptor pair over a fresh pipe
    /// and write `[read_fd, write_fd]` to `fd_pair_ptr`.
    pub fn pipe_create(&mut self, fd_pair_ptr: u32) -> i32 {
        let ok = {
            let proc = match self.pm.current() {
                Some(p) => p,
                None => return -1,
            };
            proc.space.user_range_mapped(&self.phys, fd_pair_ptr, 8)
        };
        if !ok {
            return -1;
        }

        let handle = Pipe::new_handle();
        let (rfd, wfd) = {
            let proc = self.pm.current_mut().unwrap();
            let Some(rfd) = proc.alloc_fd() else { return -1 };
            proc.fds[rfd] = Some(Fd::PipeRead(handle.clone()));
            let Some(wfd) = proc.alloc_fd() else {
                proc.fds[rfd] = None;
                return -1;
            };
            proc.fds[wfd] = Some(Fd::PipeWrite(handle.clone()));
            (rfd as u32, wfd as u32)
        };

        let mut pair = [0u8; 8];
        pair[..4].copy_from_slice(&rfd.to_le_bytes());
        pair[4..].copy_from_slice(&wfd.to_le_bytes());
        let Kernel {
            ref phys,
            ref mut frames,
            ref pm,
            ..
        } = *self;
        let proc = pm.current().unwrap();
        match proc.space.copy_to_user(phys, frames, fd_pair_ptr, &pair) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    /// dup2(old, new): duplicate a descriptor, closing `new` first.
    pub fn dup2_current(&mut self, old: i32, new: i32) -> i32 {
        use crate::process::MAX_FDS;
        if !(0..MAX_FDS as i32).contains(&old) || !(0..MAX_FDS as i32).contains(&new) {
            return -1;
        }
        let copy = match self.pm.current().and_then(|p| p.fd(old)) {
            Some(fd) => fd.clone(),
            None => return -1,
        };
        if old == new {
            return new;
        }
        // The clone is a fresh pipe reference.
        match &copy {
            Fd::PipeRead(p) => p.lock().retain_read(),
            Fd::PipeWrite(p) => p.lock().retain_write(),
            _ => {}
        }
        let displaced = {
            let proc = self.pm.current_mut().unwrap();
            proc.fds[new as usize].replace(copy)
        };
        if let Some(fd) = displaced {
            self.release_fd(fd);
        }
        new
    }

    /// close(fd).
    pub fn close_fd_current(&mut self, n: i32) -> i32 {
        use crate::process::MAX_FDS;
        if !(0..MAX_FDS as i32).contains(&n) {
            return -1;
        }
        let taken = {
            let proc = match self.pm.current_mut() {
                Some(p) => p,
                None => return -1,
            };
            proc.fds[n as usize].take()
        };
        match taken {
            Some(fd) => {
                self.release_fd(fd);
                0
            }
            None => -1,
        }
    }

    /// Drop one descriptor reference; the last reader/writer going away
    /// cancels the blocked peers on the other side.
    pub(crate) fn release_fd(&mut self, fd: Fd) {
        match fd {
            Fd::PipeRead(handle) => {
                let last = handle.lock().release_read();
                if last {
                    self.fail_blocked_writers(&handle);
                }
                self.pipe_pump(&handle);
            }
            Fd::PipeWrite(handle) => {
                let last = handle.lock().release_write();
                if last {
                    self.eof_blocked_readers(&handle);
                }
                self.pipe_pump(&handle);
            }
            Fd::File { .. } | Fd::Tty => {}
        }
    }

    /// read(fd) on a pipe descriptor.
    pub fn pipe_read(
        &mut self,
        frame: &mut TrapFrame,
        handle: PipeHandle,
        user_buf: u32,
        len: u32,
    ) -> Option<i32> {
        let pid = self.pm.current_pid()?;
        if len == 0 {
            return Some(0);
        }
        if !self.validate_current_span(user_buf, len) {
            return Some(-1);
        }

        let (available, writers) = {
            let p = handle.lock();
            (p.available(), p.writers())
        };

        if available > 0 {
            let n = (len as usize).min(available);
            let mut tmp = vec![0u8; n];
            handle.lock().pop(&mut tmp);
            let Kernel {
                ref phys,
                ref mut frames,
                ref pm,
                ..
            } = *self;
            let proc = pm.current().unwrap();
            if proc.space.copy_to_user(phys, frames, user_buf, &tmp).is_err() {
                return Some(-1);
            }
            // Space was freed; one blocked writer may continue.
            self.pipe_pump(&handle);
            return Some(n as i32);
        }

        if writers == 0 {
            return Some(0); // EOF
        }

        handle.lock().blocked_readers.push_back(pid);
        self.block_current(
            frame,
            BlockReason::Pipe(PipeWait {
                pipe: handle,
                op: PipeOp::Read,
                user_buf,
                len,
                done: 0,
            }),
        );
        None
    }

    /// write(fd) on a pipe descriptor.
    pub fn pipe_write(
        &mut self,
        frame: &mut TrapFrame,
        handle: PipeHandle,
        user_buf: u32,
        len: u32,
    ) -> Option<i32> {
        let pid = self.pm.current_pid()?;
        if len == 0 {
            return Some(0);
        }
        if !self.validate_current_span(user_buf, len) {
            return Some(-1);
        }

        let (free, readers) = {
            let p = handle.lock();
            (p.free_space(), p.readers())
        };
        if readers == 0 {
            return Some(-1);
        }

        if free > 0 {
            let n = (len as usize).min(free);
            let mut tmp = vec![0u8; n];
            {
                let Kernel {
                    ref phys, ref pm, ..
                } = *self;
                let proc = pm.current().unwrap();
                if proc.space.copy_from_user(phys, &mut tmp, user_buf).is_err() {
                    return Some(-1);
                }
            }
            let pushed = handle.lock().push(&tmp);
            debug_assert_eq!(pushed, n);
            // Bytes landed; one blocked reader may continue.
            self.pipe_pump(&handle);
            return Some(n as i32);
        }

        handle.lock().blocked_writers.push_back(pid);
        self.block_current(
            frame,
            BlockReason::Pipe(PipeWait {
                pipe: handle,
                op: PipeOp::Write,
                user_buf,
                len,
                done: 0,
            }),
        );
        None
    }

    /// Take the parked transfer record for `pid` if it is parked on
    /// this pipe in the given direction.
    fn parked_transfer(&self, pid: Pid, handle: &PipeHandle, op: PipeOp) -> Option<PipeWait> {
        let proc = self.pm.get(pid)?;
        match &proc.state {
            ProcessState::Blocked(BlockReason::Pipe(w))
                if w.op == op && Arc::ptr_eq(&w.pipe, handle) =>
            {
                Some(w.clone())
            }
            _ => None,
        }
    }

    /// Resume parked transfers while the buffer state lets either side
    /// progress. Each iteration is one "successful buffer state change
    /// wakes one peer".
    pub(crate) fn pipe_pump(&mut self, handle: &PipeHandle) {
        loop {
            let resumed_reader = self.resume_one_reader(handle);
            let resumed_writer = self.resume_one_writer(handle);
            if !resumed_reader && !resumed_writer {
                break;
            }
        }
    }

    fn resume_one_reader(&mut self, handle: &PipeHandle) -> bool {
        loop {
            let pid = {
                let mut p = handle.lock();
                if p.available() == 0 {
                    return false;
                }
                match p.blocked_readers.pop_front() {
                    Some(pid) => pid,
                    None => return false,
                }
            };
            let Some(wait) = self.parked_transfer(pid, handle, PipeOp::Read) else {
                // Stale entry (killed or repurposed process); drop it.
                continue;
            };

            let n = {
                let p = handle.lock();
                ((wait.len - wait.done) as usize).min(p.available())
            };
            let mut tmp = vec![0u8; n];
            handle.lock().pop(&mut tmp);
            let copied = {
                let Kernel {
                    ref phys,
                    ref mut frames,
                    ref pm,
                    ..
                } = *self;
                let proc = pm.get(pid).unwrap();
                proc.space
                    .copy_to_user(phys, frames, wait.user_buf + wait.done, &tmp)
            };
            let result = match copied {
                Ok(()) => (wait.done + n as u32) as i32,
                Err(_) => -1,
            };
            if let Some(proc) = self.pm.get_mut(pid) {
                proc.frame.eax = result as u32;
            }
            self.make_ready(pid);
            return true;
        }
    }

    fn resume_one_writer(&mut self, handle: &PipeHandle) -> bool {
        loop {
            let pid = {
                let mut p = handle.lock();
                if p.free_space() == 0 {
                    return false;
                }
                match p.blocked_writers.pop_front() {
                    Some(pid) => pid,
                    None => return false,
                }
            };
            let Some(wait) = self.parked_transfer(pid, handle, PipeOp::Write) else {
                continue;
            };

            let n = {
                let p = handle.lock();
                ((wait.len - wait.done) as usize).min(p.free_space())
            };
            let mut tmp = vec![0u8; n];
            let copied = {
                let Kernel {
                    ref phys, ref pm, ..
                } = *self;
                let proc = pm.get(pid).unwrap();
                proc.space
                    .copy_from_user(phys, &mut tmp, wait.user_buf + wait.done)
            };
            let result = match copied {
                Ok(()) => {
                    let pushed = handle.lock().push(&tmp);
                    debug_assert_eq!(pushed, n);
                    (wait.done + n as u32) as i32
                }
                Err(_) => -1,
            };
            if let Some(proc) = self.pm.get_mut(pid) {
                proc.frame.eax = result as u32;
            }
            self.make_ready(pid);
            return true;
        }
    }

    /// Last writer went away: every blocked reader resolves now —
    /// remaining bytes if any, else EOF (0).
    fn eof_blocked_readers(&mut self, handle: &PipeHandle) {
        loop {
            let pid = match handle.lock().blocked_readers.pop_front() {
                Some(pid) => pid,
                None => return,
            };
            let Some(wait) = self.parked_transfer(pid, handle, PipeOp::Read) else {
                continue;
            };
            let available = handle.lock().available();
            let result = if available > 0 {
                let n = ((wait.len - wait.done) as usize).min(available);
                let mut tmp = vec![0u8; n];
                handle.lock().pop(&mut tmp);
                let Kernel {
                    ref phys,
                    ref mut frames,
                    ref pm,
                    ..
                } = *self;
                let proc = pm.get(pid).unwrap();
                match proc
                    .space
                    .copy_to_user(phys, frames, wait.user_buf + wait.done, &tmp)
                {
                    Ok(()) => (wait.done + n as u32) as i32,
                    Err(_) => -1,
                }
            } else {
                0
            };
            if let Some(proc) = self.pm.get_mut(pid) {
                proc.frame.eax = result as u32;
            }
            self.make_ready(pid);
        }
    }

    /// Last reader went away: every blocked writer fails.
    fn fail_blocked_writers(&mut self, handle: &PipeHandle) {
        loop {
            let pid = match handle.lock().blocked_writers.pop_front() {
                Some(pid) => pid,
                None => return,
            };
            if self.parked_transfer(pid, handle, PipeOp::Write).is_none() {
                continue;
            }
            if let Some(proc) = self.pm.get_mut(pid) {
                proc.frame.eax = -1i32 as u32;
            }
            self.make_ready(pid);
        }
    }

    /// Pointer validation against the current process's address space.
    pub(crate) fn validate_current_span(&self, addr: u32, len: u32) -> bool {
        match self.pm.current() {
            Some(p) => p.space.user_range_mapped(&self.phys, addr, len),
            None => false,
        }
    }
}
