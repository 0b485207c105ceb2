//! Process lifecycle
//!
//! fork, exit, wait, sleep, brk, kill and the zombie/reap bookkeeping.
//! Blocking operations return `None` after parking the caller — the
//! live trap frame then already belongs to the next process (or the
//! idle loop) and the syscall dispatcher must not touch it.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP};
use crate::process::{
    BlockReason, Fd, KernelStack, Pid, Process, ProcessState, WaitTarget, DEFAULT_PRIORITY,
    TIME_QUANTUM,
};
use crate::sched::TIMER_HZ;
use crate::trap::TrapFrame;

impl Kernel {
    /// Bare process object in Ready state with an empty user half.
    /// Callers populate the image (spawn/exec) or clone one (fork).
    pub(crate) fn create_process(&mut self, name: &str, parent: Option<Pid>) -> KernelResult<Pid> {
        let Kernel {
            ref phys,
            ref mut frames,
            ref kernel_space,
            ref mut pm,
            ..
        } = *self;
        let space = AddressSpace::new(phys, frames, kernel_space)?;
        let pid = pm.alloc_pid();
        let cwd = pm
            .current()
            .map(|p| p.cwd.clone())
            .unwrap_or_else(|| pm.default_cwd.clone());
        let proc = Process {
            pid,
            name: String::from(name),
            space,
            kernel_stack: KernelStack::new(),
            entry: 0,
            user_stack_top: USER_STACK_TOP,
            heap_base: 0,
            heap_end: 0,
            cwd,
            args: Vec::new(),
            exit_code: 0,
            state: ProcessState::Ready,
            priority: DEFAULT_PRIORITY,
            time_slice: TIME_QUANTUM,
            total_ticks: 0,
            frame: TrapFrame::default(),
            fds: Process::default_fds(),
            parent,
            user_space_released: false,
        };
        pm.insert(proc);
        Ok(pid)
    }

    /// Fork the current process. The child shares every user page
    /// copy-on-write; its saved frame is the parent's with eax zeroed.
    /// Returns the child pid (the parent's return value).
    pub fn fork_current(&mut self, frame: &TrapFrame) -> KernelResult<Pid> {
        let parent_pid = self.pm.current_pid().ok_or(KernelError::InvalidArgument)?;

        let child_pid = {
            let name = self.pm.get(parent_pid).unwrap().name.clone();
            self.create_process(&name, Some(parent_pid))?
        };

        // Clone the user half COW. On failure the half-built child is
        // torn down and the error propagates to the caller as -1.
        let clone_result = {
            let Kernel {
                ref phys,
                ref mut frames,
                ref pm,
                ..
            } = *self;
            let parent = pm.get(parent_pid).unwrap();
            let child_space = pm.get(child_pid).unwrap().space;
            parent.space.clone_user_cow(phys, frames, &child_space)
        };
        if let Err(e) = clone_result {
            self.discard_stillborn(child_pid);
            return Err(e);
        }

        {
            let parent = self.pm.get(parent_pid).unwrap();
            let (entry, stack, heap_base, heap_end, priority, cwd, args, fds) = (
                parent.entry,
                parent.user_stack_top,
                parent.heap_base,
                parent.heap_end,
                parent.priority,
                parent.cwd.clone(),
                parent.args.clone(),
                parent.fds.clone(),
            );
            // New descriptor table references count as pipe sharers.
            for fd in fds.iter().flatten() {
                match fd {
                    Fd::PipeRead(p) => p.lock().retain_read(),
                    Fd::PipeWrite(p) => p.lock().retain_write(),
                    _ => {}
                }
            }
            let child = self.pm.get_mut(child_pid).unwrap();
            child.entry = entry;
            child.user_stack_top = stack;
            child.heap_base = heap_base;
            child.heap_end = heap_end;
            child.priority = priority;
            child.cwd = cwd;
            child.args = args;
            child.fds = fds;
            child.frame = *frame;
            child.frame.eax = 0;
        }

        let child_priority = self.pm.get(child_pid).unwrap().priority;
        self.sched.enqueue(child_pid, child_priority);
        Ok(child_pid)
    }

    /// Tear down a process that never ran (failed fork/spawn).
    pub(crate) fn discard_stillborn(&mut self, pid: Pid) {
        if let Some(proc) = self.pm.remove(pid) {
            let Kernel {
                ref phys,
                ref mut frames,
                ..
            } = *self;
            proc.space.destroy(phys, frames);
        }
    }

    /// Exit the current process; does not return to the caller's frame.
    pub fn exit_current(&mut self, frame: &mut TrapFrame, code: i32) {
        let pid = self.pm.current_pid().expect("exit without a current process");
        self.zombify(pid, code);
        self.reschedule(frame);
    }

    /// Move a process to Zombie: close descriptors (waking pipe peers),
    /// release its user memory, record the exit code, and complete a
    /// parent wait if one is pending. The process object and directory
    /// survive until reaped.
    pub(crate) fn zombify(&mut self, pid: Pid, code: i32) {
        // Close descriptors first so pipe peers unblock.
        let fds = {
            let proc = match self.pm.get_mut(pid) {
                Some(p) => p,
                None => return,
            };
            core::mem::take(&mut proc.fds)
        };
        for fd in fds.into_iter().flatten() {
            self.release_fd(fd);
        }

        let parent = {
            let Kernel {
                ref phys,
                ref mut frames,
                ref mut pm,
                ..
            } = *self;
            let proc = pm.get_mut(pid).expect("zombify of unknown pid");
            if !proc.user_space_released {
                proc.space.clear_user(phys, frames);
                proc.user_space_released = true;
            }
            proc.state = ProcessState::Zombie;
            proc.exit_code = code;
            proc.parent
        };
        self.sched.remove(pid);
        self.sched.need_resched = true;
        log::debug!("process {} exited with code {}", pid, code);

        if let Some(parent_pid) = parent {
            self.complete_pending_wait(parent_pid, pid);
        }
    }

    /// If `parent` is blocked waiting for `child`, finish the wait:
    /// write the status, reap the child, and make the parent ready with
    /// the child pid as its return value.
    fn complete_pending_wait(&mut self, parent: Pid, child: Pid) {
        let matches = match self.pm.get(parent) {
            Some(p) => match &p.state {
                ProcessState::Blocked(BlockReason::Wait { target, .. }) => target.matches(child),
                _ => false,
            },
            None => return,
        };
        if !matches {
            return;
        }

        let status_ptr = match &self.pm.get(parent).unwrap().state {
            ProcessState::Blocked(BlockReason::Wait { status_ptr, .. }) => *status_ptr,
            _ => unreachable!(),
        };
        let code = self.pm.get(child).unwrap().exit_code;
        if status_ptr != 0 {
            let Kernel {
                ref phys,
                ref mut frames,
                ref pm,
                ..
            } = *self;
            let par = pm.get(parent).unwrap();
            // Validated when the wait was issued; pages are re-checked
            // by the copy itself.
            let _ = par.space.copy_to_user(phys, frames, status_ptr, &code.to_le_bytes());
        }
        self.reap(child);
        if let Some(par) = self.pm.get_mut(parent) {
            par.frame.eax = child;
        }
        self.make_ready(parent);
    }

    /// Reap a zombie whose parent is gone (init-style cleanup; nothing
    /// will ever wait for it). Returns false for live processes or
    /// zombies that still have a waiting-capable parent.
    pub fn reap_orphan(&mut self, pid: Pid) -> bool {
        let orphaned = match self.pm.get(pid) {
            Some(p) if p.state.is_zombie() => match p.parent {
                Some(parent) => self.pm.get(parent).is_none(),
                None => true,
            },
            _ => false,
        };
        if orphaned {
            self.reap(pid);
        }
        orphaned
    }

    /// Destroy a zombie: directory, kernel stack, process object.
    pub(crate) fn reap(&mut self, pid: Pid) {
        let proc = self.pm.remove(pid).expect("reap of unknown pid");
        debug_assert!(proc.state.is_zombie(), "reaping a live process");
        let Kernel {
            ref phys,
            ref mut frames,
            ..
        } = *self;
        proc.space.destroy(phys, frames);
    }

    /// wait(pid, status): reap a matching zombie child now, or park
    /// until one exits. `pid <= 0` waits for any child.
    pub fn wait_current(
        &mut self,
        frame: &mut TrapFrame,
        pid_arg: i32,
        status_ptr: u32,
    ) -> Option<i32> {
        let cur = self.pm.current_pid()?;
        let target = if pid_arg <= 0 {
            WaitTarget::Any
        } else {
            WaitTarget::Pid(pid_arg as Pid)
        };

        if status_ptr != 0 {
            let proc = self.pm.current().unwrap();
            if !proc.space.user_range_mapped(&self.phys, status_ptr, 4) {
                return Some(-1);
            }
        }
        if !self.pm.has_child(cur, target) {
            return Some(-1);
        }

        if let Some(zombie) = self.pm.find_zombie_child(cur, target) {
            let code = self.pm.get(zombie).unwrap().exit_code;
            if status_ptr != 0 {
                let Kernel {
                    ref phys,
                    ref mut frames,
                    ref pm,
                    ..
                } = *self;
                let proc = pm.current().unwrap();
                if proc
                    .space
                    .copy_to_user(phys, frames, status_ptr, &code.to_le_bytes())
                    .is_err()
                {
                    return Some(-1);
                }
            }
            self.reap(zombie);
            return Some(zombie as i32);
        }

        self.block_current(frame, BlockReason::Wait { target, status_ptr });
        None
    }

    /// sleep_ms: park until the tick deadline; the tick sweep wakes us
    /// with a zero return value.
    pub fn sleep_current(&mut self, frame: &mut TrapFrame, ms: u32) -> Option<i32> {
        if ms == 0 {
            return Some(0);
        }
        let ticks = ((ms as u64) * TIMER_HZ as u64).div_ceil(1000).max(1);
        let wake_tick = self.sched.ticks + ticks;
        self.block_current(frame, BlockReason::Sleep { wake_tick });
        None
    }

    /// brk: query (0) or move the heap break, mapping and unmapping
    /// user pages as the break crosses page boundaries.
    pub fn brk_current(&mut self, new_end: u32) -> i32 {
        let Kernel {
            ref phys,
            ref mut frames,
            ref mut pm,
            ..
        } = *self;
        let proc = match pm.current_mut() {
            Some(p) => p,
            None => return -1,
        };
        if new_end == 0 {
            return proc.heap_end as i32;
        }
        let ceiling = USER_STACK_TOP - USER_STACK_SIZE;
        if new_end < proc.heap_base || new_end > ceiling {
            return -1;
        }

        let page = PAGE_SIZE as u32;
        let mapped_end = proc.heap_end.div_ceil(page) * page;
        let wanted_end = new_end.div_ceil(page) * page;

        if wanted_end > mapped_end {
            let mut virt = mapped_end.max(proc.heap_base & !(page - 1));
            // First heap page starts at the (page-aligned) heap base.
            if proc.heap_end == proc.heap_base {
                virt = proc.heap_base & !(page - 1);
            }
            let mut added = Vec::new();
            while virt < wanted_end {
                if proc.space.translate(phys, VirtAddr::new(virt)).is_none() {
                    match proc.space.map_alloc(
                        phys,
                        frames,
                        VirtAddr::new(virt),
                        PageFlags::WRITABLE | PageFlags::USER,
                    ) {
                        Ok(_) => added.push(virt),
                        Err(_) => {
                            for v in added {
                                let _ = proc.space.unmap(phys, frames, VirtAddr::new(v), true);
                            }
                            return -1;
                        }
                    }
                }
                virt += page;
            }
        } else if wanted_end < mapped_end {
            let mut virt = wanted_end;
            while virt < mapped_end {
                let _ = proc.space.unmap(phys, frames, VirtAddr::new(virt), true);
                virt += page;
            }
        }

        proc.heap_end = new_end;
        new_end as i32
    }

    /// kill(pid, code): the current process goes through the exit path;
    /// any other live process is zombified in place, which is
    /// observably the same as it exiting at its next schedule point.
    pub fn kill_process(&mut self, frame: &mut TrapFrame, pid: Pid, code: i32) -> Option<i32> {
        if self.pm.current_pid() == Some(pid) {
            self.exit_current(frame, code);
            return None;
        }
        match self.pm.get(pid) {
            Some(p) if !p.state.is_zombie() => {
                self.zombify(pid, code);
                Some(0)
            }
            _ => Some(-1),
        }
    }

    /// Copy the boot-argument blob into a user buffer; returns bytes
    /// copied.
    pub fn getargs_current(&mut self, user_buf: u32, max_len: u32) -> i32 {
        let Kernel {
            ref phys,
            ref mut frames,
            ref pm,
            ..
        } = *self;
        let proc = match pm.current() {
            Some(p) => p,
            None => return -1,
        };
        let n = (proc.args.len() as u32).min(max_len);
        if n == 0 {
            return 0;
        }
        let bytes = proc.args[..n as usize].to_vec();
        match proc.space.copy_to_user(phys, frames, user_buf, &bytes) {
            Ok(()) => n as i32,
            Err(_) => -1,
        }
    }
}
