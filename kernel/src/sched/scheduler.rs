//! Dispatch, tick accounting and blocking
//!
//! The scheduler mutates the live trap frame in place: parking a
//! process copies the frame into its PCB, dispatching copies the next
//! PCB's frame over it, and the common stub's return path IRETs into
//! whatever the frame now describes — a ring-3 process (with the
//! trampoline staging its CR3) or the ring-0 idle loop. All of this
//! runs with interrupts disabled inside a trap handler.

use alloc::vec::Vec;

use crate::arch;
use crate::kernel::Kernel;
use crate::process::{BlockReason, Pid, ProcessState, TIME_QUANTUM};
use crate::trap::frame::{EFLAGS_IF, EFLAGS_RESERVED};
use crate::trap::TrapFrame;

/// The frame that resumes the ring-0 idle loop. Stateless: it is
/// re-crafted every time the ready queues drain.
fn idle_frame() -> TrapFrame {
    use crate::arch::{KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
    TrapFrame {
        gs: KERNEL_DATA_SELECTOR,
        fs: KERNEL_DATA_SELECTOR,
        es: KERNEL_DATA_SELECTOR,
        ds: KERNEL_DATA_SELECTOR,
        eip: arch::idle_entry_addr(),
        cs: KERNEL_CODE_SELECTOR,
        eflags: EFLAGS_IF | EFLAGS_RESERVED,
        ..TrapFrame::default()
    }
}

impl Kernel {
    /// Per-tick sweep: advance the clock, wake due sleepers, charge the
    /// running process's slice, and reschedule when the slice is gone
    /// or something more urgent became ready.
    pub fn timer_tick(&mut self, frame: &mut TrapFrame) {
        self.sched.ticks += 1;
        let now = self.sched.ticks;

        let mut woken: Vec<(Pid, u8)> = Vec::new();
        for proc in self.pm.iter_mut() {
            if let ProcessState::Blocked(BlockReason::Sleep { wake_tick }) = proc.state {
                if now >= wake_tick {
                    proc.state = ProcessState::Ready;
                    proc.frame.eax = 0; // sleep_ms returns 0
                    woken.push((proc.pid, proc.priority));
                }
            }
        }
        for (pid, priority) in woken {
            self.sched.enqueue(pid, priority);
        }

        match self.pm.current_mut() {
            Some(cur) => {
                cur.total_ticks += 1;
                if cur.time_slice > 0 {
                    cur.time_slice -= 1;
                }
                if cur.time_slice == 0 {
                    self.sched.need_resched = true;
                }
                let cur_priority = cur.priority;
                if let Some(best) = self.sched.best_ready_priority() {
                    if best < cur_priority {
                        self.sched.need_resched = true;
                    }
                }
            }
            None => {
                if self.sched.has_ready() {
                    self.sched.need_resched = true;
                }
            }
        }

        if self.sched.need_resched {
            self.reschedule(frame);
        }
    }

    /// Park the current process with the given reason and hand the CPU
    /// to the next ready process (or the idle loop). The caller has
    /// already recorded everything the wake path needs.
    pub fn block_current(&mut self, frame: &mut TrapFrame, reason: BlockReason) {
        let cur = self.pm.current_mut().expect("block_current without a current process");
        cur.frame = *frame;
        cur.state = ProcessState::Blocked(reason);
        self.reschedule(frame);
    }

    /// Return a blocked process to the ready queue.
    pub fn make_ready(&mut self, pid: Pid) {
        if let Some(proc) = self.pm.get_mut(pid) {
            debug_assert!(
                !proc.state.is_running(),
                "make_ready on the running process"
            );
            proc.state = ProcessState::Ready;
            let priority = proc.priority;
            self.sched.enqueue(pid, priority);
        }
    }

    /// Pick and install the next process. Consumes the reschedule flag.
    pub fn reschedule(&mut self, frame: &mut TrapFrame) {
        self.sched.need_resched = false;

        if let Some(cur) = self.pm.current_mut() {
            if cur.state.is_running() {
                if self.sched.has_ready() {
                    // Rotate: back of its own priority queue.
                    cur.frame = *frame;
                    cur.state = ProcessState::Ready;
                    let (pid, priority) = (cur.pid, cur.priority);
                    self.pm.set_current(None);
                    self.sched.enqueue(pid, priority);
                } else {
                    // Alone in the system: keep running, fresh slice.
                    cur.time_slice = TIME_QUANTUM;
                    return;
                }
            } else {
                // Blocked or zombie; its frame was saved (or is moot).
                self.pm.set_current(None);
            }
        }

        self.dispatch_next(frame);
    }

    fn dispatch_next(&mut self, frame: &mut TrapFrame) {
        loop {
            match self.sched.pop_highest() {
                Some(pid) => {
                    let Some(proc) = self.pm.get_mut(pid) else {
                        // Reaped while queued; skip.
                        continue;
                    };
                    if proc.state.is_zombie() {
                        continue;
                    }
                    proc.state = ProcessState::Running;
                    proc.time_slice = TIME_QUANTUM;
                    *frame = proc.frame;
                    let esp0 = proc.kernel_stack.top();
                    self.pm.set_current(Some(pid));
                    arch::set_kernel_stack(esp0);
                    // trap::prepare_return stages this process's CR3 on
                    // the way out.
                    return;
                }
                None => {
                    self.pm.set_current(None);
                    *frame = idle_frame();
                    arch::clear_user_return();
                    return;
                }
            }
        }
    }
}
