//! Scheduler
//!
//! Priority-aware round robin over three FIFO ready queues, driven by
//! the timer tick. The queues hold pids only; blocked processes are
//! *not* threaded through them — the blocked set is the process table
//! itself, indexed by each process's [`crate::process::BlockReason`].

pub mod scheduler;

use alloc::collections::VecDeque;

use crate::process::{Pid, PRIORITY_LEVELS};

/// Timer frequency the PIT is programmed to.
pub const TIMER_HZ: u32 = 100;

/// The ready queues plus the tick counter and reschedule flag. All
/// mutation happens with interrupts disabled.
pub struct Scheduler {
    ready: [VecDeque<Pid>; PRIORITY_LEVELS],
    pub need_resched: bool,
    /// Global tick count since boot.
    pub ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            ready: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            need_resched: false,
            ticks: 0,
        }
    }

    /// Append to the tail of the priority's FIFO.
    pub fn enqueue(&mut self, pid: Pid, priority: u8) {
        let queue = &mut self.ready[(priority as usize).min(PRIORITY_LEVELS - 1)];
        debug_assert!(!queue.contains(&pid), "pid {} queued twice", pid);
        queue.push_back(pid);
    }

    /// Take the next pid, highest priority (lowest number) first.
    pub fn pop_highest(&mut self) -> Option<Pid> {
        self.ready.iter_mut().find_map(|q| q.pop_front())
    }

    /// Best ready priority, if anything is ready.
    pub fn best_ready_priority(&self) -> Option<u8> {
        self.ready
            .iter()
            .position(|q| !q.is_empty())
            .map(|p| p as u8)
    }

    pub fn has_ready(&self) -> bool {
        self.ready.iter().any(|q| !q.is_empty())
    }

    pub fn ready_count(&self) -> usize {
        self.ready.iter().map(|q| q.len()).sum()
    }

    /// Drop a pid from whichever queue holds it (kill path).
    pub fn remove(&mut self, pid: Pid) {
        for q in &mut self.ready {
            q.retain(|&p| p != pid);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
