//! Bounded byte pipe
//!
//! Fixed-capacity circular buffer shared by one or more reader and
//! writer file descriptors. The counts track descriptor references,
//! not blocked processes: a read blocks only while writers remain, a
//! write fails once the last reader is gone. Blocked pids queue here
//! in FIFO order; the transfer state of each waiter lives on its
//! process object.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::Mutex;

use crate::process::Pid;

/// Fixed pipe capacity in bytes.
pub const PIPE_CAPACITY: usize = 512;

/// Shared handle; descriptor tables clone this.
pub type PipeHandle = Arc<Mutex<Pipe>>;

/// The pipe state proper.
pub struct Pipe {
    buf: [u8; PIPE_CAPACITY],
    head: usize,
    len: usize,
    readers: u32,
    writers: u32,
    pub blocked_readers: VecDeque<Pid>,
    pub blocked_writers: VecDeque<Pid>,
}

impl Pipe {
    /// A fresh pipe with one reader and one writer reference (the two
    /// descriptors the `pipe` syscall hands out).
    pub fn new() -> Self {
        Self {
            buf: [0; PIPE_CAPACITY],
            head: 0,
            len: 0,
            readers: 1,
            writers: 1,
            blocked_readers: VecDeque::new(),
            blocked_writers: VecDeque::new(),
        }
    }

    pub fn new_handle() -> PipeHandle {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn available(&self) -> usize {
        self.len
    }

    pub fn free_space(&self) -> usize {
        PIPE_CAPACITY - self.len
    }

    pub fn readers(&self) -> u32 {
        self.readers
    }

    pub fn writers(&self) -> u32 {
        self.writers
    }

    /// Append as many bytes as fit; returns how many were taken.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free_space());
        for &b in &data[..n] {
            let tail = (self.head + self.len) % PIPE_CAPACITY;
            self.buf[tail] = b;
            self.len += 1;
        }
        n
    }

    /// Drain up to `out.len()` bytes in FIFO order; returns the count.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        for slot in &mut out[..n] {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) % PIPE_CAPACITY;
            self.len -= 1;
        }
        n
    }

    pub fn retain_read(&mut self) {
        self.readers += 1;
    }

    pub fn retain_write(&mut self) {
        self.writers += 1;
    }

    /// Drop a reader reference; returns true when the last reader just
    /// went away (blocked writers must then be failed).
    pub fn release_read(&mut self) -> bool {
        debug_assert!(self.readers > 0, "pipe reader refcount underflow");
        self.readers -= 1;
        self.readers == 0
    }

    /// Drop a writer reference; returns true when the last writer just
    /// went away (blocked readers must then see EOF).
    pub fn release_write(&mut self) -> bool {
        debug_assert!(self.writers > 0, "pipe writer refcount underflow");
        self.writers -= 1;
        self.writers == 0
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn fifo_order_across_wraparound() {
        let mut p = Pipe::new();
        let mut seq = 0u8;
        let mut expect = 0u8;
        // Push/pop unevenly so head wraps several times.
        for _ in 0..40 {
            let chunk: vec::Vec<u8> = (0..300).map(|_| {
                let b = seq;
                seq = seq.wrapping_add(1);
                b
            }).collect();
            let taken = p.push(&chunk);
            assert!(taken > 0);
            // Bytes beyond `taken` were not accepted; rewind seq.
            seq = seq.wrapping_sub((chunk.len() - taken) as u8);
            let mut out = vec![0u8; 257];
            let got = p.pop(&mut out);
            for &b in &out[..got] {
                assert_eq!(b, expect);
                expect = expect.wrapping_add(1);
            }
        }
    }

    #[test]
    fn push_respects_capacity() {
        let mut p = Pipe::new();
        let big = vec![7u8; PIPE_CAPACITY + 100];
        assert_eq!(p.push(&big), PIPE_CAPACITY);
        assert_eq!(p.free_space(), 0);
        assert_eq!(p.push(&big), 0);
        let mut out = vec![0u8; PIPE_CAPACITY];
        assert_eq!(p.pop(&mut out), PIPE_CAPACITY);
        assert!(out.iter().all(|&b| b == 7));
        assert_eq!(p.pop(&mut out), 0);
    }

    #[test]
    fn refcounts_report_last_release() {
        let mut p = Pipe::new();
        p.retain_write();
        assert!(!p.release_write());
        assert!(p.release_write());
        assert!(p.release_read());
    }
}
