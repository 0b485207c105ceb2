//! Inter-process communication
//!
//! The single primitive is the byte pipe: a bounded ring buffer with
//! reader/writer reference counts and FIFO queues of blocked peers.
//! The buffer itself is pure state ([`pipe::Pipe`]); the blocking and
//! wake orchestration lives on [`crate::Kernel`] because it moves
//! processes between scheduler states.

pub mod pipe;

pub use pipe::{Pipe, PipeHandle, PIPE_CAPACITY};
