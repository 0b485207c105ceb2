//! Pipe semantics end to end: FIFO ordering, EOF on writer loss,
//! failure on reader loss, and blocking with resumed transfers.
//!
//! Writes go through the write syscall with the pipe's write end
//! dup2'd over descriptor 1, which is how user programs feed pipes.

mod common;

use common::*;
use ferrite_kernel::process::ProcessState;
use ferrite_kernel::syscall::Syscall;

const FDS_ADDR: u32 = 0x03FF_F000;
const MSG_ADDR: u32 = 0x03FF_F010;
const BUF_ADDR: u32 = 0x03FF_F400;

fn fd_pair(t: &common::TestKernel, pid: u32) -> (u32, u32) {
    let bytes = peek(t, pid, FDS_ADDR, 8);
    (
        u32::from_le_bytes(bytes[..4].try_into().unwrap()),
        u32::from_le_bytes(bytes[4..].try_into().unwrap()),
    )
}

/// pipe() + dup2(write end, 1): the usual producer setup.
fn make_pipe_on_stdout(
    t: &mut common::TestKernel,
    frame: &mut ferrite_kernel::trap::TrapFrame,
) -> (u32, u32) {
    assert_eq!(sys(t, frame, Syscall::Pipe as u32, FDS_ADDR, 0, 0), 0);
    let pid = t.pm.current_pid().unwrap();
    let (rfd, wfd) = fd_pair(t, pid);
    assert_eq!(sys(t, frame, Syscall::Dup2 as u32, wfd, 1, 0), 1);
    assert_eq!(sys(t, frame, Syscall::Close as u32, wfd, 0, 0), 0);
    (rfd, 1)
}

#[test]
fn pipe_round_trip_with_fork_and_eof() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");

    let (rfd, wfd) = make_pipe_on_stdout(&mut t, &mut frame);
    poke(&mut t, MSG_ADDR, b"hello\n");

    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;

    // Parent drops its write end and blocks reading the empty pipe;
    // the child still holds a writer, so this parks rather than EOFs.
    assert_eq!(sys(&mut t, &mut frame, Syscall::Close as u32, wfd, 0, 0), 0);
    sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR, 64);
    assert_eq!(t.pm.current_pid(), Some(child), "reader parked, child runs");
    assert!(matches!(
        t.pm.get(parent).unwrap().state,
        ProcessState::Blocked(_)
    ));

    // Child writes six bytes: the parked read resumes with exactly the
    // prefix the writer produced.
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Write as u32, MSG_ADDR, 6, 0),
        6
    );
    assert!(matches!(
        t.pm.get(parent).unwrap().state,
        ProcessState::Ready
    ));
    assert_eq!(t.pm.get(parent).unwrap().frame.eax, 6);
    assert_eq!(peek(&t, parent, BUF_ADDR, 6), b"hello\n");

    // Child closes its write end and exits; the parent's next read is
    // a clean EOF.
    assert_eq!(sys(&mut t, &mut frame, Syscall::Close as u32, wfd, 0, 0), 0);
    sys(&mut t, &mut frame, Syscall::Exit as u32, 0, 0, 0);
    assert_eq!(t.pm.current_pid(), Some(parent));
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR, 64),
        0,
        "drained pipe with no writers reads EOF"
    );
}

#[test]
fn pipe_fifo_order_is_preserved() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    let (rfd, wfd) = make_pipe_on_stdout(&mut t, &mut frame);

    poke(&mut t, MSG_ADDR, b"abcdefgh");
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Write as u32, MSG_ADDR, 4, 0),
        4
    );
    let _ = wfd;
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Write as u32, MSG_ADDR + 4, 4, 0),
        4
    );
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR, 3),
        3
    );
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR + 3, 64),
        5
    );
    assert_eq!(peek(&t, parent, BUF_ADDR, 8), b"abcdefgh");
}

#[test]
fn write_to_full_pipe_blocks_until_drained() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    let (rfd, _wfd) = make_pipe_on_stdout(&mut t, &mut frame);
    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;
    // The child inherited the read end; drop the parent's so the roles
    // are clean (parent writes, child reads).
    assert_eq!(sys(&mut t, &mut frame, Syscall::Close as u32, rfd, 0, 0), 0);

    // Parent fills the pipe to capacity; the write that finds it full
    // parks the parent and the child takes over.
    poke(&mut t, MSG_ADDR, &[0xAAu8; 16]);
    let mut total = 0u32;
    while t.pm.current_pid() == Some(parent) {
        let n = sys(&mut t, &mut frame, Syscall::Write as u32, MSG_ADDR, 16, 0);
        if t.pm.current_pid() == Some(parent) {
            assert_eq!(n, 16);
            total += 16;
            assert!(total <= 512, "wrote past pipe capacity");
        }
    }
    assert_eq!(total, 512, "pipe capacity");
    assert_eq!(t.pm.current_pid(), Some(child));
    assert!(matches!(
        t.pm.get(parent).unwrap().state,
        ProcessState::Blocked(_)
    ));

    // Child drains a chunk: the parked 16-byte write completes.
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR, 32),
        32
    );
    assert!(matches!(
        t.pm.get(parent).unwrap().state,
        ProcessState::Ready
    ));
    assert_eq!(t.pm.get(parent).unwrap().frame.eax, 16);
}

#[test]
fn write_with_no_readers_fails() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (_parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    let (rfd, _wfd) = make_pipe_on_stdout(&mut t, &mut frame);
    assert_eq!(sys(&mut t, &mut frame, Syscall::Close as u32, rfd, 0, 0), 0);
    poke(&mut t, MSG_ADDR, b"x");
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Write as u32, MSG_ADDR, 1, 0),
        -1
    );
}

#[test]
fn reader_blocked_on_empty_pipe_eofs_when_writers_vanish() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    let (rfd, wfd) = make_pipe_on_stdout(&mut t, &mut frame);
    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;

    assert_eq!(sys(&mut t, &mut frame, Syscall::Close as u32, wfd, 0, 0), 0);
    sys(&mut t, &mut frame, Syscall::Read as u32, rfd, BUF_ADDR, 16);
    assert_eq!(t.pm.current_pid(), Some(child));

    // The child exits without writing; closing the last write end
    // resolves the parked read as EOF.
    sys(&mut t, &mut frame, Syscall::Exit as u32, 0, 0, 0);
    assert_eq!(t.pm.current_pid(), Some(parent));
    assert_eq!(frame.eax, 0, "blocked read returned EOF");
}
