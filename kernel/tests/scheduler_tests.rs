//! Scheduler behavior: round-robin fairness, priority preemption,
//! quantum accounting and idle.

mod common;

use common::*;
use ferrite_kernel::process::{ProcessState, TIME_QUANTUM};
use ferrite_kernel::syscall::Syscall;

#[test]
fn equal_priority_processes_share_ticks_fairly() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (a, mut frame) = run_app(&mut t, "/bin/app", b"");
    let b = t.k.spawn("/bin/app", b"").unwrap();

    // 100 CPU-bound ticks: each side gets 50 ± one quantum.
    run_ticks(&mut t, &mut frame, 100);
    let ticks_a = t.pm.get(a).unwrap().total_ticks as i64;
    let ticks_b = t.pm.get(b).unwrap().total_ticks as i64;
    assert_eq!(ticks_a + ticks_b, 100);
    assert!(
        (ticks_a - ticks_b).unsigned_abs() <= TIME_QUANTUM as u64,
        "unfair split: {} vs {}",
        ticks_a,
        ticks_b
    );
}

#[test]
fn quantum_exhaustion_rotates_the_queue() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (a, mut frame) = run_app(&mut t, "/bin/app", b"");
    let b = t.k.spawn("/bin/app", b"").unwrap();

    assert_eq!(t.pm.current_pid(), Some(a));
    run_ticks(&mut t, &mut frame, TIME_QUANTUM as u64 - 1);
    assert_eq!(t.pm.current_pid(), Some(a), "slice not yet exhausted");
    run_ticks(&mut t, &mut frame, 1);
    assert_eq!(t.pm.current_pid(), Some(b), "rotation on slice end");
    run_ticks(&mut t, &mut frame, TIME_QUANTUM as u64);
    assert_eq!(t.pm.current_pid(), Some(a));
}

#[test]
fn higher_priority_preempts_on_next_tick() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (low, mut frame) = run_app(&mut t, "/bin/app", b"");
    let high = t.k.spawn("/bin/app", b"").unwrap();
    // Make the spawned process urgent while it still sits in the
    // ready queue (priority 0 beats the default 1).
    t.k.sched.remove(high);
    t.k.pm.get_mut(high).unwrap().priority = 0;
    t.k.sched.enqueue(high, 0);

    run_ticks(&mut t, &mut frame, 1);
    assert_eq!(
        t.pm.current_pid(),
        Some(high),
        "priority 0 preempts priority 1 at the tick boundary"
    );
    // The urgent process keeps the CPU as long as it stays runnable.
    run_ticks(&mut t, &mut frame, 20);
    assert_eq!(t.pm.current_pid(), Some(high));
    assert_eq!(t.pm.get(low).unwrap().total_ticks, 1);
}

#[test]
fn last_runnable_process_keeps_running_with_fresh_slices() {
    let mut t = boot(64);
    install_app(&mut t, "/bin/app", b"");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");
    run_ticks(&mut t, &mut frame, 3 * TIME_QUANTUM as u64);
    assert_eq!(t.pm.current_pid(), Some(pid));
    assert_eq!(t.pm.get(pid).unwrap().total_ticks, 3 * TIME_QUANTUM as u64);
}

#[test]
fn idle_when_everything_blocks_then_wakes() {
    let mut t = boot(64);
    install_app(&mut t, "/bin/app", b"");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");

    sys(&mut t, &mut frame, Syscall::SleepMs as u32, 50, 0, 0); // 5 ticks
    assert_eq!(t.pm.current_pid(), None, "nothing runnable: idle");
    assert!(!frame.from_user(), "idle frame resumes ring 0");

    run_ticks(&mut t, &mut frame, 5);
    assert_eq!(t.pm.current_pid(), Some(pid));
    assert!(frame.from_user(), "process frame resumes ring 3");
}

#[test]
fn blocked_processes_never_sit_in_ready_queues() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");
    let other = t.k.spawn("/bin/app", b"").unwrap();

    sys(&mut t, &mut frame, Syscall::SleepMs as u32, 1000, 0, 0);
    assert_eq!(t.pm.current_pid(), Some(other));
    assert!(matches!(
        t.pm.get(pid).unwrap().state,
        ProcessState::Blocked(_)
    ));
    // Only the running process exists outside the blocked set; the
    // ready queues are empty.
    assert_eq!(t.sched.ready_count(), 0);
}
