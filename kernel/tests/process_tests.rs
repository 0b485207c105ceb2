//! Process lifecycle scenarios: fork with copy-on-write, wait/reap,
//! sleep deadlines, fault termination, exec and brk.

mod common;

use common::*;
use ferrite_kernel::process::{ProcessState, EXIT_CODE_FAULTED};
use ferrite_kernel::syscall::Syscall;
use ferrite_kernel::trap::{PF_USER, PF_WRITE};

const STATUS_ADDR: u32 = 0x03FF_F000; // inside the mapped user stack
const SCRATCH_ADDR: u32 = 0x03FF_F100;

#[test]
fn fork_write_wait_round_trip() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"fork test");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");

    // Parent owns a data page reading "cow-check".
    poke(&mut t, APP_BASE, b"cow-check");
    let page = backing_frame(&t, parent, APP_BASE);
    assert_eq!(t.frames.refcount(page), 1);

    // fork: parent gets the child pid, the shared page is COW in both.
    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0);
    assert!(child > 0);
    let child = child as u32;
    assert_eq!(t.frames.refcount(page), 2);
    assert_eq!(backing_frame(&t, child, APP_BASE), page);

    // Run the child: it writes 'C' at offset 0 and exits 0.
    t.sched.need_resched = true;
    t.k.reschedule(&mut frame);
    assert_eq!(t.pm.current_pid(), Some(child));
    assert_eq!(frame.eax, 0, "fork returns zero in the child");

    user_write_fault(&mut t, &mut frame, APP_BASE);
    poke(&mut t, APP_BASE, b"C");
    assert_eq!(peek(&t, child, APP_BASE, 9), b"Cow-check");
    // Parent still sees the original bytes, and sharing is dissolved.
    assert_eq!(peek(&t, parent, APP_BASE, 9), b"cow-check");
    assert_eq!(t.frames.refcount(page), 1);
    let child_page = backing_frame(&t, child, APP_BASE);
    assert_ne!(child_page, page);
    assert_eq!(t.frames.refcount(child_page), 1);

    let r = sys(&mut t, &mut frame, Syscall::Exit as u32, 0, 0, 0);
    let _ = r; // frame now belongs to the parent

    // Parent resumes and waits; the zombie child is reaped.
    t.sched.need_resched = true;
    t.k.reschedule(&mut frame);
    assert_eq!(t.pm.current_pid(), Some(parent));
    let waited = sys(&mut t, &mut frame, Syscall::Wait as u32, child, STATUS_ADDR, 0);
    assert_eq!(waited as u32, child);
    assert_eq!(peek(&t, parent, STATUS_ADDR, 4), 0i32.to_le_bytes());
    assert!(t.pm.get(child).is_none(), "child reaped after wait");
}

#[test]
fn wait_blocks_until_child_exits() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");

    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;

    // Parent waits first; no zombie yet, so it parks and the child
    // takes the CPU.
    sys(&mut t, &mut frame, Syscall::Wait as u32, 0u32.wrapping_sub(1), STATUS_ADDR, 0);
    assert_eq!(t.pm.current_pid(), Some(child));
    assert!(matches!(
        t.pm.get(parent).unwrap().state,
        ProcessState::Blocked(_)
    ));

    // Child exits 7: the wait completes, parent becomes ready with the
    // child pid as its return value.
    sys(&mut t, &mut frame, Syscall::Exit as u32, 7, 0, 0);
    t.sched.need_resched = true;
    t.k.reschedule(&mut frame);
    assert_eq!(t.pm.current_pid(), Some(parent));
    assert_eq!(frame.eax, child);
    assert_eq!(peek(&t, parent, STATUS_ADDR, 4), 7i32.to_le_bytes());
    assert!(t.pm.get(child).is_none());
}

#[test]
fn wait_without_children_fails() {
    let mut t = boot(64);
    install_app(&mut t, "/bin/app", b"");
    let (_pid, mut frame) = run_app(&mut t, "/bin/app", b"");
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Wait as u32, 0u32.wrapping_sub(1), 0, 0),
        -1
    );
}

#[test]
fn sleep_resumes_no_earlier_than_deadline() {
    let mut t = boot(64);
    install_app(&mut t, "/bin/app", b"");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");

    let t0 = sys(&mut t, &mut frame, Syscall::GetTicks as u32, 0, 0, 0) as u32;
    // sleep_ms(100) at 100 Hz = 10 ticks.
    sys(&mut t, &mut frame, Syscall::SleepMs as u32, 100, 0, 0);
    assert!(t.pm.current_pid().is_none(), "sleeper left running");

    // Nine ticks: still blocked.
    run_ticks(&mut t, &mut frame, 9);
    assert!(matches!(
        t.pm.get(pid).unwrap().state,
        ProcessState::Blocked(_)
    ));

    // Tenth tick wakes and dispatches it; sleep returned 0.
    run_ticks(&mut t, &mut frame, 1);
    assert_eq!(t.pm.current_pid(), Some(pid));
    assert_eq!(frame.eax, 0);

    let t1 = sys(&mut t, &mut frame, Syscall::GetTicks as u32, 0, 0, 0) as u32;
    assert!(t1 - t0 >= 10, "woke after {} ticks", t1 - t0);
}

#[test]
fn user_fault_terminates_and_parent_observes() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");

    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;
    t.sched.need_resched = true;
    t.k.reschedule(&mut frame);
    assert_eq!(t.pm.current_pid(), Some(child));

    // Child dereferences null: user-mode fault, no COW to repair.
    frame.error_code = PF_USER; // not-present read in user mode
    t.k.page_fault(&mut frame, 0);
    assert!(t.pm.get(child).unwrap().state.is_zombie());

    t.sched.need_resched = true;
    t.k.reschedule(&mut frame);
    assert_eq!(t.pm.current_pid(), Some(parent));
    let waited = sys(&mut t, &mut frame, Syscall::Wait as u32, child, STATUS_ADDR, 0);
    assert_eq!(waited as u32, child);
    assert_eq!(
        peek(&t, parent, STATUS_ADDR, 4),
        EXIT_CODE_FAULTED.to_le_bytes()
    );
}

#[test]
fn cow_fault_on_shared_page_is_transparent() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    poke(&mut t, APP_BASE, b"shared");
    let _child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;

    // Parent writes its (now COW) page: repaired, not terminated.
    frame.error_code = PF_USER | PF_WRITE | ferrite_kernel::trap::PF_PRESENT;
    t.k.page_fault(&mut frame, APP_BASE + 2);
    assert_eq!(t.pm.current_pid(), Some(parent));
    assert!(!t.pm.get(parent).unwrap().state.is_zombie());
}

#[test]
fn spawn_rejects_image_below_user_floor() {
    let mut t = boot(64);
    let image = ferrite_kernel::elf::build_exec_image(0x1000, &[(0x0000_1000, &[0u8; 16], 16)]);
    t.k.fs.write_file("/bin/bad", "/", &image).unwrap();
    let before = t.pm.count();
    assert!(t.k.spawn("/bin/bad", b"").is_err());
    assert_eq!(t.pm.count(), before, "no child may be created");
}

#[test]
fn exec_replaces_image_but_keeps_pid() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"one");
    install_app(&mut t, "/bin/other", b"two");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");

    let path = poke_cstr(&mut t, SCRATCH_ADDR, "/bin/other");
    let r = sys(&mut t, &mut frame, Syscall::Exec as u32, path, 0, 0);
    let _ = r;
    assert_eq!(t.pm.current_pid(), Some(pid));
    assert_eq!(frame.eip, APP_BASE, "resumes at the new entry point");
    assert_eq!(t.pm.get(pid).unwrap().name, "other");
    // The new image's bytes are in place.
    assert_eq!(peek(&t, pid, APP_BASE, 3), b"two");
}

#[test]
fn exec_failure_leaves_caller_intact() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"one");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");
    let path = poke_cstr(&mut t, SCRATCH_ADDR, "/bin/missing");
    assert_eq!(sys(&mut t, &mut frame, Syscall::Exec as u32, path, 0, 0), -1);
    assert_eq!(t.pm.current_pid(), Some(pid));
    assert_eq!(peek(&t, pid, APP_BASE, 3), b"one");
}

#[test]
fn brk_grows_and_shrinks_the_heap() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (pid, mut frame) = run_app(&mut t, "/bin/app", b"");

    let base = sys(&mut t, &mut frame, Syscall::Brk as u32, 0, 0, 0) as u32;
    assert!(base >= APP_BASE + 0x1000);

    let grown = sys(&mut t, &mut frame, Syscall::Brk as u32, base + 0x3000, 0, 0) as u32;
    assert_eq!(grown, base + 0x3000);
    poke(&mut t, base + 0x2500, b"heap bytes");
    assert_eq!(peek(&t, pid, base + 0x2500, 10), b"heap bytes");

    let shrunk = sys(&mut t, &mut frame, Syscall::Brk as u32, base, 0, 0) as u32;
    assert_eq!(shrunk, base);
    let space = t.pm.get(pid).unwrap().space;
    assert!(!space.user_range_mapped(&t.phys, base + 0x2500, 4));

    // Out-of-range requests fail without moving the break.
    assert_eq!(sys(&mut t, &mut frame, Syscall::Brk as u32, 0x100, 0, 0), -1);
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Brk as u32, 0, 0, 0) as u32,
        base
    );
}

#[test]
fn kill_zombifies_target_and_wakes_waiting_parent() {
    let mut t = boot(128);
    install_app(&mut t, "/bin/app", b"");
    let (parent, mut frame) = run_app(&mut t, "/bin/app", b"");
    let child = sys(&mut t, &mut frame, Syscall::Fork as u32, 0, 0, 0) as u32;

    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Kill as u32, child, 42, 0),
        0
    );
    // The child never ran again; a wait sees the supplied code.
    let waited = sys(&mut t, &mut frame, Syscall::Wait as u32, child, STATUS_ADDR, 0);
    assert_eq!(waited as u32, child);
    assert_eq!(peek(&t, parent, STATUS_ADDR, 4), 42i32.to_le_bytes());

    // Killing a nonexistent pid fails.
    assert_eq!(
        sys(&mut t, &mut frame, Syscall::Kill as u32, 9999, 0, 0),
        -1
    );
}

#[test]
fn getargs_round_trips_the_boot_blob() {
    let mut t = boot(64);
    install_app(&mut t, "/bin/app", b"");
    let (_pid, mut frame) = run_app(&mut t, "/bin/app", b"alpha beta");
    let n = sys(
        &mut t,
        &mut frame,
        Syscall::GetArgs as u32,
        SCRATCH_ADDR,
        64,
        0,
    );
    assert_eq!(n, 10);
    assert_eq!(
        peek(&t, t.pm.current_pid().unwrap(), SCRATCH_ADDR, 10),
        b"alpha beta"
    );
}
