//! Shared harness for the integration tests
//!
//! Boots a [`Kernel`] over a heap-backed physical arena, installs
//! executables built with the in-crate ELF writer, and drives the
//! scheduler and syscall dispatcher exactly the way the trap layer
//! does on hardware: by mutating a live trap frame.

#![allow(dead_code)]

use ferrite_kernel::elf::build_exec_image;
use ferrite_kernel::mm::{PhysAddr, PhysWindow, VirtAddr, FRAME_POOL_START, PAGE_SIZE};
use ferrite_kernel::process::Pid;
use ferrite_kernel::syscall;
use ferrite_kernel::trap::TrapFrame;
use ferrite_kernel::Kernel;

/// Entry/data page of the test executable.
pub const APP_BASE: u32 = 0x0200_0000;

/// One page's worth of bytes, aligned like a real physical frame.
///
/// `Vec<u8>` is only guaranteed byte alignment, but the page-table code
/// dereferences arena pointers as `repr(align(4096))` structs, so the
/// arena backing the test `PhysWindow` must start on a page boundary.
#[repr(align(4096))]
#[derive(Clone, Copy)]
struct AlignedPage([u8; PAGE_SIZE]);

fn aligned_arena(frames: usize) -> Vec<AlignedPage> {
    vec![AlignedPage([0u8; PAGE_SIZE]); frames]
}

pub struct TestKernel {
    pub k: Box<Kernel>,
    // Backs the physical window; must stay alive (and unmoved) as long
    // as the kernel does.
    _arena: Vec<AlignedPage>,
}

impl core::ops::Deref for TestKernel {
    type Target = Kernel;

    fn deref(&self) -> &Kernel {
        &self.k
    }
}

impl core::ops::DerefMut for TestKernel {
    fn deref_mut(&mut self) -> &mut Kernel {
        &mut self.k
    }
}

/// Boot a kernel over `frames` physical frames.
pub fn boot(frames: usize) -> TestKernel {
    let mut arena = aligned_arena(frames);
    let win = PhysWindow::for_arena(arena.as_mut_ptr() as *mut u8, PhysAddr::new(FRAME_POOL_START));
    let mut k = Kernel::new(win, PhysAddr::new(FRAME_POOL_START), frames, 0x0800_0000)
        .expect("test kernel boot failed");
    k.fs.seed();
    TestKernel { k, _arena: arena }
}

/// Install a one-page test executable at `path` whose image starts
/// with `payload` at [`APP_BASE`].
pub fn install_app(k: &mut Kernel, path: &str, payload: &[u8]) {
    let image = build_exec_image(APP_BASE, &[(APP_BASE, payload, 0x1000)]);
    k.fs.write_file(path, "/", &image).expect("install test app");
}

/// Spawn an installed app and dispatch it so it becomes the running
/// process; returns its pid and the live frame.
pub fn run_app(k: &mut Kernel, path: &str, args: &[u8]) -> (Pid, TrapFrame) {
    let pid = k.spawn(path, args).expect("spawn test app");
    let mut frame = TrapFrame::default();
    k.sched.need_resched = true;
    k.reschedule(&mut frame);
    assert_eq!(k.pm.current_pid(), Some(pid), "spawned app not dispatched");
    (pid, frame)
}

/// Issue a syscall on behalf of the current process, exactly as the
/// dispatcher sees it. Returns EAX after dispatch (which is the next
/// context's EAX when the call parked the caller).
pub fn sys(k: &mut Kernel, frame: &mut TrapFrame, n: u32, a: u32, b: u32, c: u32) -> i32 {
    frame.eax = n;
    frame.ebx = a;
    frame.ecx = b;
    frame.edx = c;
    syscall::dispatch(k, frame);
    frame.eax as i32
}

/// Write bytes into the current process's memory (through the
/// sanctioned copy path, so COW pages materialize like a user store).
pub fn poke(k: &mut Kernel, addr: u32, bytes: &[u8]) {
    let space = k.pm.current().expect("poke without current").space;
    let Kernel {
        ref phys,
        ref mut frames,
        ..
    } = *k;
    space
        .copy_to_user(phys, frames, addr, bytes)
        .expect("poke failed");
}

/// Read bytes from a process's memory.
pub fn peek(k: &Kernel, pid: Pid, addr: u32, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let space = k.pm.get(pid).expect("peek of unknown pid").space;
    space
        .copy_from_user(&k.phys, &mut buf, addr)
        .expect("peek failed");
    buf
}

/// Place a NUL-terminated string in the current process's memory and
/// return its address.
pub fn poke_cstr(k: &mut Kernel, addr: u32, s: &str) -> u32 {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    poke(k, addr, &bytes);
    addr
}

/// Physical frame backing a page of a process.
pub fn backing_frame(k: &Kernel, pid: Pid, addr: u32) -> PhysAddr {
    let space = k.pm.get(pid).unwrap().space;
    space
        .translate(&k.phys, VirtAddr::new(addr))
        .expect("page not mapped")
        .align_down()
}

/// Simulate a ring-3 write fault at `addr` (what the MMU raises when
/// user code stores to a COW page).
pub fn user_write_fault(k: &mut Kernel, frame: &mut TrapFrame, addr: u32) {
    use ferrite_kernel::trap::{PF_PRESENT, PF_USER, PF_WRITE};
    frame.error_code = PF_PRESENT | PF_WRITE | PF_USER;
    k.page_fault(frame, addr);
}

/// Advance the clock by `n` timer ticks.
pub fn run_ticks(k: &mut Kernel, frame: &mut TrapFrame, n: u64) {
    for _ in 0..n {
        k.timer_tick(frame);
    }
}
