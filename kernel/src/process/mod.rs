//! Process model
//!
//! A process is the unit of scheduling and isolation: an address space
//! (kernel half shared, user half private), a kernel stack, the saved
//! trap frame, a fixed-size descriptor table and the wait/sleep/pipe
//! records the scheduler acts on. Exactly one process is `Running` at
//! any time; a `Zombie` keeps its pid and exit code until the parent
//! reaps it through wait.
//!
//! Lifecycle operations (spawn, exec, fork, exit, wait, sleep, brk,
//! kill) are methods on [`crate::Kernel`] in [`lifecycle`]; this module
//! holds the data model and the process table.

pub mod lifecycle;
pub mod loader;
pub mod pipeio;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::ipc::PipeHandle;
use crate::mm::AddressSpace;
use crate::trap::TrapFrame;

/// Process identifier; monotonically assigned, never zero.
pub type Pid = u32;

pub const MAX_FDS: usize = 16;
pub const NAME_MAX: usize = 32;
pub const ARGS_MAX: usize = 128;
pub const CWD_MAX: usize = 128;
pub const KERNEL_STACK_SIZE: usize = 4096;
pub const PRIORITY_LEVELS: usize = 3;
pub const DEFAULT_PRIORITY: u8 = 1;
/// Ticks per quantum.
pub const TIME_QUANTUM: u32 = 5;

/// Exit code recorded when a process dies on an unhandled fault.
pub const EXIT_CODE_FAULTED: i32 = 139;

/// Which child a blocked wait is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Any,
    Pid(Pid),
}

impl WaitTarget {
    pub fn matches(self, pid: Pid) -> bool {
        match self {
            WaitTarget::Any => true,
            WaitTarget::Pid(want) => want == pid,
        }
    }
}

/// Direction of a parked pipe transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeOp {
    Read,
    Write,
}

/// A parked pipe transfer: where the next byte goes (or comes from)
/// and how far it has progressed, so the wake path can resume the copy
/// without rebuilding the caller's context.
#[derive(Clone)]
pub struct PipeWait {
    pub pipe: PipeHandle,
    pub op: PipeOp,
    pub user_buf: u32,
    pub len: u32,
    pub done: u32,
}

impl core::fmt::Debug for PipeWait {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PipeWait")
            .field("op", &self.op)
            .field("user_buf", &self.user_buf)
            .field("len", &self.len)
            .field("done", &self.done)
            .finish()
    }
}

/// Why a blocked process is blocked.
#[derive(Debug, Clone)]
pub enum BlockReason {
    /// Waiting for a child to exit; `status_ptr` receives the code.
    Wait { target: WaitTarget, status_ptr: u32 },
    /// Asleep until the global tick counter reaches `wake_tick`.
    Sleep { wake_tick: u64 },
    /// Parked on a pipe that could not make progress.
    Pipe(PipeWait),
}

/// Process lifecycle state.
#[derive(Debug, Clone)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked(BlockReason),
    Zombie,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }

    pub fn is_zombie(&self) -> bool {
        matches!(self, ProcessState::Zombie)
    }

    /// Numeric state for the proclist ABI.
    pub fn as_abi(&self) -> u8 {
        match self {
            ProcessState::Ready => 0,
            ProcessState::Running => 1,
            ProcessState::Blocked(_) => 2,
            ProcessState::Zombie => 3,
        }
    }
}

/// One open descriptor.
#[derive(Clone)]
pub enum Fd {
    /// Filesystem file with a byte offset.
    File { path: String, offset: u32 },
    PipeRead(PipeHandle),
    PipeWrite(PipeHandle),
    /// The console.
    Tty,
}

impl core::fmt::Debug for Fd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Fd::File { path, offset } => write!(f, "File({:?}@{})", path, offset),
            Fd::PipeRead(_) => write!(f, "PipeRead"),
            Fd::PipeWrite(_) => write!(f, "PipeWrite"),
            Fd::Tty => write!(f, "Tty"),
        }
    }
}

/// Per-process kernel stack; the TSS points at its top whenever the
/// process is current.
#[repr(C, align(16))]
pub struct KernelStack(pub [u8; KERNEL_STACK_SIZE]);

impl KernelStack {
    pub fn new() -> Box<Self> {
        // Stacks are page-scale; build them on the heap directly.
        let layout = core::alloc::Layout::new::<Self>();
        // SAFETY: an all-zero byte array is a valid KernelStack; the
        // allocation is owned by the returned Box.
        unsafe {
            let ptr = alloc::alloc::alloc_zeroed(layout) as *mut Self;
            assert!(!ptr.is_null(), "kernel stack allocation failed");
            Box::from_raw(ptr)
        }
    }

    pub fn top(&self) -> usize {
        self.0.as_ptr() as usize + KERNEL_STACK_SIZE
    }
}

/// The process object.
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub space: AddressSpace,
    pub kernel_stack: Box<KernelStack>,
    pub entry: u32,
    pub user_stack_top: u32,
    pub heap_base: u32,
    pub heap_end: u32,
    pub cwd: String,
    pub args: Vec<u8>,
    pub exit_code: i32,
    pub state: ProcessState,
    pub priority: u8,
    pub time_slice: u32,
    pub total_ticks: u64,
    pub frame: TrapFrame,
    pub fds: [Option<Fd>; MAX_FDS],
    pub parent: Option<Pid>,
    /// Set while the zombie transition already ran (kill during block),
    /// so the scheduler never dispatches it again.
    pub user_space_released: bool,
}

impl Process {
    /// Lowest free descriptor slot.
    pub fn alloc_fd(&self) -> Option<usize> {
        self.fds.iter().position(|fd| fd.is_none())
    }

    pub fn fd(&self, n: i32) -> Option<&Fd> {
        if !(0..MAX_FDS as i32).contains(&n) {
            return None;
        }
        self.fds[n as usize].as_ref()
    }

    /// Stdio-equivalent table: descriptors 0..3 point at the tty.
    pub fn default_fds() -> [Option<Fd>; MAX_FDS] {
        let mut fds: [Option<Fd>; MAX_FDS] = Default::default();
        fds[0] = Some(Fd::Tty);
        fds[1] = Some(Fd::Tty);
        fds[2] = Some(Fd::Tty);
        fds
    }

    pub fn set_args(&mut self, args: &[u8]) {
        let len = args.len().min(ARGS_MAX - 1);
        self.args = args[..len].to_vec();
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Entry of the proclist syscall's output array.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProcessInfo {
    pub pid: u32,
    pub state: u8,
    pub priority: u8,
    pub reserved: u16,
    pub time_slice: u32,
    pub total_time: u32,
    pub name: [u8; NAME_MAX],
}

/// The process table: all live processes (including zombies awaiting
/// reap), the current pid, and pid assignment.
pub struct ProcessManager {
    procs: BTreeMap<Pid, Process>,
    current: Option<Pid>,
    next_pid: Pid,
    pub default_cwd: String,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            procs: BTreeMap::new(),
            current: None,
            next_pid: 1,
            default_cwd: String::from("/"),
        }
    }

    pub fn alloc_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub fn insert(&mut self, proc: Process) {
        let pid = proc.pid;
        let prev = self.procs.insert(pid, proc);
        assert!(prev.is_none(), "pid {} reused while alive", pid);
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        if self.current == Some(pid) {
            self.current = None;
        }
        self.procs.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.procs.get_mut(&pid)
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    pub fn set_current(&mut self, pid: Option<Pid>) {
        self.current = pid;
    }

    pub fn current(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.procs.get(&pid))
    }

    pub fn current_mut(&mut self) -> Option<&mut Process> {
        let pid = self.current?;
        self.procs.get_mut(&pid)
    }

    pub fn count(&self) -> usize {
        self.procs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.procs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.procs.values_mut()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.procs.keys().copied().collect()
    }

    /// First zombie child of `parent` matching `target`.
    pub fn find_zombie_child(&self, parent: Pid, target: WaitTarget) -> Option<Pid> {
        self.procs
            .values()
            .find(|p| p.parent == Some(parent) && p.state.is_zombie() && target.matches(p.pid))
            .map(|p| p.pid)
    }

    /// Does `parent` have any live or zombie child matching `target`?
    pub fn has_child(&self, parent: Pid, target: WaitTarget) -> bool {
        self.procs
            .values()
            .any(|p| p.parent == Some(parent) && target.matches(p.pid))
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
