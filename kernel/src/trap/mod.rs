//! Trap and IRQ core
//!
//! Every kernel entry — exception, IRQ or syscall — arrives here from
//! the common stub with a pointer to the uniform [`TrapFrame`]. The
//! core demultiplexes: page faults go to the COW service and otherwise
//! terminate the faulting user process (or panic in kernel mode),
//! IRQs go to the handler table with the timer driving the scheduler,
//! and the syscall vector enters the dispatcher. On the way out the
//! trampoline is staged for whichever context the frame now describes.

pub mod frame;
pub mod irq;

pub use frame::TrapFrame;

use crate::arch;
use crate::kernel::Kernel;
use crate::process::EXIT_CODE_FAULTED;

pub const VECTOR_PAGE_FAULT: u32 = 14;

/// Page-fault error-code bits.
pub const PF_PRESENT: u32 = 1 << 0;
pub const PF_WRITE: u32 = 1 << 1;
pub const PF_USER: u32 = 1 << 2;

/// Entry point called by the common assembly stub.
///
/// # Safety
///
/// `frame_ptr` points into the active kernel stack where the stub just
/// built a `TrapFrame`; it is exclusively ours until we return.
#[no_mangle]
pub unsafe extern "C" fn trap_entry(frame_ptr: *mut TrapFrame) {
    let frame = unsafe { &mut *frame_ptr };
    handle_trap(frame);
}

/// Demultiplex one kernel entry and stage the return path.
pub fn handle_trap(frame: &mut TrapFrame) {
    match frame.vector {
        vector @ 0..=31 => {
            let fault_addr = arch::read_cr2();
            crate::kernel::with_kernel(|k| k.exception(frame, vector, fault_addr));
        }
        32..=47 => irq::handle(frame),
        vector if vector == arch::SYSCALL_VECTOR as u32 => {
            crate::kernel::with_kernel(|k| crate::syscall::dispatch(k, frame));
        }
        vector => log::warn!("spurious trap vector {}", vector),
    }
    prepare_return(frame);
}

/// Stage the exit trampoline for the context the frame now describes:
/// the current process's directory for a ring-3 resume, nothing for a
/// ring-0 (idle or early-boot) resume.
pub fn prepare_return(frame: &TrapFrame) {
    if frame.from_user() {
        crate::kernel::with_kernel(|k| match k.pm.current() {
            Some(p) => arch::stage_user_return(p.space.directory_phys().as_u32()),
            None => arch::clear_user_return(),
        });
    } else {
        arch::clear_user_return();
    }
}

impl Kernel {
    /// Exception service. A write fault on a COW page is repaired and
    /// resumed; any other user-mode exception terminates the process
    /// with a fault exit code; a kernel-mode exception is fatal.
    pub fn exception(&mut self, frame: &mut TrapFrame, vector: u32, fault_addr: u32) {
        if vector == VECTOR_PAGE_FAULT {
            self.page_fault(frame, fault_addr);
            return;
        }

        if frame.from_user() {
            let pid = self.pm.current_pid().unwrap_or(0);
            log::error!(
                "exception {} in process {} at eip={:#010x}, terminating",
                vector,
                pid,
                frame.eip
            );
            self.zombify(pid, EXIT_CODE_FAULTED);
            self.reschedule(frame);
        } else {
            panic!(
                "kernel exception {} at eip={:#010x} err={:#x}",
                vector, frame.eip, frame.error_code
            );
        }
    }

    /// Page-fault service (vector 14).
    pub fn page_fault(&mut self, frame: &mut TrapFrame, fault_addr: u32) {
        let err = frame.error_code;
        let from_user = frame.from_user() || err & PF_USER != 0;

        // A user write to a present, COW-flagged page materializes a
        // private copy and resumes the faulting instruction.
        if err & PF_WRITE != 0 {
            if let Some(pid) = self.pm.current_pid() {
                let Kernel {
                    ref phys,
                    ref mut frames,
                    ref pm,
                    ..
                } = *self;
                let space = pm.get(pid).unwrap().space;
                if space.handle_cow(phys, frames, fault_addr) {
                    return;
                }
            }
        }

        if from_user {
            let pid = self.pm.current_pid().unwrap_or(0);
            log::error!(
                "page fault in process {}: addr={:#010x} eip={:#010x} err={:#x}, terminating",
                pid,
                fault_addr,
                frame.eip,
                err
            );
            self.zombify(pid, EXIT_CODE_FAULTED);
            self.reschedule(frame);
        } else {
            panic!(
                "kernel page fault: addr={:#010x} eip={:#010x} err={:#x}",
                fault_addr, frame.eip, err
            );
        }
    }
}
