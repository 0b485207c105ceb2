//! KPTI trampoline state
//!
//! The entry and exit CR3 swaps live in the common stub
//! ([`super::stubs`]); this module owns the three shared words the asm
//! reads:
//!
//! - `TRAMPOLINE_KERNEL_CR3` — the kernel template directory, loaded on
//!   every kernel entry (zero until paging init, which makes the swap a
//!   no-op during early boot).
//! - `TRAMPOLINE_USER_CR3` — the outgoing process's directory, staged
//!   by the dispatcher just before returning to ring 3.
//! - `TRAMPOLINE_RETURN_TO_USER` — one-shot flag; the exit path loads
//!   the staged CR3 and clears it.
//!
//! The stub code and every per-process kernel stack live in the shared
//! kernel half, which is copied into each process directory at address
//! space creation, so both remain mapped across either CR3 switch.
//! All three words are touched only with interrupts disabled.

use core::sync::atomic::{AtomicU32, Ordering};

#[no_mangle]
static TRAMPOLINE_KERNEL_CR3: AtomicU32 = AtomicU32::new(0);

#[no_mangle]
static TRAMPOLINE_USER_CR3: AtomicU32 = AtomicU32::new(0);

#[no_mangle]
static TRAMPOLINE_RETURN_TO_USER: AtomicU32 = AtomicU32::new(0);

/// Record the kernel directory once paging is up; from here on every
/// kernel entry switches to it.
pub fn init(kernel_cr3: u32) {
    TRAMPOLINE_KERNEL_CR3.store(kernel_cr3, Ordering::SeqCst);
}

/// Stage a return to ring 3 under the given directory. Called by the
/// dispatcher with interrupts disabled; consumed by the exit stub.
pub fn stage_user_return(user_cr3: u32) {
    TRAMPOLINE_USER_CR3.store(user_cr3, Ordering::SeqCst);
    TRAMPOLINE_RETURN_TO_USER.store(1, Ordering::SeqCst);
}

/// Cancel any staged return; the exit path will iret without touching
/// CR3 (ring-0 resume).
pub fn clear_user_return() {
    TRAMPOLINE_RETURN_TO_USER.store(0, Ordering::SeqCst);
}
