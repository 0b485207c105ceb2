//! Device drivers
//!
//! Thin collaborators behind the syscall surface: serial console for
//! logs, VGA text console, PIT timer, PS/2 keyboard and mouse, the PC
//! speaker and mode-13h graphics. Real implementations exist only on
//! the bare-metal target; host builds get inert stand-ins that report
//! "no device" so the syscall layer (and its pointer validation) stays
//! fully testable.

pub mod graphics;
pub mod keyboard;
pub mod mouse;
pub mod pit;
pub mod serial;
pub mod speaker;
pub mod vga;
