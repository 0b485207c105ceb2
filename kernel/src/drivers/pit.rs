//! Programmable interval timer
//!
//! Channel 0 in rate-generator mode drives the scheduler tick; the
//! kernel runs it at [`crate::sched::TIMER_HZ`]. Channel 2 belongs to
//! the speaker driver.

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use x86::io::outb;

    const PIT_CHANNEL0: u16 = 0x40;
    const PIT_COMMAND: u16 = 0x43;
    /// Input clock of the 8253/8254.
    pub const PIT_FREQUENCY: u32 = 1_193_182;

    /// Program channel 0 at `hz` and unmask IRQ0.
    pub fn init(hz: u32) {
        let divisor = (PIT_FREQUENCY / hz).clamp(1, 0xFFFF);
        // SAFETY: channel-0 rate-generator programming, lobyte/hibyte
        // access.
        unsafe {
            outb(PIT_COMMAND, 0x34);
            outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
            outb(PIT_CHANNEL0, (divisor >> 8) as u8);
        }
        crate::arch::x86::pic::unmask(0);
        log::info!("pit: {} Hz (divisor {})", hz, divisor);
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use imp::init;

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub fn init(_hz: u32) {}
