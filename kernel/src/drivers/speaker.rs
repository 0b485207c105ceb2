//! PC speaker
//!
//! Square wave from PIT channel 2 gated by port 0x61. Timed beeps do
//! not busy-wait: the stop deadline is checked from the timer tick
//! path, so a beep plays while processes keep running.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::sched::TIMER_HZ;

/// Tick at which an in-flight beep ends (0 = silent).
static BEEP_STOP_TICK: AtomicU64 = AtomicU64::new(0);

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod imp {
    use x86::io::{inb, outb};

    const PIT_CHANNEL2: u16 = 0x42;
    const PIT_COMMAND: u16 = 0x43;
    const SPEAKER_PORT: u16 = 0x61;

    pub fn start(freq_hz: u32) {
        if freq_hz == 0 {
            return;
        }
        let divisor = (super::imp_freq() / freq_hz).clamp(1, 0xFFFF);
        // SAFETY: channel-2 square-wave programming and the two speaker
        // gate bits in port 0x61.
        unsafe {
            outb(PIT_COMMAND, 0xB6);
            outb(PIT_CHANNEL2, (divisor & 0xFF) as u8);
            outb(PIT_CHANNEL2, (divisor >> 8) as u8);
            let gate = inb(SPEAKER_PORT);
            outb(SPEAKER_PORT, gate | 0x03);
        }
    }

    pub fn stop() {
        // SAFETY: clearing the speaker gate bits only silences output.
        unsafe {
            let gate = inb(SPEAKER_PORT);
            outb(SPEAKER_PORT, gate & !0x03);
        }
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
fn imp_freq() -> u32 {
    1_193_182
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod imp {
    pub fn start(_freq_hz: u32) {}

    pub fn stop() {}
}

/// Continuous tone until `stop`.
pub fn start(freq_hz: u32) {
    imp::start(freq_hz);
    BEEP_STOP_TICK.store(0, Ordering::Relaxed);
}

/// Silence the speaker and cancel any pending beep deadline.
pub fn stop() {
    imp::stop();
    BEEP_STOP_TICK.store(0, Ordering::Relaxed);
}

/// Timed beep; the tick hook silences it at the deadline.
pub fn beep(freq_hz: u32, duration_ms: u32, now_tick: u64) {
    if freq_hz == 0 || duration_ms == 0 {
        return;
    }
    imp::start(freq_hz);
    let ticks = ((duration_ms as u64) * TIMER_HZ as u64).div_ceil(1000).max(1);
    BEEP_STOP_TICK.store(now_tick + ticks, Ordering::Relaxed);
}

/// Called from the timer tick path.
pub fn on_tick(now_tick: u64) {
    let deadline = BEEP_STOP_TICK.load(Ordering::Relaxed);
    if deadline != 0 && now_tick >= deadline {
        stop();
    }
}
