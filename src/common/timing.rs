// src/common/timing.rs

use core::time::Duration;

// The gauge sits behind an XBee radio pair in transparent mode. The radio
// buffers and forwards, so the host has to give it time both ways.

// === Settling delays (command written -> reply readable) ===

/// Wake/propagation allowance for every query except depth.
pub const WAKEUP_DELAY: Duration = Duration::from_secs(10);
/// A depth query fires a fresh ultrasonic measurement before answering.
pub const DEPTH_READING_DELAY: Duration = Duration::from_secs(15);
/// Time the remote CPU needs after a restart before it accepts commands.
pub const RESTART_DELAY: Duration = Duration::from_secs(2 * 60);

// === Per-call readiness timeouts ===

pub const WRITE_TIMEOUT_MS: u16 = 500;
pub const READ_TIMEOUT_MS: u16 = 500;

// === Transport retry ceilings (non-productive poll iterations) ===
// Independent of, and smaller than, the protocol retry budget.

pub const WRITE_BYTE_RETRIES: u8 = 6;
pub const WRITE_STRING_RETRIES: u8 = 5;
pub const READ_LINE_RETRIES: u8 = 5;

// === Text replies ===

/// Lines returned by the about command.
pub const FIRMWARE_LINES: usize = 7;
/// Longest firmware line kept, terminator included.
pub const FIRMWARE_LINE_MAX: usize = 100;
