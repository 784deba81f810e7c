//! Snow depth gauge command definitions.
//!
//! Every command is a single ASCII character. The only command that carries a
//! payload is the manual calibration, which sends `S` + four digits + `\n`
//! ahead of the bare `S`.

use core::fmt;
use core::time::Duration;

use arrayvec::ArrayString;

use super::timing;

/// Largest magnitude that fits the four-digit payload field.
pub const MAX_PAYLOAD_MAGNITUDE: u16 = 9999;

/// `S` + 4 digits + `\n`.
pub const CALIBRATION_LINE_LEN: usize = 6;

/// A command understood by the remote gauge firmware.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// `A` - firmware/about text, seven lines.
    About,
    /// `B` - restart the remote CPU. No reply.
    Restart,
    /// `C` - let the gauge measure and store its own datum.
    AutoCalibrate,
    /// `D` - snow depth in millimetres.
    Depth,
    /// `G` - stored calibration datum.
    Calibration,
    /// `R` - raw range to target.
    Range,
    /// `S` - store a datum supplied by the host.
    ManualCalibrate,
    /// `T` - LiPo charger status.
    ChargerStatus,
    /// `V` - battery voltage in centivolts.
    Voltage,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::About,
        Command::Restart,
        Command::AutoCalibrate,
        Command::Depth,
        Command::Calibration,
        Command::Range,
        Command::ManualCalibrate,
        Command::ChargerStatus,
        Command::Voltage,
    ];

    /// The identifying byte written to the wire and echoed back in replies.
    #[inline]
    pub const fn as_byte(self) -> u8 {
        match self {
            Command::About => b'A',
            Command::Restart => b'B',
            Command::AutoCalibrate => b'C',
            Command::Depth => b'D',
            Command::Calibration => b'G',
            Command::Range => b'R',
            Command::ManualCalibrate => b'S',
            Command::ChargerStatus => b'T',
            Command::Voltage => b'V',
        }
    }

    /// Whether a `-dddd` reply is a legal value for this command.
    #[inline]
    pub const fn allows_negative(self) -> bool {
        !matches!(self, Command::ChargerStatus | Command::Voltage)
    }

    /// Whether the gauge answers this command at all.
    #[inline]
    pub const fn expects_reply(self) -> bool {
        !matches!(self, Command::Restart)
    }

    /// Time the radio link needs between writing the command and the reply
    /// being readable. Depth takes a fresh ultrasonic measurement and is slower.
    pub const fn settle_delay(self) -> Duration {
        match self {
            Command::Depth => timing::DEPTH_READING_DELAY,
            _ => timing::WAKEUP_DELAY,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Error produced while encoding a command payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandFormatError {
    #[error("value {0} does not fit the four-digit payload")]
    ValueOutOfRange(u16),
    #[error("command buffer too small")]
    BufferTooSmall,
}

/// Formats the line that precedes a manual calibration: `S` + zero padded
/// magnitude + `\n`, e.g. `S1234\n` or `S0042\n`.
pub fn format_manual_calibration(
    value: u16,
) -> Result<ArrayString<CALIBRATION_LINE_LEN>, CommandFormatError> {
    if value > MAX_PAYLOAD_MAGNITUDE {
        return Err(CommandFormatError::ValueOutOfRange(value));
    }
    let mut line = ArrayString::new();
    fmt::write(
        &mut line,
        format_args!("{}{:04}\n", Command::ManualCalibrate, value),
    )
    .map_err(|_| CommandFormatError::BufferTooSmall)?;
    Ok(line)
}
