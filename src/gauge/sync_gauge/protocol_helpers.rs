// src/gauge/sync_gauge/protocol_helpers.rs

use super::SyncGauge;
use crate::common::{
    command::{format_manual_calibration, Command},
    error::GaugeError,
    hal_traits::GaugeLink,
    timing::{FIRMWARE_LINES, FIRMWARE_LINE_MAX},
};
use embedded_hal::delay::DelayNs;
use tracing::{info, warn};

/// One line of the gauge's about text, CR/LF stripped.
pub type FirmwareLine = heapless::String<FIRMWARE_LINE_MAX>;
pub type FirmwareText = heapless::Vec<FirmwareLine, FIRMWARE_LINES>;

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

impl<IF, D> SyncGauge<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    /// Stores `value` as the gauge's datum (mounting height in millimetres).
    ///
    /// Each attempt writes `S` + zero padded value + `\n`, then the bare `S`,
    /// and decodes the echoed datum. Same retry budget rules as `query`.
    pub fn set_manual_calibration(
        &mut self,
        value: u16,
        retry_count: u16,
    ) -> Result<i32, GaugeError<IF::Error>> {
        let line = format_manual_calibration(value)?;
        let command = Command::ManualCalibrate;

        self.with_retries(command, retry_count, |gauge| {
            gauge.interface.discard_pending().map_err(GaugeError::Io)?;
            gauge.write_string(line.as_bytes(), gauge.timeouts.write_ms)?;
            gauge.write_byte(command.as_byte(), gauge.timeouts.write_ms)?;
            gauge.pause(command.settle_delay());
            gauge.read_reply(command)
        })
    }

    /// Reads the gauge's firmware/about text and logs each line.
    ///
    /// Empty lines are skipped. A read error ends the text early; it is only
    /// returned when no line was collected at all.
    pub fn firmware_text(&mut self) -> Result<FirmwareText, GaugeError<IF::Error>> {
        self.send_command(Command::About)?;

        let mut lines = FirmwareText::new();
        for _ in 0..FIRMWARE_LINES {
            let mut buffer = [0u8; FIRMWARE_LINE_MAX];
            let read_ms = self.timeouts.read_ms;
            let raw = match self.read_line(&mut buffer, read_ms) {
                Ok(raw) => raw,
                Err(e) if lines.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "firmware text cut short");
                    break;
                }
            };

            let text = trim_line_end(raw);
            if text.is_empty() {
                continue;
            }

            let mut line = FirmwareLine::new();
            for &b in text {
                let c = if b.is_ascii() { b as char } else { '?' };
                if line.push(c).is_err() {
                    break;
                }
            }
            info!(line = %line.as_str(), "firmware");
            if lines.push(line).is_err() {
                break;
            }
        }
        Ok(lines)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock::{MockLink, RecordingDelay};
    use crate::common::{CommandFormatError, FrameError};

    fn gauge(link: MockLink) -> SyncGauge<MockLink, RecordingDelay> {
        SyncGauge::new(link, RecordingDelay::default())
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_end(b"abc\n"), b"abc");
        assert_eq!(trim_line_end(b"abc"), b"abc");
        assert_eq!(trim_line_end(b"\r\n"), b"");
        assert_eq!(trim_line_end(b""), b"");
    }

    #[test]
    fn test_manual_calibration_wire_sequence() {
        let mut link = MockLink::new();
        link.script([b"S1234"]);
        let mut g = gauge(link);

        assert_eq!(g.set_manual_calibration(1234, 0).unwrap(), 1234);
        assert_eq!(g.interface.written, b"S1234\nS");
        // One sync for the line, one for the bare command
        assert_eq!(g.interface.sync_calls, 2);
    }

    #[test]
    fn test_manual_calibration_pads_value() {
        let mut link = MockLink::new();
        link.script([b"S0042"]);
        let mut g = gauge(link);

        assert_eq!(g.set_manual_calibration(42, 0).unwrap(), 42);
        assert_eq!(g.interface.written, b"S0042\nS");
    }

    #[test]
    fn test_manual_calibration_retries_whole_sequence() {
        let mut link = MockLink::new();
        link.script([&b"D1234"[..], &b"S1234"[..]]);
        let mut g = gauge(link);

        assert_eq!(g.set_manual_calibration(1234, 1).unwrap(), 1234);
        assert_eq!(g.interface.written, b"S1234\nSS1234\nS");
    }

    #[test]
    fn test_manual_calibration_out_of_range() {
        let mut g = gauge(MockLink::new());
        assert!(matches!(
            g.set_manual_calibration(12_345, 3),
            Err(GaugeError::CommandFormat(CommandFormatError::ValueOutOfRange(12_345)))
        ));
        assert!(g.interface.written.is_empty());
    }

    #[test]
    fn test_manual_calibration_bad_echo_exhausts() {
        let mut link = MockLink::new();
        link.script([b"SXXXX"]);
        let mut g = gauge(link);

        match g.set_manual_calibration(1234, 0) {
            Err(GaugeError::Exhausted { attempts: 1, last }) => {
                assert!(matches!(*last, GaugeError::Frame(FrameError::NonDigit { position: 1, .. })));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_firmware_text_collects_lines() {
        let mut link = MockLink::new();
        link.script([&b"Snow Depth Gauge\r\nVersion 2B-1.5\r\n\r\nTeensy 3.2\r\n"[..]]);
        let mut g = gauge(link);

        let lines = g.firmware_text().unwrap();
        let text: Vec<&str> = lines.iter().map(|l| l.as_str()).collect();
        assert_eq!(text, ["Snow Depth Gauge", "Version 2B-1.5", "Teensy 3.2"]);
        assert_eq!(g.interface.written, b"A");
        let (_, delay) = g.into_parts();
        assert_eq!(delay.calls, vec![10_000]);
    }

    #[test]
    fn test_firmware_text_masks_non_ascii() {
        let mut link = MockLink::new();
        link.script([&b"caf\xe9\n"[..]]);
        let mut g = gauge(link);

        let lines = g.firmware_text().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_str(), "caf?");
    }

    #[test]
    fn test_firmware_text_silent_gauge() {
        let mut g = gauge(MockLink::new());
        assert!(g.firmware_text().unwrap().is_empty());
    }
}
