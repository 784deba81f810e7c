// src/gauge/sync_gauge/io_helpers.rs

use super::SyncGauge;
use crate::common::{
    error::GaugeError,
    hal_traits::{GaugeLink, Interest},
    timing,
};
use embedded_hal::delay::DelayNs;
use tracing::trace;

// Byte transport. Each call waits for readiness before every single-byte
// transfer. Waits that time out, waits that fail, and transfers that move
// nothing all spend one unit of the call's retry ceiling. A hard error is
// remembered and reported in preference to a plain timeout.
impl<IF, D> SyncGauge<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    /// Writes exactly one byte, then syncs the link.
    ///
    /// Returns the number of bytes written (always 1 on success).
    pub fn write_byte(&mut self, byte: u8, timeout_ms: u16) -> Result<usize, GaugeError<IF::Error>> {
        self.put_bytes(&[byte], timeout_ms, timing::WRITE_BYTE_RETRIES)
    }

    /// Writes `bytes` one byte at a time, each chunk independently waited for,
    /// then syncs the link. Fails unless the whole payload went out.
    pub fn write_string(&mut self, bytes: &[u8], timeout_ms: u16) -> Result<usize, GaugeError<IF::Error>> {
        self.put_bytes(bytes, timeout_ms, timing::WRITE_STRING_RETRIES)
    }

    fn put_bytes(
        &mut self,
        bytes: &[u8],
        timeout_ms: u16,
        ceiling: u8,
    ) -> Result<usize, GaugeError<IF::Error>> {
        let mut total = 0;
        let mut misses = 0u8;
        let mut hard_error = None;

        while total < bytes.len() && misses < ceiling {
            match self.interface.wait_ready(Interest::Writable, timeout_ms) {
                Ok(true) => match self.interface.write_byte(bytes[total]) {
                    Ok(()) => total += 1,
                    Err(nb::Error::WouldBlock) => {
                        misses += 1;
                        trace!(misses, "short write");
                    }
                    Err(nb::Error::Other(e)) => {
                        misses += 1;
                        trace!(misses, error = ?e, "write failed");
                        hard_error = Some(e);
                    }
                },
                Ok(false) => {
                    misses += 1;
                    trace!(misses, timeout_ms, "not writable");
                }
                Err(e) => {
                    misses += 1;
                    trace!(misses, error = ?e, "write wait failed");
                    hard_error = Some(e);
                }
            }
        }

        if let Some(e) = hard_error {
            return Err(GaugeError::Io(e));
        }
        if total == 0 && !bytes.is_empty() {
            return Err(GaugeError::Timeout);
        }
        if total < bytes.len() {
            return Err(GaugeError::ShortTransfer {
                expected: bytes.len(),
                transferred: total,
            });
        }

        self.interface.sync().map_err(GaugeError::Io)?;
        Ok(total)
    }

    /// Reads one byte at a time into `buffer` until a `\n` arrives, the buffer
    /// is full, or the retry ceiling is spent.
    ///
    /// Returns whatever was accumulated, which may be empty. An error is only
    /// returned when nothing was read and the link reported a hard error.
    pub fn read_line<'buf>(
        &mut self,
        buffer: &'buf mut [u8],
        timeout_ms: u16,
    ) -> Result<&'buf [u8], GaugeError<IF::Error>> {
        let mut len = 0;
        let mut misses = 0u8;
        let mut hard_error = None;

        while len < buffer.len() && misses < timing::READ_LINE_RETRIES {
            match self.interface.wait_ready(Interest::Readable, timeout_ms) {
                Ok(true) => match self.interface.read_byte() {
                    Ok(byte) => {
                        buffer[len] = byte;
                        len += 1;
                        if byte == b'\n' {
                            break;
                        }
                    }
                    Err(nb::Error::WouldBlock) => {
                        misses += 1;
                        trace!(misses, "nothing read");
                    }
                    Err(nb::Error::Other(e)) => {
                        misses += 1;
                        trace!(misses, error = ?e, "read failed");
                        hard_error = Some(e);
                    }
                },
                Ok(false) => {
                    misses += 1;
                    trace!(misses, timeout_ms, "not readable");
                }
                Err(e) => {
                    misses += 1;
                    trace!(misses, error = ?e, "read wait failed");
                    hard_error = Some(e);
                }
            }
        }

        if len == 0 {
            if let Some(e) = hard_error {
                return Err(GaugeError::Io(e));
            }
        }
        Ok(&buffer[..len])
    }
}
