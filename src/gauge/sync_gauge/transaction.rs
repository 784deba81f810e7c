// src/gauge/sync_gauge/transaction.rs

use super::SyncGauge;
use crate::common::{
    command::Command,
    error::GaugeError,
    frame::{decode_reply, REPLY_LEN},
    hal_traits::GaugeLink,
};
use embedded_hal::delay::DelayNs;
use tracing::{debug, trace, warn};

impl<IF, D> SyncGauge<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    /// Runs a get-style exchange for `command` until a reply decodes or the
    /// retry budget runs out.
    ///
    /// The budget is decremented after every attempt and checked afterwards,
    /// so `retry_count` R permits up to R + 1 attempts (a budget of 0 still
    /// makes one attempt).
    pub fn query(&mut self, command: Command, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.with_retries(command, retry_count, |gauge| gauge.exchange(command))
    }

    pub(super) fn with_retries<F>(
        &mut self,
        command: Command,
        retry_count: u16,
        mut attempt: F,
    ) -> Result<i32, GaugeError<IF::Error>>
    where
        F: FnMut(&mut Self) -> Result<i32, GaugeError<IF::Error>>,
    {
        let mut remaining = i32::from(retry_count);
        let mut attempts = 0u32;
        let mut last: Option<GaugeError<IF::Error>> = None;

        loop {
            attempts += 1;
            match attempt(self) {
                Ok(value) => {
                    debug!(%command, value, attempts, "exchange complete");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(%command, attempt = attempts, error = %e, "exchange failed");
                    last = Some(match last {
                        Some(prev) if prev.is_io() && !e.is_io() => prev,
                        _ => e,
                    });
                }
            }

            remaining -= 1;
            if remaining < 0 {
                break;
            }
        }

        Err(GaugeError::Exhausted {
            attempts,
            last: Box::new(last.unwrap_or(GaugeError::Timeout)),
        })
    }

    /// One attempt: send the command, read and decode the reply.
    fn exchange(&mut self, command: Command) -> Result<i32, GaugeError<IF::Error>> {
        self.send_command(command)?;
        self.read_reply(command)
    }

    /// Discards stale bytes and writes the bare command. Commands that get a
    /// reply then wait out their settle delay.
    pub(super) fn send_command(&mut self, command: Command) -> Result<(), GaugeError<IF::Error>> {
        self.interface.discard_pending().map_err(GaugeError::Io)?;
        self.write_byte(command.as_byte(), self.timeouts.write_ms)?;
        if command.expects_reply() {
            self.pause(command.settle_delay());
        }
        Ok(())
    }

    /// Reads one fixed-width reply into a per-call buffer and decodes it.
    pub(super) fn read_reply(&mut self, command: Command) -> Result<i32, GaugeError<IF::Error>> {
        let mut buffer = [0u8; REPLY_LEN];
        let read_ms = self.timeouts.read_ms;
        let reply = self.read_line(&mut buffer, read_ms)?;
        trace!(%command, reply = ?reply, "reply bytes");
        Ok(decode_reply(command, reply)?)
    }
}
