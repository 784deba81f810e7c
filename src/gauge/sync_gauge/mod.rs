// src/gauge/sync_gauge/mod.rs

mod io_helpers;
mod protocol_helpers;
mod transaction;

pub use protocol_helpers::{FirmwareLine, FirmwareText};

use crate::common::{
    command::Command,
    error::GaugeError,
    hal_traits::GaugeLink,
    timing,
};
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use tracing::info;

/// Readiness-wait timeouts used for every transport call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LinkTimeouts {
    pub write_ms: u16,
    pub read_ms: u16,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            write_ms: timing::WRITE_TIMEOUT_MS,
            read_ms: timing::READ_TIMEOUT_MS,
        }
    }
}

/// Synchronous driver for the remote snow depth gauge.
///
/// Owns (or, through `&mut L`, borrows) the link and a delay provider. Every
/// method runs to completion before returning; nothing is cached between calls.
#[derive(Debug)]
pub struct SyncGauge<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    interface: IF,
    delay: D,
    timeouts: LinkTimeouts,
}

impl<IF, D> SyncGauge<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    pub fn new(interface: IF, delay: D) -> Self {
        Self::with_timeouts(interface, delay, LinkTimeouts::default())
    }

    pub fn with_timeouts(interface: IF, delay: D, timeouts: LinkTimeouts) -> Self {
        SyncGauge {
            interface,
            delay,
            timeouts,
        }
    }

    pub fn interface(&self) -> &IF {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut IF {
        &mut self.interface
    }

    pub fn timeouts(&self) -> LinkTimeouts {
        self.timeouts
    }

    pub fn into_parts(self) -> (IF, D) {
        (self.interface, self.delay)
    }

    /// Blocks for `duration` on the injected delay provider.
    pub fn pause(&mut self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        self.delay.delay_ms(ms);
    }

    // --- Named operations ---
    //
    // `retry_count` R allows up to R + 1 attempts; see `query`.

    /// Snow depth in millimetres.
    pub fn get_depth(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::Depth, retry_count)
    }

    /// Datum currently stored in the gauge.
    pub fn get_calibration(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::Calibration, retry_count)
    }

    /// Asks the gauge to measure its own datum and returns it.
    pub fn set_auto_calibration(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::AutoCalibrate, retry_count)
    }

    /// Raw range to target.
    pub fn get_range(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::Range, retry_count)
    }

    /// Battery voltage in centivolts.
    pub fn get_voltage(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::Voltage, retry_count)
    }

    pub fn get_charger_status(&mut self, retry_count: u16) -> Result<i32, GaugeError<IF::Error>> {
        self.query(Command::ChargerStatus, retry_count)
    }

    /// Tells the remote CPU to restart. No reply is read; callers must give the
    /// gauge `timing::RESTART_DELAY` before talking to it again.
    pub fn restart(&mut self) -> Result<(), GaugeError<IF::Error>> {
        self.send_command(Command::Restart)?;
        info!("Issued remote restart of sensor command");
        Ok(())
    }
}
