// src/common/hal_traits.rs

use core::fmt::Debug;

/// Which readiness to wait for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interest {
    Readable,
    Writable,
}

/// Abstraction over an already opened and configured, non-blocking,
/// byte-oriented character device that supports a readiness wait.
///
/// Implementations never open, close or reconfigure the device. Delays are
/// not part of this trait; the gauge takes an `embedded_hal::delay::DelayNs`
/// separately so tests can substitute a recording or zero delay.
pub trait GaugeLink {
    /// Associated error type for descriptor errors.
    type Error: Debug;

    /// Waits up to `timeout_ms` for the requested readiness.
    ///
    /// Returns `Ok(true)` when the descriptor is ready for `interest`, `Ok(false)`
    /// when the wait timed out or reported some other event (hang-up, error
    /// condition), and `Err` when the wait itself failed.
    fn wait_ready(&mut self, interest: Interest, timeout_ms: u16) -> Result<bool, Self::Error>;

    /// Attempts to read a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` when nothing was transferred.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` when nothing was transferred.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Forces written bytes out to the device.
    fn sync(&mut self) -> Result<(), Self::Error>;

    /// Discards pending input and output so stale bytes from an earlier
    /// exchange cannot be mistaken for the next reply.
    fn discard_pending(&mut self) -> Result<(), Self::Error>;
}

/// Lets a caller keep ownership of its link and lend it to a gauge.
impl<T: GaugeLink + ?Sized> GaugeLink for &mut T {
    type Error = T::Error;

    fn wait_ready(&mut self, interest: Interest, timeout_ms: u16) -> Result<bool, Self::Error> {
        (**self).wait_ready(interest, timeout_ms)
    }

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        (**self).write_byte(byte)
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        (**self).sync()
    }

    fn discard_pending(&mut self) -> Result<(), Self::Error> {
        (**self).discard_pending()
    }
}
