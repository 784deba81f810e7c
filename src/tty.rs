// src/tty.rs
//
// Host adapter: a `GaugeLink` over a Linux tty, plus the std delay.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices, Termios,
};
use nix::unistd;

use crate::common::hal_traits::{GaugeLink, Interest};

/// Line speed of the radio modems the gauge ships with.
pub const DEFAULT_BAUD: BaudRate = BaudRate::B38400;

/// Borrows an open, configured tty for the lifetime `'fd`. Never closes it.
#[derive(Debug, Copy, Clone)]
pub struct TtyLink<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> TtyLink<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        TtyLink { fd }
    }
}

impl GaugeLink for TtyLink<'_> {
    type Error = Errno;

    fn wait_ready(&mut self, interest: Interest, timeout_ms: u16) -> Result<bool, Self::Error> {
        let wanted = match interest {
            Interest::Readable => PollFlags::POLLIN,
            Interest::Writable => PollFlags::POLLOUT,
        };
        let mut fds = [PollFd::new(self.fd, wanted)];
        match poll(&mut fds, PollTimeout::from(timeout_ms))? {
            0 => Ok(false),
            _ => Ok(fds[0].revents().is_some_and(|r| r.contains(wanted))),
        }
    }

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        match unistd::read(self.fd.as_raw_fd(), &mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) | Err(Errno::EAGAIN) | Err(Errno::EINTR) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        match unistd::write(self.fd, &[byte]) {
            Ok(1) => Ok(()),
            Ok(_) | Err(Errno::EAGAIN) | Err(Errno::EINTR) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    // tcdrain rather than fsync: ttys reject fsync with EINVAL.
    fn sync(&mut self) -> Result<(), Self::Error> {
        termios::tcdrain(self.fd)
    }

    fn discard_pending(&mut self) -> Result<(), Self::Error> {
        termios::tcflush(self.fd, FlushArg::TCIOFLUSH)
    }
}

/// Opens `path` read/write, non-blocking, without making it the controlling
/// terminal. Fails with `ENOTTY` if it is not a terminal.
pub fn open_tty(path: &Path) -> std::io::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
        .open(path)?;
    termios::tcgetattr(file.as_fd()).map_err(std::io::Error::from)?;
    Ok(file)
}

/// Puts the tty into raw 8N1 at `baud` with non-blocking reads (VMIN = VTIME = 0)
/// and flushes both directions. Returns the settings to hand back to `restore`.
///
/// Input is passed through untouched apart from dropping bytes with parity
/// errors; CR is never turned into NL.
pub fn configure_raw<Fd: AsFd>(fd: Fd, baud: BaudRate) -> Result<Termios, Errno> {
    let fd = fd.as_fd();
    let saved = termios::tcgetattr(fd)?;

    let mut raw = saved.clone();
    raw.input_flags = InputFlags::IGNPAR;
    raw.output_flags = OutputFlags::empty();
    raw.control_flags = ControlFlags::CREAD | ControlFlags::CLOCAL | ControlFlags::CS8;
    raw.local_flags = LocalFlags::empty();
    // Clears whatever translation the flags above leave behind.
    termios::cfmakeraw(&mut raw);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    termios::cfsetspeed(&mut raw, baud)?;

    termios::tcflush(fd, FlushArg::TCIOFLUSH)?;
    termios::tcsetattr(fd, SetArg::TCSANOW, &raw)?;
    termios::tcflush(fd, FlushArg::TCIOFLUSH)?;
    Ok(saved)
}

pub fn restore<Fd: AsFd>(fd: Fd, saved: &Termios) -> Result<(), Errno> {
    termios::tcsetattr(fd.as_fd(), SetArg::TCSANOW, saved)
}

/// `DelayNs` backed by `std::thread::sleep`.
#[derive(Debug, Default, Copy, Clone)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
