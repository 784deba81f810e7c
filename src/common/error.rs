// src/common/error.rs

use super::command::CommandFormatError;
use super::frame::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum GaugeError<E = ()>
where
    E: core::fmt::Debug,
{
    /// Underlying I/O error from the link (poll, read, write or sync).
    #[error("I/O error: {0:?}")]
    Io(E),

    /// The transport's retry ceiling was spent without moving any byte.
    #[error("Operation timed out")]
    Timeout,

    /// Only part of a payload made it onto the line.
    #[error("Short transfer: expected {expected} bytes, transferred {transferred}")]
    ShortTransfer { expected: usize, transferred: usize },

    /// Reply did not decode for the command that provoked it.
    #[error("Malformed reply: {0}")]
    Frame(#[from] FrameError),

    /// A command payload could not be encoded.
    #[error("Command format error: {0}")]
    CommandFormat(#[from] CommandFormatError),

    /// Every attempt allowed by the retry budget failed.
    #[error("No valid value after {attempts} attempts (last failure: {last:?})")]
    Exhausted { attempts: u32, last: Box<GaugeError<E>> },

    /// Not a single usable depth sample was obtained while filling the history.
    #[error("No valid depth sample obtained while filling the reading history")]
    HistoryUnavailable,
}

impl<E: core::fmt::Debug> GaugeError<E> {
    /// True for hard descriptor errors, which outrank timeouts and decode failures
    /// when deciding what to report after retries run out.
    pub fn is_io(&self) -> bool {
        match self {
            GaugeError::Io(_) => true,
            GaugeError::Exhausted { last, .. } => last.is_io(),
            _ => false,
        }
    }
}
