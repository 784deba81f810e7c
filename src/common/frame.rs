// src/common/frame.rs

use super::command::Command;

/// Bytes read for one reply: echo + optional sign + four digits.
pub const REPLY_LEN: usize = 6;

/// Why a reply failed to decode. Every variant is a retryable failure of one attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than the layout needs (includes the empty read).
    #[error("reply too short: {len} bytes")]
    TooShort { len: usize },

    /// First byte was not the command character.
    #[error("echo mismatch: expected '{expected}', got {got:#04x}")]
    EchoMismatch { expected: char, got: u8 },

    /// A digit position held something else.
    #[error("non-digit {byte:#04x} at position {position}")]
    NonDigit { position: usize, byte: u8 },

    /// `-dddd` reply to a command whose value is unsigned.
    #[error("negative value not allowed for command '{0}'")]
    NegativeNotAllowed(char),
}

#[inline]
fn digit(reply: &[u8], position: usize) -> Result<i32, FrameError> {
    let byte = *reply
        .get(position)
        .ok_or(FrameError::TooShort { len: reply.len() })?;
    if byte.is_ascii_digit() {
        Ok(i32::from(byte - b'0'))
    } else {
        Err(FrameError::NonDigit { position, byte })
    }
}

/// Reads four weighted decimal digits starting at `start`.
fn magnitude(reply: &[u8], start: usize) -> Result<i32, FrameError> {
    if reply.len() < start + 4 {
        return Err(FrameError::TooShort { len: reply.len() });
    }
    Ok(digit(reply, start)? * 1000
        + digit(reply, start + 1)? * 100
        + digit(reply, start + 2)? * 10
        + digit(reply, start + 3)?)
}

/// Decodes a reply to `command`.
///
/// Layouts (trailing bytes such as CR/LF are ignored):
/// * `Xdddd`  -> `dddd`
/// * `X-dddd` -> `-dddd` (only when the command allows negative values)
///
/// where `X` must equal the command character.
pub fn decode_reply(command: Command, reply: &[u8]) -> Result<i32, FrameError> {
    let echo = *reply.first().ok_or(FrameError::TooShort { len: 0 })?;
    if echo != command.as_byte() {
        return Err(FrameError::EchoMismatch {
            expected: command.as_byte() as char,
            got: echo,
        });
    }

    match reply.get(1) {
        Some(b'-') => {
            if !command.allows_negative() {
                return Err(FrameError::NegativeNotAllowed(command.as_byte() as char));
            }
            Ok(-magnitude(reply, 2)?)
        }
        Some(_) => magnitude(reply, 1),
        None => Err(FrameError::TooShort { len: reply.len() }),
    }
}
