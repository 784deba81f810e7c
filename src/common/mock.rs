// src/common/mock.rs
//
// Scripted link and delay shared by the unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::hal_traits::{GaugeLink, Interest};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockCommError(pub i32);

/// Outcome of one readiness wait.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wait {
    Ready,
    TimedOut,
    Fail(MockCommError),
}

/// Outcome of one single-byte write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Put {
    Accept,
    Short,
    Fail(MockCommError),
}

/// A fake gauge at the far end of the link.
///
/// Each `discard_pending` call marks the start of a new exchange and loads the
/// next scripted reply into the receive buffer, so one scripted reply answers
/// one attempt. Waits and writes succeed unless an outcome was queued.
#[derive(Debug, Default)]
pub struct MockLink {
    pub replies: VecDeque<Vec<u8>>,
    pub rx: VecDeque<u8>,
    pub written: Vec<u8>,
    pub waits: VecDeque<Wait>,
    pub puts: VecDeque<Put>,
    pub read_failure: Option<MockCommError>,
    pub wait_calls: usize,
    pub sync_calls: usize,
    pub discard_calls: usize,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply per upcoming exchange.
    pub fn script<I, B>(&mut self, replies: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for reply in replies {
            self.replies.push_back(reply.as_ref().to_vec());
        }
    }

    /// Puts bytes straight into the receive buffer.
    pub fn stage_rx(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }
}

impl GaugeLink for MockLink {
    type Error = MockCommError;

    fn wait_ready(&mut self, _interest: Interest, _timeout_ms: u16) -> Result<bool, Self::Error> {
        self.wait_calls += 1;
        match self.waits.pop_front().unwrap_or(Wait::Ready) {
            Wait::Ready => Ok(true),
            Wait::TimedOut => Ok(false),
            Wait::Fail(e) => Err(e),
        }
    }

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if let Some(e) = self.read_failure.take() {
            return Err(nb::Error::Other(e));
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        match self.puts.pop_front().unwrap_or(Put::Accept) {
            Put::Accept => {
                self.written.push(byte);
                Ok(())
            }
            Put::Short => Err(nb::Error::WouldBlock),
            Put::Fail(e) => Err(nb::Error::Other(e)),
        }
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.sync_calls += 1;
        Ok(())
    }

    fn discard_pending(&mut self) -> Result<(), Self::Error> {
        self.discard_calls += 1;
        self.rx.clear();
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }
}

/// Delay that only records what it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub total_ms: u64,
    pub calls: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls.push(ms);
        self.total_ms += u64::from(ms);
    }
}
