// src/common/history.rs

use heapless::Vec;

use super::stats;

/// Upper bound on the configurable window length.
pub const HISTORY_CAPACITY: usize = 32;
pub const DEFAULT_HISTORY_LEN: usize = 10;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("history length {0} outside 1..={max}", max = HISTORY_CAPACITY)]
pub struct HistoryLenError(pub usize);

/// Fixed-length window of recent depth samples, oldest first.
///
/// The length is chosen once at construction and never changes afterwards;
/// pushes evict index 0 and shift the rest down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    values: Vec<i32, HISTORY_CAPACITY>,
}

impl History {
    /// A zero-filled window of `len` samples.
    pub fn zeroed(len: usize) -> Result<Self, HistoryLenError> {
        if len == 0 || len > HISTORY_CAPACITY {
            return Err(HistoryLenError(len));
        }
        let mut values = Vec::new();
        values
            .resize(len, 0)
            .map_err(|_| HistoryLenError(len))?;
        Ok(Self { values })
    }

    /// Builds a window holding exactly `samples`.
    pub fn from_slice(samples: &[i32]) -> Result<Self, HistoryLenError> {
        if samples.is_empty() {
            return Err(HistoryLenError(0));
        }
        let values = Vec::from_slice(samples).map_err(|_| HistoryLenError(samples.len()))?;
        Ok(Self { values })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    pub fn mean(&self) -> f64 {
        stats::mean(&self.values)
    }

    pub fn rounded_mean(&self) -> i32 {
        stats::rounded_mean(&self.values)
    }

    pub fn population_stddev(&self) -> f64 {
        stats::population_stddev(&self.values)
    }

    /// Pushes `value` through the moving average and returns the new mean.
    pub fn push(&mut self, value: i32) -> f64 {
        stats::moving_average(&mut self.values, value)
    }

    /// Mutable access for re-seeding the window in place.
    pub(crate) fn slots_mut(&mut self) -> &mut [i32] {
        &mut self.values
    }
}
