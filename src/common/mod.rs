// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod command;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod history;
pub mod stats;
pub mod timing;

#[cfg(test)]
pub(crate) mod mock;

// --- Re-export key types/traits/functions for easier access ---

// From command.rs
pub use command::{format_manual_calibration, Command, CommandFormatError};

// From error.rs
pub use error::GaugeError;

// From frame.rs
pub use frame::{decode_reply, FrameError, REPLY_LEN};

// From hal_traits.rs
pub use hal_traits::{GaugeLink, Interest};

// From history.rs
pub use history::{History, HistoryLenError, DEFAULT_HISTORY_LEN, HISTORY_CAPACITY};

// From stats.rs
pub use stats::{mean, moving_average, population_stddev, rounded_mean};
