// src/lib.rs

pub mod common;
pub mod config;
pub mod gauge;

#[cfg(feature = "tty")]
pub mod tty;

// Re-export key types for convenience
pub use common::{Command, GaugeError, GaugeLink, History, Interest};
pub use config::{Config, ConfigError};
pub use gauge::{CycleReport, Session, SessionSettings, Startup, SyncGauge};
