// src/gauge/mod.rs

// Driver for the gauge's command set
pub mod sync_gauge;

// Outlier policy, smoothing and start-up sequence on top of the driver
pub mod session;

pub use session::{
    screen_sample, CycleReport, DatumSource, Screening, Session, SessionSettings, Startup,
};
pub use sync_gauge::{FirmwareLine, FirmwareText, LinkTimeouts, SyncGauge};
