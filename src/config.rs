// src/config.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::command::MAX_PAYLOAD_MAGNITUDE;
use crate::common::history::HISTORY_CAPACITY;
use crate::gauge::{DatumSource, SessionSettings, Startup};

/// Locations searched, in order, when no path is given explicitly.
pub const SEARCH_PATHS: [&str; 3] = [
    "snowgauge.toml",
    "/usr/local/etc/snowgauge.toml",
    "/etc/snowgauge.toml",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Serial device the radio modem is attached to
    pub device: PathBuf,
    /// Send the remote restart command before anything else
    pub restart_sensor: bool,
    /// Write logs here instead of stderr
    pub log_file: Option<PathBuf>,
    /// Polling interval, aligned to multiples since local midnight
    pub sleep_seconds: u32,
    pub session: SessionSettings,
    pub calibration: CalibrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyUSB0"),
            restart_sensor: false,
            log_file: None,
            sleep_seconds: 3660,
            session: SessionSettings::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMode {
    /// Use whatever datum the gauge already holds
    #[default]
    Read,
    /// Have the gauge measure its own datum
    Auto,
    /// Store `calibration.datum` in the gauge
    Manual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    pub mode: CalibrationMode,
    /// Mounting height in millimetres, only sent in manual mode
    pub datum: u16,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::Read,
            datum: 5000,
        }
    }
}

impl Config {
    /// Loads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, else the first file in `SEARCH_PATHS` that
    /// exists, else the defaults. Returns the path actually used.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        for candidate in SEARCH_PATHS.iter().map(Path::new) {
            if candidate.is_file() {
                return Ok((Self::load(candidate)?, Some(candidate.to_path_buf())));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                key,
                reason: reason.into(),
            }
        }

        if self.sleep_seconds == 0 {
            return Err(invalid("sleep_seconds", "must be positive"));
        }
        if self.session.retry_count == 0 {
            return Err(invalid("session.retry_count", "must be positive"));
        }
        if self.session.stdev_filter == 0 {
            return Err(invalid("session.stdev_filter", "must be positive"));
        }
        if self.session.history_len == 0 || self.session.history_len > HISTORY_CAPACITY {
            return Err(invalid(
                "session.history_len",
                format!("{} outside 1..={}", self.session.history_len, HISTORY_CAPACITY),
            ));
        }
        if self.session.write_timeout_ms == 0 || self.session.read_timeout_ms == 0 {
            return Err(invalid("session.*_timeout_ms", "must be positive"));
        }
        if self.calibration.datum > MAX_PAYLOAD_MAGNITUDE {
            return Err(invalid(
                "calibration.datum",
                format!("{} exceeds {}", self.calibration.datum, MAX_PAYLOAD_MAGNITUDE),
            ));
        }
        Ok(())
    }

    pub fn startup(&self) -> Startup {
        let datum = match self.calibration.mode {
            CalibrationMode::Read => DatumSource::Read,
            CalibrationMode::Auto => DatumSource::Auto,
            CalibrationMode::Manual => DatumSource::Manual(self.calibration.datum),
        };
        Startup {
            restart_sensor: self.restart_sensor,
            datum,
        }
    }
}
