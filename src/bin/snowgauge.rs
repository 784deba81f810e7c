// src/bin/snowgauge.rs
//
// Polling daemon: brings the gauge up, then prints one report per interval on
// stdout for the station software to pick up.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use snowgauge::config::CalibrationMode;
use snowgauge::tty::{configure_raw, open_tty, restore, StdDelay, TtyLink, DEFAULT_BAUD};
use snowgauge::{Config, Session};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snowgauge")]
#[command(version, about = "Poll a remote ultrasonic snow depth gauge")]
struct Cli {
    /// Configuration file (default: first of ./snowgauge.toml, /usr/local/etc, /etc)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device of the radio modem
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Restart the remote sensor before polling
    #[arg(short = 'B', long)]
    restart: bool,

    /// Let the gauge measure its own datum
    #[arg(short = 'D', long, conflicts_with = "manual_datum")]
    auto_datum: bool,

    /// Store this datum (mm) in the gauge
    #[arg(short = 's', long, value_name = "MM")]
    manual_datum: Option<u16>,

    /// Polling interval in seconds
    #[arg(short = 't', long)]
    sleep_seconds: Option<u32>,

    /// Append logs to this file instead of stderr
    #[arg(short = 'L', long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if self.restart {
            config.restart_sensor = true;
        }
        if self.auto_datum {
            config.calibration.mode = CalibrationMode::Auto;
        }
        if let Some(datum) = self.manual_datum {
            config.calibration.mode = CalibrationMode::Manual;
            config.calibration.datum = datum;
        }
        if let Some(seconds) = self.sleep_seconds {
            config.sleep_seconds = seconds;
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snowgauge=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

/// Seconds to sleep so the next poll lands on a multiple of `interval`
/// counted from midnight. A poll exactly on a boundary waits a full interval.
fn seconds_until_boundary(seconds_since_midnight: u32, interval: u32) -> u32 {
    interval - seconds_since_midnight % interval
}

fn seconds_since_midnight() -> u32 {
    let now = jiff::Zoned::now().time();
    // hour/minute/second are small non-negative values
    u32::from(now.hour().unsigned_abs()) * 3600
        + u32::from(now.minute().unsigned_abs()) * 60
        + u32::from(now.second().unsigned_abs())
}

fn sleep_to_boundary(interval: u32) {
    let seconds = seconds_until_boundary(seconds_since_midnight(), interval);
    debug!(seconds, "sleeping until next poll");
    thread::sleep(Duration::from_secs(u64::from(seconds)));
}

fn run(config: &Config, port: &File) -> color_eyre::Result<()> {
    let link = TtyLink::new(port.as_fd());
    let mut session = Session::new(link, StdDelay, config.session.clone())?;

    if let Err(e) = session.start(&config.startup()) {
        warn!(error = %e, "Error getting initial sensor values, continuing with zero-filled history");
    }

    let initial = seconds_until_boundary(seconds_since_midnight(), config.sleep_seconds);
    info!(seconds = initial, "Initial sleep");
    thread::sleep(Duration::from_secs(u64::from(initial)));

    let stdout = io::stdout();
    loop {
        let report = session.poll_cycle();
        {
            let mut out = stdout.lock();
            write!(out, "{}", report)?;
            out.flush()?;
        }

        if !report.is_complete() {
            return Err(eyre!("poll cycle incomplete: {:?}", report));
        }
        sleep_to_boundary(config.sleep_seconds);
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (mut config, source) = Config::discover(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(config.log_file.as_deref())?;
    info!(
        config = ?source,
        device = %config.device.display(),
        sleep_seconds = config.sleep_seconds,
        "Starting snowgauge"
    );

    let port = open_tty(&config.device)
        .wrap_err_with(|| format!("cannot open {}", config.device.display()))?;
    let saved = configure_raw(&port, DEFAULT_BAUD).wrap_err("Error setting serial port")?;

    let result = run(&config, &port);

    if let Err(e) = restore(&port, &saved) {
        warn!(error = %e, "could not restore serial port settings");
    }
    result
}
