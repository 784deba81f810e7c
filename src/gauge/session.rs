// src/gauge/session.rs

use super::sync_gauge::{LinkTimeouts, SyncGauge};
use crate::common::{
    error::GaugeError,
    hal_traits::GaugeLink,
    history::{History, HistoryLenError, DEFAULT_HISTORY_LEN, HISTORY_CAPACITY},
    stats,
    timing,
};
use core::fmt;
use embedded_hal::delay::DelayNs;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Tunables consumed by the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Protocol retry budget; R allows up to R + 1 attempts per operation.
    pub retry_count: u16,
    /// Outlier threshold in population standard deviations.
    pub stdev_filter: u16,
    pub history_len: usize,
    pub write_timeout_ms: u16,
    pub read_timeout_ms: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retry_count: 10,
            stdev_filter: 6,
            history_len: DEFAULT_HISTORY_LEN,
            write_timeout_ms: timing::WRITE_TIMEOUT_MS,
            read_timeout_ms: timing::READ_TIMEOUT_MS,
        }
    }
}

impl SessionSettings {
    pub fn timeouts(&self) -> LinkTimeouts {
        LinkTimeouts {
            write_ms: self.write_timeout_ms,
            read_ms: self.read_timeout_ms,
        }
    }
}

/// Verdict on one raw depth sample against the current history.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Screening {
    /// The sample after datum substitution.
    pub value: i32,
    /// Rounded mean of the history the sample was judged against.
    pub average: i32,
    pub datum_substituted: bool,
    /// `|value| >= multiplier * stddev + |average|`
    pub outlier: bool,
}

/// Applies the datum substitution and outlier test to `raw` without touching
/// `history`.
///
/// A reading equal to `datum` means "sensor at calibration zero" and is
/// replaced by the history's rounded mean before the outlier test runs.
pub fn screen_sample(history: &History, raw: i32, datum: Option<i32>, multiplier: u16) -> Screening {
    let average = history.rounded_mean();
    let datum_substituted = datum == Some(raw);
    let value = if datum_substituted { average } else { raw };

    let limit = f64::from(multiplier) * history.population_stddev() + f64::from(average.unsigned_abs());
    let outlier = f64::from(value.unsigned_abs()) >= limit;

    Screening {
        value,
        average,
        datum_substituted,
        outlier,
    }
}

/// Where the session's calibration datum comes from at start-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DatumSource {
    /// Ask the gauge for the datum it already holds (`G`).
    Read,
    /// Let the gauge measure its own datum (`C`).
    Auto,
    /// Store this value as the datum (`S`).
    Manual(u16),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Startup {
    pub restart_sensor: bool,
    pub datum: DatumSource,
}

impl Default for Startup {
    fn default() -> Self {
        Self {
            restart_sensor: false,
            datum: DatumSource::Read,
        }
    }
}

/// Result of one polling cycle. `None` marks a quantity that could not be read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Filtered and smoothed depth, millimetres.
    pub depth_mm: Option<i32>,
    /// Battery voltage, centivolts.
    pub voltage_cv: Option<i32>,
    pub charger_status: Option<i32>,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.depth_mm.is_some() && self.voltage_cv.is_some() && self.charger_status.is_some()
    }
}

// One `data<index> <value>` line per quantity. A failed quantity still takes
// its index but prints nothing. Depth and charger status are scaled by 100;
// the gauge already reports voltage in centivolts.
impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = [
            self.depth_mm.map(|d| d.saturating_mul(100)),
            self.voltage_cv,
            self.charger_status.map(|c| c.saturating_mul(100)),
        ];
        for (index, value) in values.iter().enumerate() {
            if let Some(value) = value {
                writeln!(f, "data{} {}", index, value)?;
            }
        }
        Ok(())
    }
}

/// Long-lived owner of the gauge, the reading history and the datum.
#[derive(Debug)]
pub struct Session<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    gauge: SyncGauge<IF, D>,
    history: History,
    settings: SessionSettings,
    datum: Option<i32>,
}

impl<IF, D> Session<IF, D>
where
    IF: GaugeLink,
    D: DelayNs,
{
    /// Creates a session with a zero-filled history of `settings.history_len`.
    pub fn new(interface: IF, delay: D, settings: SessionSettings) -> Result<Self, HistoryLenError> {
        let history = History::zeroed(settings.history_len)?;
        let gauge = SyncGauge::with_timeouts(interface, delay, settings.timeouts());
        Ok(Self::from_parts(gauge, history, settings))
    }

    /// Resumes with an existing history. Its length wins over `settings.history_len`.
    pub fn from_parts(gauge: SyncGauge<IF, D>, history: History, settings: SessionSettings) -> Self {
        Session {
            gauge,
            history,
            settings,
            datum: None,
        }
    }

    pub fn gauge(&self) -> &SyncGauge<IF, D> {
        &self.gauge
    }

    pub fn gauge_mut(&mut self) -> &mut SyncGauge<IF, D> {
        &mut self.gauge
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn datum(&self) -> Option<i32> {
        self.datum
    }

    pub fn set_datum(&mut self, datum: Option<i32>) {
        self.datum = datum;
    }

    pub fn into_gauge(self) -> SyncGauge<IF, D> {
        self.gauge
    }

    /// Brings the gauge up and fills the history.
    ///
    /// Restart, firmware and datum failures are logged and tolerated. The
    /// returned error only reports a history fill that found no valid sample;
    /// the session is still usable afterwards.
    pub fn start(&mut self, startup: &Startup) -> Result<(), GaugeError<IF::Error>> {
        if startup.restart_sensor {
            if let Err(e) = self.gauge.restart() {
                warn!(error = %e, "Remote restart of sensor failed");
            }
            self.gauge.pause(timing::RESTART_DELAY);
        } else {
            self.gauge.pause(timing::WAKEUP_DELAY);
        }

        match self.gauge.firmware_text() {
            Ok(lines) if lines.is_empty() => warn!("gauge sent no firmware text"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not read firmware text"),
        }

        self.datum = self.establish_datum(startup.datum);
        self.fill_history()
    }

    fn establish_datum(&mut self, source: DatumSource) -> Option<i32> {
        let retry_count = self.settings.retry_count;
        match source {
            DatumSource::Manual(value) => {
                match self.gauge.set_manual_calibration(value, retry_count) {
                    Ok(echo) => info!(datum = echo, "Set sensor datum"),
                    Err(e) => warn!(datum = value, error = %e, "Set sensor datum failed"),
                }
                Some(i32::from(value))
            }
            DatumSource::Auto => match self.gauge.set_auto_calibration(retry_count) {
                Ok(datum) => {
                    info!(datum, "Auto sensor datum set");
                    Some(datum)
                }
                Err(e) => {
                    warn!(error = %e, "Auto sensor datum failed");
                    None
                }
            },
            DatumSource::Read => match self.gauge.get_calibration(retry_count) {
                Ok(datum) => {
                    info!(datum, "Datum value");
                    Some(datum)
                }
                Err(e) => {
                    warn!(error = %e, "Error getting datum value from sensor");
                    None
                }
            },
        }
    }

    /// Replaces every history slot with a fresh depth read.
    ///
    /// A failed read, or one equal to the datum, is backfilled with the rounded
    /// mean of the slots already placed; slots before the first valid read take
    /// that read. If no read is valid the history is left untouched and
    /// `HistoryUnavailable` is returned.
    pub fn fill_history(&mut self) -> Result<(), GaugeError<IF::Error>> {
        let len = self.history.len();
        let mut buffer = [0i32; HISTORY_CAPACITY];
        let samples = &mut buffer[..len];
        let mut seen_valid = false;

        for slot in 0..len {
            match self.fill_sample(slot) {
                Some(depth) => {
                    if !seen_valid {
                        samples[..slot].fill(depth);
                        seen_valid = true;
                    }
                    samples[slot] = depth;
                }
                None if seen_valid => {
                    samples[slot] = stats::rounded_mean(&samples[..slot]);
                }
                None => {}
            }
        }

        if !seen_valid {
            warn!(len, "Error getting initial sensor values");
            return Err(GaugeError::HistoryUnavailable);
        }

        self.history.slots_mut().copy_from_slice(samples);
        info!(history = ?self.history.as_slice(), "reading history filled");
        Ok(())
    }

    fn fill_sample(&mut self, slot: usize) -> Option<i32> {
        match self.gauge.get_depth(self.settings.retry_count) {
            Ok(depth) if Some(depth) == self.datum => {
                debug!(slot, depth, "reading at datum, backfilling");
                None
            }
            Ok(depth) => Some(depth),
            Err(e) => {
                warn!(slot, error = %e, "depth read failed, backfilling");
                None
            }
        }
    }

    /// Runs `raw` through datum substitution, the outlier test and the moving
    /// average. Returns the rounded smoothed depth.
    ///
    /// An outlier re-seeds the whole history from fresh reads and is replaced
    /// by the re-seeded history's rounded mean.
    pub fn accept_depth(&mut self, raw: i32) -> i32 {
        let screening = screen_sample(&self.history, raw, self.datum, self.settings.stdev_filter);
        if screening.datum_substituted {
            debug!(raw, average = screening.average, "reading at datum, using average");
        }

        let accepted = if screening.outlier {
            warn!("Snow depth reading out of range. Reinitializing sensor");
            if let Err(e) = self.fill_history() {
                warn!(error = %e, "re-seed failed, keeping previous history");
            }
            let average = self.history.rounded_mean();
            info!(
                depth = screening.value,
                average, "Snow depth reading out of range per filtering rules. Using new average"
            );
            average
        } else {
            screening.value
        };

        // f64 -> i32 saturates; the window holds i32 values so the mean fits.
        self.history.push(accepted).round() as i32
    }

    /// Reads one depth and returns it filtered and smoothed.
    pub fn read_filtered_depth(&mut self) -> Result<i32, GaugeError<IF::Error>> {
        let raw = self.gauge.get_depth(self.settings.retry_count)?;
        Ok(self.accept_depth(raw))
    }

    /// Reads depth, voltage and charger status, then filters the depth.
    pub fn poll_cycle(&mut self) -> CycleReport {
        let retry_count = self.settings.retry_count;
        let depth = self.gauge.get_depth(retry_count);
        let voltage = self.gauge.get_voltage(retry_count);
        let charger = self.gauge.get_charger_status(retry_count);

        let depth_mm = match depth {
            Ok(raw) => Some(self.accept_depth(raw)),
            Err(e) => {
                warn!(error = %e, "Error reading raw snow depth");
                None
            }
        };
        let voltage_cv = voltage
            .map_err(|e| warn!(error = %e, "Error reading raw battery volts"))
            .ok();
        let charger_status = charger
            .map_err(|e| warn!(error = %e, "Error reading raw charger status"))
            .ok();

        let report = CycleReport {
            depth_mm,
            voltage_cv,
            charger_status,
        };
        debug!(?report, "poll cycle complete");
        report
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock::{MockLink, RecordingDelay};

    const REFERENCE: [i32; 10] = [80, 77, 81, 83, 84, 75, 76, 84, 77, 76];

    fn settings(history_len: usize, stdev_filter: u16) -> SessionSettings {
        SessionSettings {
            retry_count: 0,
            stdev_filter,
            history_len,
            ..SessionSettings::default()
        }
    }

    fn session_with(link: MockLink, history: &[i32], stdev_filter: u16) -> Session<MockLink, RecordingDelay> {
        let gauge = SyncGauge::new(link, RecordingDelay::default());
        let settings = settings(history.len(), stdev_filter);
        Session::from_parts(gauge, History::from_slice(history).unwrap(), settings)
    }

    #[test]
    fn test_settings_defaults() {
        let s = SessionSettings::default();
        assert_eq!(s.retry_count, 10);
        assert_eq!(s.stdev_filter, 6);
        assert_eq!(s.history_len, 10);
        assert_eq!(s.timeouts(), LinkTimeouts { write_ms: 500, read_ms: 500 });
    }

    #[test]
    fn test_new_rejects_bad_history_len() {
        let result = Session::new(MockLink::new(), RecordingDelay::default(), settings(0, 6));
        assert!(matches!(result, Err(HistoryLenError(0))));
    }

    #[test]
    fn test_screen_reference_outlier() {
        let history = History::from_slice(&REFERENCE).unwrap();
        let s = screen_sample(&history, 3353, None, 3);
        assert_eq!(s.average, 79);
        assert!(s.outlier);
        assert!(!s.datum_substituted);
    }

    #[test]
    fn test_screen_ordinary_sample() {
        let history = History::from_slice(&REFERENCE).unwrap();
        let s = screen_sample(&history, 82, Some(5000), 3);
        assert_eq!(s.value, 82);
        assert!(!s.outlier);
    }

    #[test]
    fn test_screen_negative_outlier() {
        let history = History::from_slice(&REFERENCE).unwrap();
        assert!(screen_sample(&history, -3353, None, 3).outlier);
    }

    #[test]
    fn test_datum_reading_replaced_by_average() {
        let mut session = session_with(MockLink::new(), &REFERENCE, 3);
        session.set_datum(Some(5000));

        // 5000 becomes 79 and is pushed; (793 - 80 + 79) / 10 = 79.2
        assert_eq!(session.accept_depth(5000), 79);
        assert_eq!(session.history().as_slice()[9], 79);
        assert_eq!(session.gauge().interface().discard_calls, 0);
    }

    #[test]
    fn test_outlier_reseeds_history() {
        let mut link = MockLink::new();
        link.script(std::iter::repeat(b"D0079").take(10));
        let mut session = session_with(link, &REFERENCE, 3);

        assert_eq!(session.accept_depth(3353), 79);
        assert_eq!(session.history().as_slice(), &[79; 10]);
        assert_eq!(session.gauge().interface().written, b"DDDDDDDDDD");
    }

    #[test]
    fn test_outlier_with_failed_reseed_uses_old_average() {
        let mut session = session_with(MockLink::new(), &REFERENCE, 3);

        assert_eq!(session.accept_depth(3353), 79);
        assert_eq!(&session.history().as_slice()[..9], &REFERENCE[1..]);
        assert_eq!(session.history().as_slice()[9], 79);
    }

    #[test]
    fn test_fill_history_backfills() {
        let mut link = MockLink::new();
        link.script([&b""[..], &b"D0100"[..], &b"D5000"[..], &b"D0104"[..], &b"D0103"[..]]);
        let mut session = session_with(link, &[0; 5], 6);
        session.set_datum(Some(5000));

        session.fill_history().unwrap();
        assert_eq!(session.history().as_slice(), &[100, 100, 100, 104, 103]);
    }

    #[test]
    fn test_fill_history_backfill_uses_placed_mean() {
        let mut link = MockLink::new();
        link.script([&b"D0100"[..], &b"D0105"[..], &b"X"[..]]);
        let mut session = session_with(link, &[0; 3], 6);

        session.fill_history().unwrap();
        // round(102.5) = 103
        assert_eq!(session.history().as_slice(), &[100, 105, 103]);
    }

    #[test]
    fn test_fill_history_all_failed() {
        let mut session = session_with(MockLink::new(), &[7, 8, 9], 6);

        assert!(matches!(session.fill_history(), Err(GaugeError::HistoryUnavailable)));
        assert_eq!(session.history().as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn test_start_with_restart_and_manual_datum() {
        let mut link = MockLink::new();
        link.script([
            &b""[..],
            &b"Snow Depth Gauge\r\n"[..],
            &b"S1234"[..],
            &b"D0100"[..],
            &b"D0102"[..],
        ]);
        let mut session = session_with(link, &[0, 0], 6);
        let startup = Startup {
            restart_sensor: true,
            datum: DatumSource::Manual(1234),
        };

        session.start(&startup).unwrap();
        assert_eq!(session.datum(), Some(1234));
        assert_eq!(session.history().as_slice(), &[100, 102]);

        let (link, delay) = session.into_gauge().into_parts();
        assert_eq!(link.written, b"BAS1234\nSDD");
        assert_eq!(delay.calls, vec![120_000, 10_000, 10_000, 15_000, 15_000]);
    }

    #[test]
    fn test_start_reads_datum_and_reports_fill_failure() {
        let mut link = MockLink::new();
        link.script([&b""[..], &b"G4990"[..]]);
        let mut session = session_with(link, &[0, 0], 6);

        assert!(matches!(
            session.start(&Startup::default()),
            Err(GaugeError::HistoryUnavailable)
        ));
        assert_eq!(session.datum(), Some(4990));
        assert_eq!(session.history().as_slice(), &[0, 0]);

        let (link, delay) = session.into_gauge().into_parts();
        assert_eq!(link.written, b"AGDD");
        assert_eq!(delay.calls[0], 10_000);
    }

    #[test]
    fn test_start_auto_datum_failure_leaves_no_datum() {
        let mut link = MockLink::new();
        link.script([&b""[..], &b"X"[..], &b"D0100"[..]]);
        let mut session = session_with(link, &[0], 6);
        let startup = Startup {
            restart_sensor: false,
            datum: DatumSource::Auto,
        };

        session.start(&startup).unwrap();
        assert_eq!(session.datum(), None);
        assert_eq!(session.history().as_slice(), &[100]);
    }

    #[test]
    fn test_poll_cycle_report() {
        let mut link = MockLink::new();
        link.script([&b"D0080"[..], &b"V0412"[..], &b"T0001"[..]]);
        let mut session = session_with(link, &REFERENCE, 6);

        let report = session.poll_cycle();
        assert!(report.is_complete());
        assert_eq!(report.depth_mm, Some(79));
        assert_eq!(report.to_string(), "data0 7900\ndata1 412\ndata2 100\n");
    }

    #[test]
    fn test_poll_cycle_failed_depth_keeps_index() {
        let mut link = MockLink::new();
        link.script([&b"X"[..], &b"V0412"[..], &b"T0000"[..]]);
        let mut session = session_with(link, &REFERENCE, 6);

        let report = session.poll_cycle();
        assert!(!report.is_complete());
        assert_eq!(report.depth_mm, None);
        assert_eq!(report.to_string(), "data1 412\ndata2 0\n");
        assert_eq!(session.history().as_slice(), &REFERENCE);
    }

    #[test]
    fn test_read_filtered_depth() {
        let mut link = MockLink::new();
        link.script([b"D0090"]);
        let mut session = session_with(link, &REFERENCE, 6);

        // (793 - 80 + 90) / 10 = 80.3
        assert_eq!(session.read_filtered_depth().unwrap(), 80);
    }
}
