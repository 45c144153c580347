//! Session state accumulation
//!
//! `SessionState` holds the last known value of each reading together with the
//! time-stamped series later handed to the report builder. It is owned by the
//! ingest loop while the session runs and moved out when the session stops.

use crate::types::{AlgorithmReading, AuxReading, Frame, LocalTimestamp, Reading};
use chrono::Local;
use serde::Serialize;
use std::time::{Duration, Instant};

/// One point of a time series: elapsed seconds since session start, value
pub type SeriesPoint = (f64, f64);

/// Last known values of all four readings (each unset until first decoded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub time_remaining_minutes: Option<f64>,
    pub state_of_charge_percent: Option<u8>,
    pub state_of_health_percent: Option<u8>,
    pub aux_voltage: Option<f64>,
}

impl SessionSnapshot {
    /// True if no reading has been decoded yet
    pub fn is_empty(&self) -> bool {
        self.time_remaining_minutes.is_none()
            && self.state_of_charge_percent.is_none()
            && self.state_of_health_percent.is_none()
            && self.aux_voltage.is_none()
    }
}

/// Mutable accumulator for one monitoring session
///
/// Series grow without bound; a session is expected to last for a bounded
/// monitoring run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    latest: SessionSnapshot,
    time_remaining: Vec<SeriesPoint>,
    state_of_charge: Vec<SeriesPoint>,
    state_of_health: Vec<SeriesPoint>,
    aux_voltage: Vec<SeriesPoint>,
}

impl SessionState {
    /// Create an empty session with all values unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a battery algorithm reading observed at `elapsed` seconds
    ///
    /// The three algorithm fields and their series are updated together.
    pub fn apply_algorithm(&mut self, elapsed: f64, reading: &AlgorithmReading) {
        self.latest.time_remaining_minutes = Some(reading.time_remaining_minutes);
        self.latest.state_of_charge_percent = Some(reading.state_of_charge_percent);
        self.latest.state_of_health_percent = Some(reading.state_of_health_percent);

        self.time_remaining
            .push((elapsed, reading.time_remaining_minutes));
        self.state_of_charge
            .push((elapsed, f64::from(reading.state_of_charge_percent)));
        self.state_of_health
            .push((elapsed, f64::from(reading.state_of_health_percent)));
    }

    /// Apply an aux battery reading observed at `elapsed` seconds
    pub fn apply_aux(&mut self, elapsed: f64, reading: &AuxReading) {
        self.latest.aux_voltage = Some(reading.voltage);
        self.aux_voltage.push((elapsed, reading.voltage));
    }

    /// Apply any decoded reading
    pub fn apply(&mut self, elapsed: f64, reading: &Reading) {
        match reading {
            Reading::Algorithm(r) => self.apply_algorithm(elapsed, r),
            Reading::Aux(r) => self.apply_aux(elapsed, r),
        }
    }

    /// Current last-known values
    pub fn snapshot(&self) -> SessionSnapshot {
        self.latest
    }

    pub fn time_remaining_series(&self) -> &[SeriesPoint] {
        &self.time_remaining
    }

    pub fn state_of_charge_series(&self) -> &[SeriesPoint] {
        &self.state_of_charge
    }

    pub fn state_of_health_series(&self) -> &[SeriesPoint] {
        &self.state_of_health
    }

    pub fn aux_voltage_series(&self) -> &[SeriesPoint] {
        &self.aux_voltage
    }
}

/// How elapsed time and record timestamps are derived for each frame
#[derive(Debug, Clone)]
pub enum TimeBase {
    /// Monotonic clock from session start, wall-clock timestamps
    Live { start: Instant },
    /// Capture times carried by the frames (replayed logs)
    Recorded {
        first: Option<crate::types::Timestamp>,
        last_elapsed: f64,
    },
}

impl TimeBase {
    /// Live time base starting now
    pub fn live() -> Self {
        TimeBase::Live {
            start: Instant::now(),
        }
    }

    /// Recorded time base; elapsed is measured from the first recorded frame
    pub fn recorded() -> Self {
        TimeBase::Recorded {
            first: None,
            last_elapsed: 0.0,
        }
    }

    /// Compute `(elapsed seconds, timestamp)` for a frame
    ///
    /// Recorded elapsed time never goes backwards, even if the capture does.
    /// In recorded mode a frame without a capture time keeps the previous
    /// elapsed value and is stamped with the current wall-clock time.
    pub fn stamp(&mut self, frame: &Frame) -> (f64, LocalTimestamp) {
        match self {
            TimeBase::Live { start } => (start.elapsed().as_secs_f64(), Local::now()),
            TimeBase::Recorded {
                first,
                last_elapsed,
            } => match frame.recorded_at {
                Some(recorded) => {
                    let origin = *first.get_or_insert(recorded);
                    let offset = (recorded - origin)
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                        .as_secs_f64();
                    *last_elapsed = last_elapsed.max(offset);
                    (*last_elapsed, recorded.with_timezone(&Local))
                }
                None => (*last_elapsed, Local::now()),
            },
        }
    }
}
