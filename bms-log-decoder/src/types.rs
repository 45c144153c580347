//! Core types for the BMS log decoder library
//!
//! This module defines the values that flow through the ingest pipeline: the raw
//! frames pulled from a frame source, the typed readings the decoder produces, and
//! the error type shared by every library operation.

use chrono::{DateTime, Local, Utc};
use std::fmt;

/// Timestamp type for recorded capture times
pub type Timestamp = DateTime<Utc>;

/// Wall-clock timestamp shown in log and display records
pub type LocalTimestamp = DateTime<Local>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Raw CAN frame as delivered by a frame source
///
/// Frames are immutable once received and are not retained past the ingest
/// iteration that processes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Arbitration ID (29-bit extended IDs are stored without flag bits)
    pub arbitration_id: u32,
    /// Frame payload bytes
    pub payload: Vec<u8>,
    /// Capture time recorded by the source, if it has one (replayed logs do)
    pub recorded_at: Option<Timestamp>,
}

impl Frame {
    /// Create a frame received live, without a recorded timestamp
    pub fn new(arbitration_id: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            arbitration_id,
            payload: payload.into(),
            recorded_at: None,
        }
    }

    /// Builder method: attach a recorded capture time
    pub fn with_recorded_at(mut self, recorded_at: Timestamp) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Get the data length code (DLC) - number of payload bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }
}

/// Battery algorithm outputs (time remaining, SoC, SoH)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmReading {
    /// Estimated time remaining in minutes (fractional, never rounded)
    pub time_remaining_minutes: f64,
    /// State of charge, raw byte value (not clamped to 0-100)
    pub state_of_charge_percent: u8,
    /// State of health, raw byte value (not clamped to 0-100)
    pub state_of_health_percent: u8,
}

/// Auxiliary battery parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxReading {
    /// Auxiliary battery voltage in volts
    pub voltage: f64,
}

/// A decoded reading from one of the two known parameter groups
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Algorithm(AlgorithmReading),
    Aux(AuxReading),
}

/// Errors that can occur while decoding or acquiring frames
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Payload too short for {message}: need {required} bytes, got {actual}")]
    TooShort {
        message: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("Invalid replay line {line}: {reason}")]
    InvalidReplayLine { line: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Algorithm(r) => write!(
                f,
                "time_remaining={:.1}min soc={}% soh={}%",
                r.time_remaining_minutes, r.state_of_charge_percent, r.state_of_health_percent
            ),
            Reading::Aux(r) => write!(f, "aux_voltage={:.2}V", r.voltage),
        }
    }
}
