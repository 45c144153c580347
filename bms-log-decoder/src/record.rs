//! Per-frame records handed to the logging and display sinks
//!
//! The text layout produced by `FrameRecord`'s `Display` impl is consumed by
//! downstream log parsers and must stay byte-stable.

use crate::decoder::format_hex;
use crate::session::SessionSnapshot;
use crate::types::LocalTimestamp;
use std::fmt;

/// Separator line closing every record
pub const RECORD_SEPARATOR: &str = "----------------------------------------";

/// Everything a sink needs to render one recognized frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Wall-clock (or recorded) time of the frame
    pub timestamp: LocalTimestamp,
    /// Seconds since session start
    pub elapsed: f64,
    pub arbitration_id: u32,
    pub payload: Vec<u8>,
    /// Session values after applying this frame
    pub snapshot: SessionSnapshot,
}

impl FrameRecord {
    /// Payload as space-separated uppercase hex
    pub fn raw_hex(&self) -> String {
        format_hex(&self.payload)
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timestamp: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Elapsed Time: {:.2} seconds", self.elapsed)?;
        writeln!(f, "Arbitration ID: 0x{:X}", self.arbitration_id)?;
        writeln!(f, "Raw Data: {}", self.raw_hex())?;

        let snap = &self.snapshot;
        if let Some(minutes) = snap.time_remaining_minutes {
            writeln!(f, "Time Remaining: {:.1} minutes", minutes)?;
        }
        if let Some(soc) = snap.state_of_charge_percent {
            writeln!(f, "State of Charge (SoC): {}%", soc)?;
        }
        if let Some(soh) = snap.state_of_health_percent {
            writeln!(f, "State of Health (SoH): {}%", soh)?;
        }
        if let Some(voltage) = snap.aux_voltage {
            writeln!(f, "Aux Battery Voltage: {:.2} VDC", voltage)?;
        }

        writeln!(f, "{}", RECORD_SEPARATOR)
    }
}
