//! Parameter group decoding
//!
//! Pure functions that map a frame payload to a typed reading. The two known
//! layouts are fixed by the protocol, so there is no signal database here: the
//! arbitration ID alone selects the layout, and every other ID is ignored.

use crate::types::{AlgorithmReading, AuxReading, DecoderError, Frame, Reading, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Arbitration ID of the battery algorithm outputs parameter group
pub const ALGORITHM_OUTPUTS_ID: u32 = 0x18FF02F3;

/// Arbitration ID of the auxiliary battery parameters group
pub const AUX_BATTERY_PARAMETERS_ID: u32 = 0x18FF00F3;

/// Minimum payload length for the algorithm outputs layout
pub const ALGORITHM_OUTPUTS_MIN_LEN: usize = 4;

/// Minimum payload length for the aux battery parameters layout
pub const AUX_BATTERY_PARAMETERS_MIN_LEN: usize = 6;

/// Time remaining raw unit is 0.1 h
const TIME_REMAINING_SCALE_MINUTES: f64 = 0.1 * 60.0;

/// Aux voltage raw unit is 0.01 V
const AUX_VOLTAGE_SCALE: f64 = 0.01;

/// The message layouts this decoder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    AlgorithmOutputs,
    AuxBatteryParameters,
}

impl Message {
    /// Look up the message layout for an arbitration ID
    pub fn from_id(arbitration_id: u32) -> Option<Self> {
        match arbitration_id {
            ALGORITHM_OUTPUTS_ID => Some(Message::AlgorithmOutputs),
            AUX_BATTERY_PARAMETERS_ID => Some(Message::AuxBatteryParameters),
            _ => None,
        }
    }

    /// Arbitration ID of this message
    pub fn id(self) -> u32 {
        match self {
            Message::AlgorithmOutputs => ALGORITHM_OUTPUTS_ID,
            Message::AuxBatteryParameters => AUX_BATTERY_PARAMETERS_ID,
        }
    }

    /// Human-readable message name
    pub fn name(self) -> &'static str {
        match self {
            Message::AlgorithmOutputs => "battery algorithm outputs",
            Message::AuxBatteryParameters => "aux battery parameters",
        }
    }
}

/// Decode the battery algorithm outputs layout
///
/// Layout (little-endian):
/// - bytes 0-1: time remaining, 0.1 h per bit
/// - byte 2: state of charge, %
/// - byte 3: state of health, %
///
/// SoC and SoH are passed through as raw bytes; values above 100 are kept.
pub fn decode_algorithm(payload: &[u8]) -> Result<AlgorithmReading> {
    require_len(Message::AlgorithmOutputs, payload, ALGORITHM_OUTPUTS_MIN_LEN)?;

    let raw_time = LittleEndian::read_u16(&payload[0..2]);

    Ok(AlgorithmReading {
        time_remaining_minutes: f64::from(raw_time) * TIME_REMAINING_SCALE_MINUTES,
        state_of_charge_percent: payload[2],
        state_of_health_percent: payload[3],
    })
}

/// Decode the aux battery parameters layout
///
/// Layout (little-endian): bytes 4-5 carry the aux voltage, 0.01 V per bit.
/// Bytes 0-3 are not used by this decoder.
pub fn decode_aux(payload: &[u8]) -> Result<AuxReading> {
    require_len(Message::AuxBatteryParameters, payload, AUX_BATTERY_PARAMETERS_MIN_LEN)?;

    let raw_voltage = LittleEndian::read_u16(&payload[4..6]);

    Ok(AuxReading {
        voltage: f64::from(raw_voltage) * AUX_VOLTAGE_SCALE,
    })
}

/// Decode a frame by dispatching on its arbitration ID
///
/// # Returns
/// * `None` if the ID is not one of the known layouts (deliberately ignored)
/// * `Some(Ok(reading))` on success
/// * `Some(Err(DecoderError::TooShort))` if the payload is too short
pub fn decode_frame(frame: &Frame) -> Option<Result<Reading>> {
    let message = Message::from_id(frame.arbitration_id)?;

    let reading = match message {
        Message::AlgorithmOutputs => decode_algorithm(&frame.payload).map(Reading::Algorithm),
        Message::AuxBatteryParameters => decode_aux(&frame.payload).map(Reading::Aux),
    };

    Some(reading)
}

/// Render a payload as space-separated uppercase hex bytes (`"0A FF"`)
pub fn format_hex(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn require_len(message: Message, payload: &[u8], required: usize) -> Result<()> {
    if payload.len() < required {
        return Err(DecoderError::TooShort {
            message: message.name(),
            required,
            actual: payload.len(),
        });
    }
    Ok(())
}
