//! Replay of candump log files
//!
//! Reads captures written by `candump -l` (or `candump -L`), one frame per line:
//!
//! ```text
//! (1697040000.123456) can0 18FF02F3#0A00325000000000
//! ```
//!
//! The recorded capture time is carried on every frame so the ingest loop can
//! reproduce the original session timing. Remote frames are skipped; blank lines
//! and `#` comments are ignored.

use super::{FrameSource, SourcePoll};
use crate::types::{DecoderError, Frame, Result, Timestamp};
use chrono::DateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

/// Frame source replaying a candump capture
pub struct ReplaySource<R: BufRead = BufReader<File>> {
    lines: std::io::Lines<R>,
    line_no: usize,
    origin: String,
    frames_read: usize,
}

impl ReplaySource<BufReader<File>> {
    /// Open a candump log file
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening candump capture: {:?}", path);

        if !path.exists() {
            return Err(DecoderError::FrameSource(format!(
                "Capture file not found: {:?}",
                path
            )));
        }

        let file = File::open(path).map_err(|e| {
            DecoderError::FrameSource(format!("Failed to open capture file: {}", e))
        })?;

        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> ReplaySource<R> {
    /// Replay from any buffered reader (used in tests)
    pub fn from_reader(reader: R, origin: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            origin: origin.into(),
            frames_read: 0,
        }
    }

    /// Frames delivered so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line?,
                None => {
                    log::info!(
                        "Capture {} exhausted after {} frames",
                        self.origin,
                        self.frames_read
                    );
                    return Ok(SourcePoll::Exhausted);
                }
            };
            self.line_no += 1;

            if let Some(frame) = parse_candump_line(&line, self.line_no)? {
                self.frames_read += 1;
                return Ok(SourcePoll::Frame(frame));
            }
        }
    }

    fn describe(&self) -> String {
        format!("replay {}", self.origin)
    }
}

/// Parse one candump log line
///
/// # Returns
/// * `Ok(Some(frame))` for a data frame
/// * `Ok(None)` for blank lines, comments and remote frames
/// * `Err(DecoderError::InvalidReplayLine)` for anything malformed
pub fn parse_candump_line(line: &str, line_no: usize) -> Result<Option<Frame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let invalid = |reason: &str| DecoderError::InvalidReplayLine {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut parts = line.split_whitespace();
    let time_field = parts.next().ok_or_else(|| invalid("missing timestamp"))?;
    let _interface = parts.next().ok_or_else(|| invalid("missing interface"))?;
    let frame_field = parts.next().ok_or_else(|| invalid("missing frame"))?;

    let time_field = time_field
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| invalid("timestamp must be wrapped in parentheses"))?;
    let recorded_at = parse_timestamp(time_field).ok_or_else(|| invalid("bad timestamp"))?;

    let (id_text, data_text) = frame_field
        .split_once('#')
        .ok_or_else(|| invalid("frame must be <id>#<data>"))?;

    let arbitration_id = u32::from_str_radix(id_text, 16)
        .map_err(|_| invalid("arbitration id is not hex"))?;
    if arbitration_id > 0x1FFF_FFFF {
        return Err(invalid("arbitration id exceeds 29 bits"));
    }

    let data_text = if data_text.starts_with('R') {
        log::trace!("Skipping remote frame on line {}", line_no);
        return Ok(None);
    } else if let Some(fd) = data_text.strip_prefix('#') {
        // CAN FD: one flags nibble precedes the data
        fd.get(1..).ok_or_else(|| invalid("missing CAN FD flags"))?
    } else {
        data_text
    };

    let payload = parse_hex_bytes(data_text).ok_or_else(|| invalid("payload is not hex"))?;

    Ok(Some(
        Frame::new(arbitration_id, payload).with_recorded_at(recorded_at),
    ))
}

fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let (secs, frac) = text.split_once('.').unwrap_or((text, "0"));
    let secs: i64 = secs.parse().ok()?;

    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u32 = format!("{:0<9}", frac).parse().ok()?;

    DateTime::from_timestamp(secs, nanos)
}

fn parse_hex_bytes(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
