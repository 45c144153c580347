//! BMS Log Decoder Library
//!
//! Decodes battery management frames from a CAN bus into physical readings and
//! accumulates them into a per-session state for logging and plotting.
//!
//! # Architecture
//!
//! - `decoder`: pure functions for the two known parameter groups
//!   (battery algorithm outputs and aux battery parameters)
//! - `session`: last known values plus time-stamped series
//! - `ingest`: the loop pulling frames from a source and feeding the sinks
//! - `report`: plot requests built from a finished session
//! - `sources`: SocketCAN (Linux), candump replay and in-memory frame sources
//!
//! The library does NOT write files, draw charts or clear the console. Those
//! sinks are implemented by the application layer (bms-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use bms_log_decoder::{IngestConfig, IngestLoop, NullSink, ReportBuilder, ReplaySource};
//! use std::path::Path;
//!
//! let source = ReplaySource::open(Path::new("candump.log")).unwrap();
//! let mut log_sink = NullSink;
//!
//! let outcome = IngestLoop::new(IngestConfig::new(), &mut log_sink).run(source);
//! println!("Stopped: {}", outcome.reason);
//!
//! for request in ReportBuilder::new("plots").build(&outcome.state) {
//!     println!("{} -> {:?}", request.title, request.output_path);
//! }
//! ```

// Public modules
pub mod decoder;
pub mod ingest;
pub mod record;
pub mod report;
pub mod session;
pub mod sources;
pub mod types;

// Re-export main types for convenience
pub use decoder::{
    decode_algorithm, decode_aux, decode_frame, format_hex, Message, ALGORITHM_OUTPUTS_ID,
    AUX_BATTERY_PARAMETERS_ID,
};
pub use ingest::{
    CancelToken, DisplaySink, FrameDisposition, IngestConfig, IngestLoop, IngestStats, LogSink,
    NullSink, SessionOutcome, StopReason,
};
pub use record::FrameRecord;
pub use report::{Metric, PlotRequest, PlotSink, ReportBuilder, ReportSummary};
pub use session::{SeriesPoint, SessionSnapshot, SessionState, TimeBase};
pub use sources::{FrameSource, MemorySource, ReplaySource, SourceGuard, SourcePoll};
#[cfg(target_os = "linux")]
pub use sources::SocketCanSource;
pub use types::{
    AlgorithmReading, AuxReading, DecoderError, Frame, LocalTimestamp, Reading, Result,
    Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh session has nothing to report
        let state = SessionState::new();
        assert!(ReportBuilder::new("plots").build(&state).is_empty());
        assert!(state.snapshot().is_empty());
    }
}
