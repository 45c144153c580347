//! Ingest loop
//!
//! Drives one monitoring session: polls the frame source with a bounded wait,
//! stamps each frame relative to session start, decodes the two known parameter
//! groups, updates the session state and forwards a record to the sinks.
//!
//! The loop has two states, Running and Stopped. It stops on cancellation,
//! source exhaustion, the configured frame limit, or a fatal source error. In
//! every case the frame source is closed and the accumulated `SessionState` is
//! moved out in the `SessionOutcome`.

use crate::decoder::decode_frame;
use crate::record::FrameRecord;
use crate::session::{SessionState, TimeBase};
use crate::sources::{FrameSource, SourceGuard, SourcePoll};
use crate::types::{Frame, Reading};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default bounded wait for one poll of the frame source
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Sink receiving one appended text record per recognized frame
pub trait LogSink {
    fn write_entry(&mut self, record: &FrameRecord) -> anyhow::Result<()>;
}

/// Sink rendering the latest recognized frame for interactive viewing
pub trait DisplaySink {
    fn show(&mut self, record: &FrameRecord) -> anyhow::Result<()>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_entry(&mut self, _record: &FrameRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

impl DisplaySink for NullSink {
    fn show(&mut self, _record: &FrameRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Cooperative cancellation flag, checked between polls
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for the ingest loop
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Bounded wait per poll; also bounds cancellation latency
    pub poll_timeout: Duration,
    /// Stop after this many received frames (recognized or not)
    pub max_frames: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_frames: None,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the poll timeout
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Builder method: set the frame limit
    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub frames_received: usize,
    pub frames_recognized: usize,
    pub frames_ignored: usize,
    pub decode_errors: usize,
    pub sink_errors: usize,
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// External cancellation (user interrupt)
    Cancelled,
    /// The source has no more frames
    SourceExhausted,
    /// `max_frames` frames were received
    FrameLimit,
    /// The source failed; the session still ends in an orderly way
    SourceFailed(String),
}

impl StopReason {
    /// Only a fatal source error counts as a failed session
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::SourceFailed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::SourceExhausted => write!(f, "source exhausted"),
            StopReason::FrameLimit => write!(f, "frame limit reached"),
            StopReason::SourceFailed(e) => write!(f, "source failed: {}", e),
        }
    }
}

/// What happened to a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Decoded, applied and forwarded to the sinks
    Recognized,
    /// Unknown arbitration ID, dropped without any side effect
    Ignored,
    /// Known ID but undecodable payload; state left unchanged
    Rejected,
}

/// Final result of a session, handed over to report generation
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub stats: IngestStats,
    pub reason: StopReason,
}

#[derive(Debug, Clone, PartialEq)]
enum LoopState {
    Running,
    Stopped(StopReason),
}

/// The ingest loop for one session
pub struct IngestLoop<'a> {
    config: IngestConfig,
    time_base: TimeBase,
    cancel: CancelToken,
    state: SessionState,
    stats: IngestStats,
    log_sink: &'a mut dyn LogSink,
    display_sink: Option<&'a mut dyn DisplaySink>,
}

impl<'a> IngestLoop<'a> {
    /// Create a loop with a live time base starting now
    pub fn new(config: IngestConfig, log_sink: &'a mut dyn LogSink) -> Self {
        Self {
            config,
            time_base: TimeBase::live(),
            cancel: CancelToken::new(),
            state: SessionState::new(),
            stats: IngestStats::default(),
            log_sink,
            display_sink: None,
        }
    }

    /// Builder method: attach a display sink
    pub fn with_display(mut self, display_sink: &'a mut dyn DisplaySink) -> Self {
        self.display_sink = Some(display_sink);
        self
    }

    /// Builder method: use an externally owned cancellation token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builder method: replace the time base (e.g. recorded capture times)
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Session state accumulated so far
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Run the session until it stops, then hand over the accumulated state
    ///
    /// The source is closed exactly once before this returns.
    pub fn run<S: FrameSource>(mut self, source: S) -> SessionOutcome {
        let mut source = SourceGuard::new(source);

        log::info!("Session started on {}", source.describe());

        let reason = loop {
            if let LoopState::Stopped(reason) = self.step(&mut *source) {
                break reason;
            }
        };

        source.close();

        log::info!(
            "Session stopped ({}): {} frames received, {} recognized, {} ignored, {} decode errors",
            reason,
            self.stats.frames_received,
            self.stats.frames_recognized,
            self.stats.frames_ignored,
            self.stats.decode_errors
        );

        SessionOutcome {
            state: self.state,
            stats: self.stats,
            reason,
        }
    }

    /// One iteration: check for stop conditions, poll once, process the frame
    fn step<S: FrameSource>(&mut self, source: &mut S) -> LoopState {
        if self.cancel.is_cancelled() {
            return LoopState::Stopped(StopReason::Cancelled);
        }
        if let Some(max) = self.config.max_frames {
            if self.stats.frames_received >= max {
                return LoopState::Stopped(StopReason::FrameLimit);
            }
        }

        match source.poll(self.config.poll_timeout) {
            Ok(SourcePoll::Frame(frame)) => {
                self.process_frame(frame);
                LoopState::Running
            }
            Ok(SourcePoll::Empty) => LoopState::Running,
            Ok(SourcePoll::Exhausted) => LoopState::Stopped(StopReason::SourceExhausted),
            Err(e) => {
                log::error!("Frame source failed: {}", e);
                LoopState::Stopped(StopReason::SourceFailed(e.to_string()))
            }
        }
    }

    /// Decode a frame and, if recognized, apply it and notify the sinks
    pub fn process_frame(&mut self, frame: Frame) -> FrameDisposition {
        self.stats.frames_received += 1;
        // Stamped before the id check: ignored frames still set the recorded origin
        let (elapsed, timestamp) = self.time_base.stamp(&frame);

        let reading = match decode_frame(&frame) {
            None => {
                self.stats.frames_ignored += 1;
                return FrameDisposition::Ignored;
            }
            Some(Err(e)) => {
                log::warn!("Skipping frame 0x{:X}: {}", frame.arbitration_id, e);
                self.stats.decode_errors += 1;
                return FrameDisposition::Rejected;
            }
            Some(Ok(reading)) => reading,
        };

        self.state.apply(elapsed, &reading);
        log::trace!("0x{:X} at {:.3}s: {}", frame.arbitration_id, elapsed, reading);
        self.stats.frames_recognized += 1;

        let record = FrameRecord {
            timestamp,
            elapsed,
            arbitration_id: frame.arbitration_id,
            payload: frame.payload,
            snapshot: self.state.snapshot(),
        };
        self.dispatch(&record, &reading);

        FrameDisposition::Recognized
    }

    fn dispatch(&mut self, record: &FrameRecord, reading: &Reading) {
        if let Some(display) = self.display_sink.as_mut() {
            if let Err(e) = display.show(record) {
                log::warn!("Display sink failed for {}: {:#}", reading, e);
                self.stats.sink_errors += 1;
            }
        }

        if let Err(e) = self.log_sink.write_entry(record) {
            log::warn!("Log sink failed for {}: {:#}", reading, e);
            self.stats.sink_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{ALGORITHM_OUTPUTS_ID, AUX_BATTERY_PARAMETERS_ID};
    use crate::sources::MemorySource;

    #[derive(Default)]
    struct Recorder {
        records: Vec<FrameRecord>,
        fail: bool,
    }

    impl LogSink for Recorder {
        fn write_entry(&mut self, record: &FrameRecord) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.records.push(record.clone());
            Ok(())
        }
    }

    impl DisplaySink for Recorder {
        fn show(&mut self, record: &FrameRecord) -> anyhow::Result<()> {
            self.records.push(record.clone());
            Ok(())
        }
    }

    fn algo_frame() -> Frame {
        Frame::new(ALGORITHM_OUTPUTS_ID, vec![0x0A, 0x00, 0x32, 0x50, 0, 0, 0, 0])
    }

    fn aux_frame() -> Frame {
        Frame::new(AUX_BATTERY_PARAMETERS_ID, vec![0, 0, 0, 0, 0x10, 0x27, 0, 0])
    }

    #[test]
    fn test_unknown_id_has_no_side_effects() {
        let mut log = Recorder::default();
        let mut display = Recorder::default();
        let mut ingest = IngestLoop::new(IngestConfig::new(), &mut log).with_display(&mut display);
        ingest.process_frame(algo_frame());
        let before = ingest.state().clone();

        let disposition = ingest.process_frame(Frame::new(0x12345678, vec![0xFF; 8]));

        assert_eq!(disposition, FrameDisposition::Ignored);
        assert_eq!(ingest.state(), &before);
        assert_eq!(ingest.stats().frames_ignored, 1);
        drop(ingest);
        assert_eq!(log.records.len(), 1);
        assert_eq!(display.records.len(), 1);
    }

    #[test]
    fn test_short_payload_keeps_previous_values() {
        let mut log = Recorder::default();
        let mut ingest = IngestLoop::new(IngestConfig::new(), &mut log);
        ingest.process_frame(aux_frame());

        let disposition =
            ingest.process_frame(Frame::new(AUX_BATTERY_PARAMETERS_ID, vec![0xFF, 0xFF]));

        assert_eq!(disposition, FrameDisposition::Rejected);
        assert_eq!(ingest.state().snapshot().aux_voltage, Some(100.0));
        assert_eq!(ingest.state().aux_voltage_series().len(), 1);
        assert_eq!(ingest.stats().decode_errors, 1);
        drop(ingest);
        assert_eq!(log.records.len(), 1);
    }

    #[test]
    fn test_short_algorithm_payload_keeps_previous_values() {
        let mut log = Recorder::default();
        let mut ingest = IngestLoop::new(IngestConfig::new(), &mut log);
        ingest.process_frame(algo_frame());
        let before = ingest.state().clone();

        let disposition =
            ingest.process_frame(Frame::new(ALGORITHM_OUTPUTS_ID, vec![0xFF, 0xFF, 0xFF]));

        assert_eq!(disposition, FrameDisposition::Rejected);
        let snap = ingest.state().snapshot();
        assert_eq!(snap.time_remaining_minutes, Some(60.0));
        assert_eq!(snap.state_of_charge_percent, Some(50));
        assert_eq!(snap.state_of_health_percent, Some(80));
        assert_eq!(ingest.state().time_remaining_series().len(), 1);
        assert_eq!(ingest.state().state_of_charge_series().len(), 1);
        assert_eq!(ingest.state().state_of_health_series().len(), 1);
        assert_eq!(ingest.state(), &before);
        assert_eq!(ingest.stats().decode_errors, 1);
        drop(ingest);
        assert_eq!(log.records.len(), 1);
    }

    #[test]
    fn test_record_carries_post_update_snapshot() {
        let mut log = Recorder::default();
        let mut ingest = IngestLoop::new(IngestConfig::new(), &mut log);
        ingest.process_frame(algo_frame());
        ingest.process_frame(aux_frame());
        drop(ingest);

        let last = &log.records[1];
        assert_eq!(last.arbitration_id, AUX_BATTERY_PARAMETERS_ID);
        assert_eq!(last.snapshot.state_of_charge_percent, Some(50));
        assert_eq!(last.snapshot.aux_voltage, Some(100.0));
        assert_eq!(last.raw_hex(), "00 00 00 00 10 27 00 00");
    }

    #[test]
    fn test_sink_failure_does_not_stop_session() {
        let mut log = Recorder {
            fail: true,
            ..Default::default()
        };
        let source = MemorySource::new(vec![algo_frame(), aux_frame()]);
        let outcome = IngestLoop::new(IngestConfig::new(), &mut log).run(source);

        assert_eq!(outcome.reason, StopReason::SourceExhausted);
        assert_eq!(outcome.stats.frames_recognized, 2);
        assert_eq!(outcome.stats.sink_errors, 2);
        assert_eq!(outcome.state.snapshot().aux_voltage, Some(100.0));
    }

    #[test]
    fn test_cancellation_stops_before_polling() {
        let mut log = NullSink;
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut source = MemorySource::new(vec![algo_frame()]);

        let outcome = IngestLoop::new(IngestConfig::new(), &mut log)
            .with_cancel_token(cancel)
            .run(&mut source);

        assert_eq!(outcome.reason, StopReason::Cancelled);
        assert!(!outcome.reason.is_failure());
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.close_count(), 1);
    }

    #[test]
    fn test_empty_polls_are_not_errors() {
        let mut log = NullSink;
        let source = MemorySource::new(vec![aux_frame()]).with_empty_polls(3);
        let outcome = IngestLoop::new(IngestConfig::new(), &mut log).run(source);

        assert_eq!(outcome.reason, StopReason::SourceExhausted);
        assert_eq!(outcome.stats.frames_recognized, 1);
    }

    #[test]
    fn test_frame_limit() {
        let mut log = NullSink;
        let mut source = MemorySource::new(vec![algo_frame(), aux_frame(), algo_frame()]);
        let outcome = IngestLoop::new(IngestConfig::new().with_max_frames(Some(2)), &mut log)
            .run(&mut source);

        assert_eq!(outcome.reason, StopReason::FrameLimit);
        assert_eq!(outcome.stats.frames_received, 2);
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn test_source_failure_is_orderly() {
        let mut log = NullSink;
        let mut source = MemorySource::new(vec![aux_frame()]).with_failure("bus off");
        let outcome = IngestLoop::new(IngestConfig::new(), &mut log).run(&mut source);

        assert!(outcome.reason.is_failure());
        assert!(outcome.reason.to_string().contains("bus off"));
        assert_eq!(outcome.state.aux_voltage_series().len(), 1);
        assert_eq!(source.close_count(), 1);
    }
}
