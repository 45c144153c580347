//! In-memory frame source
//!
//! Serves a fixed queue of frames, then reports exhaustion (or a configured
//! fatal error). Used for demos and for driving the ingest loop in tests.

use super::{FrameSource, SourcePoll};
use crate::types::{DecoderError, Frame, Result};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
    failure: Option<String>,
    empty_polls: usize,
    close_count: usize,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Builder method: fail with a fatal source error once the queue drains
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Builder method: report `count` empty polls before the first frame
    pub fn with_empty_polls(mut self, count: usize) -> Self {
        self.empty_polls = count;
        self
    }

    /// Number of times the source has been closed
    pub fn close_count(&self) -> usize {
        self.close_count
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn poll(&mut self, _timeout: Duration) -> Result<SourcePoll> {
        if self.empty_polls > 0 {
            self.empty_polls -= 1;
            return Ok(SourcePoll::Empty);
        }

        match self.frames.pop_front() {
            Some(frame) => Ok(SourcePoll::Frame(frame)),
            None => match &self.failure {
                Some(message) => Err(DecoderError::FrameSource(message.clone())),
                None => Ok(SourcePoll::Exhausted),
            },
        }
    }

    fn close(&mut self) {
        self.close_count += 1;
    }

    fn describe(&self) -> String {
        format!("memory ({} frames queued)", self.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_order_and_exhaustion() {
        let mut source = MemorySource::new(vec![Frame::new(1, vec![]), Frame::new(2, vec![])])
            .with_empty_polls(1);
        let timeout = Duration::from_millis(1);

        assert_eq!(source.poll(timeout).unwrap(), SourcePoll::Empty);
        assert_eq!(source.poll(timeout).unwrap(), SourcePoll::Frame(Frame::new(1, vec![])));
        assert_eq!(source.poll(timeout).unwrap(), SourcePoll::Frame(Frame::new(2, vec![])));
        assert_eq!(source.poll(timeout).unwrap(), SourcePoll::Exhausted);
    }

    #[test]
    fn test_memory_source_failure() {
        let mut source = MemorySource::new(vec![]).with_failure("bus off");
        let err = source.poll(Duration::from_millis(1)).unwrap_err();
        assert!(err.to_string().contains("bus off"));
    }
}
