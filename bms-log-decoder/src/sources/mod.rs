//! Frame sources (live bus, replayed capture, in-memory queue)
//!
//! A frame source is polled with a bounded wait by the ingest loop. Each source
//! reports a frame, an empty poll, or exhaustion; anything else is a fatal
//! `DecoderError::FrameSource`.

use crate::types::{Frame, Result};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

pub mod memory;
pub mod replay;
#[cfg(target_os = "linux")]
pub mod socketcan;

pub use memory::MemorySource;
pub use replay::{parse_candump_line, ReplaySource};
#[cfg(target_os = "linux")]
pub use self::socketcan::SocketCanSource;

/// Outcome of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    /// A frame arrived within the timeout
    Frame(Frame),
    /// Nothing arrived within the timeout; poll again
    Empty,
    /// The source has no more frames (end of a replayed capture)
    Exhausted,
}

/// Common trait for everything that delivers frames to the ingest loop
pub trait FrameSource {
    /// Wait at most `timeout` for the next frame
    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll>;

    /// Release the underlying resource. Called exactly once by `SourceGuard`.
    fn close(&mut self) {}

    /// Short description for log messages
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll> {
        (**self).poll(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll> {
        (**self).poll(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Scoped acquisition of a frame source
///
/// The wrapped source is closed exactly once: either explicitly through
/// [`SourceGuard::close`] or when the guard is dropped on any other exit path.
pub struct SourceGuard<S: FrameSource> {
    source: S,
    closed: bool,
}

impl<S: FrameSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            closed: false,
        }
    }

    /// Close the source now; later calls (and the drop) do nothing
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::debug!("Closing frame source: {}", self.source.describe());
            self.source.close();
        }
    }
}

impl<S: FrameSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.close();
    }
}
