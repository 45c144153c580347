//! SocketCAN live bus source (Linux only)
//!
//! The interface must already be up, e.g.:
//!   sudo ip link set can0 up type can bitrate 250000

use super::{FrameSource, SourcePoll};
use crate::types::{DecoderError, Frame, Result};
use ::socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame as _, Socket};
use std::io::ErrorKind;
use std::time::Duration;

/// Live frame source reading a classic CAN socket
pub struct SocketCanSource {
    interface: String,
    socket: Option<CanSocket>,
    read_timeout: Option<Duration>,
}

impl SocketCanSource {
    /// Open a CAN socket on the named interface (e.g. "can0", "vcan0")
    pub fn open(interface: &str) -> Result<Self> {
        log::info!("Opening CAN interface: {}", interface);

        let socket = CanSocket::open(interface).map_err(|e| {
            DecoderError::FrameSource(format!("Failed to open {}: {}", interface, e))
        })?;

        log::info!("Connected to CAN interface: {}", interface);

        Ok(Self {
            interface: interface.to_string(),
            socket: Some(socket),
            read_timeout: None,
        })
    }
}

impl FrameSource for SocketCanSource {
    fn poll(&mut self, timeout: Duration) -> Result<SourcePoll> {
        let socket = self.socket.as_ref().ok_or_else(|| {
            DecoderError::FrameSource(format!("{} is already closed", self.interface))
        })?;

        if self.read_timeout != Some(timeout) {
            socket.set_read_timeout(timeout).map_err(|e| {
                DecoderError::FrameSource(format!("set read timeout: {}", e))
            })?;
            self.read_timeout = Some(timeout);
        }

        match socket.read_frame() {
            Ok(CanFrame::Data(frame)) => Ok(SourcePoll::Frame(Frame::new(
                frame.raw_id() & 0x1FFF_FFFF,
                frame.data().to_vec(),
            ))),
            Ok(CanFrame::Remote(_)) => Ok(SourcePoll::Empty),
            Ok(CanFrame::Error(frame)) => {
                log::debug!("Received CAN error frame: {:?}", frame);
                Ok(SourcePoll::Empty)
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(SourcePoll::Empty),
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(SourcePoll::Empty),
            Err(e) => Err(DecoderError::FrameSource(format!(
                "Read error on {}: {}",
                self.interface, e
            ))),
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            log::info!("Closed CAN interface: {}", self.interface);
        }
    }

    fn describe(&self) -> String {
        format!("socketcan {}", self.interface)
    }
}
