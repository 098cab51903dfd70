//! The `PacketSource` capability and its in-memory implementations.

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::packet::Packet;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture device '{0}' not found")]
    DeviceNotFound(String),

    #[error("Invalid capture filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    /// Nothing arrived within the read timeout. Not fatal.
    #[error("Capture read timed out")]
    Timeout,

    #[error("Pcap error: {0}")]
    Pcap(#[from] pcap::Error),
}

impl CaptureError {
    /// Whether the ingestion loop should keep reading after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Timeout)
    }
}

/// Blocking packet supplier.
///
/// `Ok(None)` signals end of stream. Implementations should return
/// [`CaptureError::Timeout`] periodically while idle so the caller can
/// observe cancellation.
pub trait PacketSource: Send {
    fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError> {
        (**self).next_packet()
    }
}

/// Fixed list of packets; ends after the last one.
#[derive(Debug, Default)]
pub struct VecSource {
    packets: VecDeque<Packet>,
}

impl VecSource {
    pub fn new(packets: impl IntoIterator<Item = Packet>) -> Self {
        Self {
            packets: packets.into_iter().collect(),
        }
    }
}

impl PacketSource for VecSource {
    fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError> {
        Ok(self.packets.pop_front())
    }
}

/// Source fed through a channel. The stream ends once every sender is dropped
/// and the queue is drained.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<Packet>,
    read_timeout: Duration,
}

impl ChannelSource {
    pub fn new(read_timeout: Duration) -> (Self, Sender<Packet>) {
        let (tx, rx) = channel::unbounded();
        (Self { rx, read_timeout }, tx)
    }
}

impl PacketSource for ChannelSource {
    fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError> {
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(packet) => Ok(Some(packet)),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}
