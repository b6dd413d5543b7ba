//! Transport Traits
//!
//! The client side of the worker boundary is abstracted behind
//! [`ClientTransport`] so the same client works with an in-process worker
//! thread or a worker reached over a byte stream.
//!
//! The host side is always a [`HostEndpoint`](super::HostEndpoint): a pair of
//! channels the worker thread drives with blocking calls.

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::WorkerMessage;
use crate::requests::WorkerRequest;

/// Why a transport operation failed
#[derive(Debug, Error)]
pub enum TransportError {
    /// The worker socket could not be reached
    #[error("worker unreachable: {0}")]
    ConnectionFailed(String),
    /// The other side hung up
    #[error("worker connection closed")]
    ConnectionClosed,
    /// The outbound channel refused the request
    #[error("request not sent: {0}")]
    SendFailed(String),
    /// A frame could not be encoded or decoded
    ///
    /// From `send` this concerns that one request only; the transport is
    /// still usable.
    #[error("bad frame: {0}")]
    SerializationError(String),
    /// Used after the transport was closed
    #[error("transport unusable: {0}")]
    InvalidState(String),
    /// Frame payload does not match its CRC32
    #[error("frame crc {actual:#010x} does not match header {expected:#010x}")]
    ChecksumMismatch {
        /// CRC32 from the frame header
        expected: u32,
        /// CRC32 of the received payload
        actual: u32,
    },
}

/// Transport for the client side of the worker boundary
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Post a request to the worker
    ///
    /// `SerializationError` means this request can't be carried; any other
    /// error means the worker is unreachable.
    async fn send(&self, request: WorkerRequest) -> Result<(), TransportError>;

    /// Receive the next worker message (waits until one is available)
    ///
    /// Returns `TransportError::ConnectionClosed` once the worker is gone.
    async fn recv(&mut self) -> Result<WorkerMessage, TransportError>;
}
