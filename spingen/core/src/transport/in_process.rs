//! In-Process Transport
//!
//! Channel-based communication between the client and a worker thread in the
//! same process. This is the default: the worker host runs on a dedicated OS
//! thread and talks to the client through a pair of tokio channels.
//!
//! Requests are unbounded so the client never waits on the worker to accept
//! work; replies are bounded by the configured capacity.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, endpoint) = InProcessTransport::new_pair();
//!
//! // Give the endpoint to the worker host
//! let worker = WorkerHost::spawn(engine, endpoint, &config)?;
//!
//! // Use the transport in the client
//! let client = SpingenClient::connect(transport);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::messages::WorkerMessage;
use crate::requests::WorkerRequest;

use super::traits::{ClientTransport, TransportError};

/// Default capacity of the reply channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Worker side of a transport: requests in, messages out
///
/// Driven with blocking calls from the worker thread. Must not be used from
/// inside an async task.
#[derive(Debug)]
pub struct HostEndpoint {
    requests: mpsc::UnboundedReceiver<WorkerRequest>,
    replies: mpsc::Sender<WorkerMessage>,
}

impl HostEndpoint {
    /// Assemble an endpoint from its two channel halves
    #[must_use]
    pub fn new(
        requests: mpsc::UnboundedReceiver<WorkerRequest>,
        replies: mpsc::Sender<WorkerMessage>,
    ) -> Self {
        Self { requests, replies }
    }

    /// Wait for the next request; `None` once the client is gone
    pub fn blocking_recv(&mut self) -> Option<WorkerRequest> {
        self.requests.blocking_recv()
    }

    /// Post a message to the client, waiting for channel capacity
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` if the client is gone.
    pub fn blocking_send(&self, msg: WorkerMessage) -> Result<(), TransportError> {
        self.replies
            .blocking_send(msg)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Whether the client side has hung up
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.replies.is_closed()
    }
}

/// In-process transport using tokio channels
///
/// Messages are moved, never serialized.
pub struct InProcessTransport {
    /// Channel to send requests to the worker
    request_tx: mpsc::UnboundedSender<WorkerRequest>,
    /// Channel to receive messages from the worker
    msg_rx: mpsc::Receiver<WorkerMessage>,
    /// Connection state
    connected: Arc<AtomicBool>,
}

impl InProcessTransport {
    /// Create a new in-process transport pair
    ///
    /// Returns:
    /// - `InProcessTransport`: use this in the client
    /// - `HostEndpoint`: hand this to the worker host
    #[must_use]
    pub fn new_pair() -> (Self, HostEndpoint) {
        Self::new_pair_with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create with a custom reply channel capacity
    #[must_use]
    pub fn new_pair_with_capacity(capacity: usize) -> (Self, HostEndpoint) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::channel(capacity.max(1));

        let transport = Self {
            request_tx,
            msg_rx,
            connected: Arc::new(AtomicBool::new(true)),
        };

        (transport, HostEndpoint::new(request_rx, msg_tx))
    }
}

#[async_trait]
impl ClientTransport for InProcessTransport {
    async fn send(&self, request: WorkerRequest) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidState(
                "Transport not connected".to_string(),
            ));
        }

        self.request_tx
            .send(request)
            .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))
    }

    async fn recv(&mut self) -> Result<WorkerMessage, TransportError> {
        match self.msg_rx.recv().await {
            Some(msg) => Ok(msg),
            None => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::ConnectionClosed)
            }
        }
    }
}
