//! Framed Stream Transport
//!
//! Carries envelopes over any byte stream (Unix socket, pipe, in-memory
//! duplex) using the [`frame`](super::frame) format. Used when the worker host
//! runs in another process.
//!
//! Each side spawns a read task (stream → channel) and a write task
//! (channel → stream), so the client and host keep working with plain
//! channels regardless of where the peer lives.
//!
//! Every envelope either reaches the peer or turns into an error for its
//! `seq`:
//! - a request that can't be framed fails `send` and never leaves the client
//! - a reply that can't be framed is replaced by a `LoadError` or
//!   `GenerateError` for the same `seq`
//! - an inbound frame that can't be decoded ends the connection, since the
//!   stream can no longer be trusted to line up with frame boundaries

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::messages::WorkerMessage;
use crate::requests::WorkerRequest;

use super::frame::{encode, FrameDecoder};
use super::in_process::HostEndpoint;
use super::traits::{ClientTransport, TransportError};

/// Read buffer size per `read` call
const READ_CHUNK: usize = 16 * 1024;

/// Client transport speaking frames over a byte stream
pub struct FramedTransport {
    frame_tx: mpsc::Sender<Vec<u8>>,
    msg_rx: mpsc::Receiver<WorkerMessage>,
    connected: Arc<AtomicBool>,
}

impl FramedTransport {
    /// Wrap a stream split into its read and write halves
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (frame_tx, frame_rx) = mpsc::channel(capacity.max(1));
        let (msg_tx, msg_rx) = mpsc::channel(capacity.max(1));
        let connected = Arc::new(AtomicBool::new(true));

        spawn_reader(reader, msg_tx, Arc::clone(&connected));
        spawn_writer(writer, frame_rx, Arc::clone(&connected), Some);

        Self {
            frame_tx,
            msg_rx,
            connected,
        }
    }

    /// Connect to a worker process listening on a Unix socket
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the socket can't be reached.
    #[cfg(unix)]
    pub async fn connect_unix(
        path: impl AsRef<std::path::Path>,
        capacity: usize,
    ) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to connect to {path:?}: {e}"))
        })?;
        let (read_half, write_half) = stream.into_split();

        tracing::info!(path = ?path, "Connected to worker");
        Ok(Self::spawn(read_half, write_half, capacity))
    }
}

#[async_trait]
impl ClientTransport for FramedTransport {
    /// Frames the request before queueing it, so a request too large for one
    /// frame fails here with `SerializationError` and the stream stays usable.
    async fn send(&self, request: WorkerRequest) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidState("Not connected".to_string()));
        }

        let frame = encode(&request)?;
        self.frame_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))
    }

    async fn recv(&mut self) -> Result<WorkerMessage, TransportError> {
        self.msg_rx
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)
    }
}

/// Bridge a stream to a worker host endpoint
///
/// Requests read from `reader` feed the endpoint; messages the host posts are
/// written to `writer`. Must be called from within a tokio runtime; the
/// returned endpoint is then handed to the worker thread.
pub fn spawn_framed_host<R, W>(reader: R, writer: W, capacity: usize) -> HostEndpoint
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (msg_tx, msg_rx) = mpsc::channel(capacity.max(1));
    let connected = Arc::new(AtomicBool::new(true));

    spawn_reader(reader, request_tx, Arc::clone(&connected));
    spawn_writer(writer, msg_rx, connected, frame_reply);

    HostEndpoint::new(request_rx, msg_tx)
}

/// Frame a worker message, or the error that stands in for it
///
/// Returns `None` for a `Ready` too large to frame, since it has no `seq` to
/// fail; the connection is closed instead.
fn frame_reply(msg: WorkerMessage) -> Option<Vec<u8>> {
    let error = match encode(&msg) {
        Ok(frame) => return Some(frame),
        Err(e) => e,
    };

    let message = format!("reply could not be framed: {error}");
    let stand_in = match msg {
        WorkerMessage::Ready { .. } => None,
        WorkerMessage::GenerateResult { seq, .. } | WorkerMessage::GenerateError { seq, .. } => {
            Some(WorkerMessage::GenerateError { seq, message })
        }
        WorkerMessage::SprayDiscovered { seq, .. }
        | WorkerMessage::SkinDiscovered { seq, .. }
        | WorkerMessage::LoadComplete { seq }
        | WorkerMessage::LoadError { seq, .. } => Some(WorkerMessage::LoadError { seq, message }),
    };

    let Some(stand_in) = stand_in else {
        tracing::error!(%error, "Ready message could not be framed");
        return None;
    };
    tracing::warn!(seq = ?stand_in.seq(), %error, "Reply replaced by an error");

    match encode(&stand_in) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "Error reply could not be framed");
            None
        }
    }
}

/// Channel a reader task forwards decoded envelopes into
#[async_trait]
trait Inbox<T: Send + 'static>: Send + Sync + 'static {
    /// Returns `false` once the receiving side is gone
    async fn deliver(&self, envelope: T) -> bool;
}

#[async_trait]
impl<T: Send + 'static> Inbox<T> for mpsc::Sender<T> {
    async fn deliver(&self, envelope: T) -> bool {
        self.send(envelope).await.is_ok()
    }
}

#[async_trait]
impl<T: Send + 'static> Inbox<T> for mpsc::UnboundedSender<T> {
    async fn deliver(&self, envelope: T) -> bool {
        self.send(envelope).is_ok()
    }
}

/// Stream → channel. The first frame that can't be decoded ends the task.
fn spawn_reader<R, T, I>(mut reader: R, tx: I, connected: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin + Send + 'static,
    T: DeserializeOwned + Send + 'static,
    I: Inbox<T>,
{
    tokio::spawn(async move {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK];

        'read: loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!("Stream closed by peer");
                    break;
                }
                Ok(n) => {
                    decoder.push(&buf[..n]);
                    loop {
                        match decoder.decode::<T>() {
                            Ok(Some(envelope)) => {
                                if !tx.deliver(envelope).await {
                                    tracing::debug!("Envelope receiver dropped");
                                    break 'read;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Undecodable frame, closing stream");
                                break 'read;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read error");
                    break;
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
    });
}

/// Channel → stream. `to_frame` returning `None` ends the task.
fn spawn_writer<W, T, F>(
    mut writer: W,
    mut rx: mpsc::Receiver<T>,
    connected: Arc<AtomicBool>,
    to_frame: F,
) where
    W: AsyncWrite + Unpin + Send + 'static,
    T: Send + 'static,
    F: Fn(T) -> Option<Vec<u8>> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let Some(frame) = to_frame(envelope) else {
                break;
            };
            if let Err(e) = writer.write_all(&frame).await {
                tracing::warn!(error = %e, "Write error");
                break;
            }
        }

        let _ = writer.shutdown().await;
        connected.store(false, Ordering::SeqCst);
    });
}
