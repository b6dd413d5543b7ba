//! Transport Layer for the Worker Boundary
//!
//! Provides abstraction over how envelopes reach the worker host:
//! - `InProcess`: direct channels to a worker thread in the same process
//! - `Framed`: length-prefixed JSON frames over a byte stream (Unix socket,
//!   pipe) for a worker in another process
//!
//! Both produce the same two ends: a [`ClientTransport`] for the client and a
//! [`HostEndpoint`] for the worker host, so neither side knows which one it is
//! using.

pub mod frame;
pub mod framed;
pub mod in_process;
pub mod traits;

// Re-exports for convenience
pub use frame::FrameDecoder;
pub use framed::{spawn_framed_host, FramedTransport};
pub use in_process::{HostEndpoint, InProcessTransport, DEFAULT_CHANNEL_CAPACITY};
pub use traits::{ClientTransport, TransportError};
