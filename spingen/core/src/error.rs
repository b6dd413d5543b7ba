//! Client Errors
//!
//! Every failure a caller of the client can observe. Errors are scoped to the
//! request that caused them; a failed request never affects its siblings.

use thiserror::Error;

use crate::engine::EngineError;

/// Why a client request was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The engine rejected the request (unreadable archive, unknown skin or
    /// spray, unsupported sprite/frame)
    #[error("{0}")]
    Engine(String),

    /// The worker context went away before replying
    #[error("worker connection lost")]
    TransportLost,

    /// The worker replied with something that doesn't answer the request, or
    /// the request could not be put on the wire
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl ClientError {
    /// Whether this came from the engine rather than the plumbing
    #[must_use]
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

impl From<EngineError> for ClientError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err.message)
    }
}
