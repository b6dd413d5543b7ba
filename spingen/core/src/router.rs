//! Request Router
//!
//! Correlates worker replies with the requests that caused them.
//!
//! # Design Philosophy
//!
//! Every request gets a fresh [`Seq`] and a pending entry holding a oneshot
//! completion. Replies are matched by `Seq` alone, so they may arrive in any
//! order. Each entry is removed exactly once: by its reply, or by
//! [`RequestRouter::fail_all`] when the worker goes away.
//!
//! There is no timeout. A caller that stops waiting just drops its receiver;
//! the eventual reply still removes the entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::ClientError;
use crate::messages::{ImageData, Seq};
use crate::relay::LoadSummary;
use crate::requests::RequestKind;

/// A reply from the worker, stripped of its envelope
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// `LoadComplete`, with what the load's scope relayed
    Loaded(LoadSummary),
    /// `LoadError`
    LoadFailed(String),
    /// `GenerateResult`
    Image(ImageData),
    /// `GenerateError`
    GenerateFailed(String),
}

impl Reply {
    fn answers(&self, kind: RequestKind) -> bool {
        match self {
            Self::Loaded(_) | Self::LoadFailed(_) => kind == RequestKind::LoadFile,
            Self::Image(_) | Self::GenerateFailed(_) => kind.expects_image(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Loaded(_) => "load_complete",
            Self::LoadFailed(_) => "load_error",
            Self::Image(_) => "generate_result",
            Self::GenerateFailed(_) => "generate_error",
        }
    }
}

/// Successful outcome delivered to the waiting caller
#[derive(Clone, Debug, PartialEq)]
pub enum Settled {
    /// The archive was scanned
    Loaded(LoadSummary),
    /// The image was generated
    Image(ImageData),
}

/// What a waiting caller eventually receives
pub type Outcome = Result<Settled, ClientError>;

/// One in-flight request
#[derive(Debug)]
pub struct PendingRequest {
    /// Kind of request, checked against the reply
    pub kind: RequestKind,
    /// When the request was registered
    pub issued_at: Instant,
    completion: oneshot::Sender<Outcome>,
}

/// Keyed table of in-flight requests
#[derive(Debug)]
pub struct RequestRouter {
    next_seq: AtomicU64,
    pending: DashMap<Seq, PendingRequest>,
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRouter {
    /// Create an empty router; the first seq handed out is 1
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate a seq and register a pending entry for it
    pub fn register(&self, kind: RequestKind) -> (Seq, oneshot::Receiver<Outcome>) {
        let seq = Seq(self.next_seq.fetch_add(1, Ordering::SeqCst));
        let (completion, rx) = oneshot::channel();

        self.pending.insert(
            seq,
            PendingRequest {
                kind,
                issued_at: Instant::now(),
                completion,
            },
        );
        tracing::trace!(%seq, %kind, "Request registered");

        (seq, rx)
    }

    /// Complete the entry for `seq` with a worker reply
    ///
    /// A reply of the wrong kind rejects the waiting caller with
    /// `ProtocolViolation`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ProtocolViolation` if `seq` isn't pending (never
    /// issued, or already settled). The violation is also logged.
    pub fn settle(&self, seq: Seq, reply: Reply) -> Result<RequestKind, ClientError> {
        let Some((_, entry)) = self.pending.remove(&seq) else {
            tracing::warn!(%seq, reply = reply.name(), "Reply for unknown request");
            return Err(ClientError::ProtocolViolation(format!(
                "{} for unknown request {seq}",
                reply.name()
            )));
        };

        let kind = entry.kind;
        let outcome = if reply.answers(kind) {
            match reply {
                Reply::Loaded(summary) => Ok(Settled::Loaded(summary)),
                Reply::Image(image) => Ok(Settled::Image(image)),
                Reply::LoadFailed(message) | Reply::GenerateFailed(message) => {
                    Err(ClientError::Engine(message))
                }
            }
        } else {
            tracing::warn!(%seq, %kind, reply = reply.name(), "Reply doesn't answer request");
            Err(ClientError::ProtocolViolation(format!(
                "{} in reply to {kind} request {seq}",
                reply.name()
            )))
        };

        tracing::debug!(
            %seq,
            %kind,
            ok = outcome.is_ok(),
            elapsed_ms = entry.issued_at.elapsed().as_millis() as u64,
            "Request settled"
        );

        if entry.completion.send(outcome).is_err() {
            tracing::debug!(%seq, "Caller stopped waiting before settlement");
        }
        Ok(kind)
    }

    /// Reject the caller waiting on `seq` with `err`; `false` if nothing waited
    pub fn reject(&self, seq: Seq, err: ClientError) -> bool {
        let Some((_, entry)) = self.pending.remove(&seq) else {
            return false;
        };
        tracing::warn!(%seq, kind = %entry.kind, error = %err, "Request rejected");
        let _ = entry.completion.send(Err(err));
        true
    }

    /// Drop the entry for a request that was never posted
    pub fn forget(&self, seq: Seq) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Reject every pending request with `err`; returns how many there were
    pub fn fail_all(&self, err: &ClientError) -> usize {
        let seqs: Vec<Seq> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;

        for seq in seqs {
            if let Some((_, entry)) = self.pending.remove(&seq) {
                let _ = entry.completion.send(Err(err.clone()));
                failed += 1;
            }
        }

        if failed > 0 {
            tracing::warn!(count = failed, error = %err, "Rejected all pending requests");
        }
        failed
    }

    /// Whether `seq` is awaiting its reply
    #[must_use]
    pub fn is_pending(&self, seq: Seq) -> bool {
        self.pending.contains_key(&seq)
    }

    /// Number of requests awaiting a reply
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
