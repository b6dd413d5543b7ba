//! Worker Messages
//!
//! Envelopes sent from the worker host back to the client. Every reply to a
//! request carries the request's [`Seq`]; discoveries carry the `Seq` of the
//! archive load that produced them, so two loads in flight never cross-talk.
//!
//! # Ordering
//!
//! The host emits `Ready` exactly once, before anything else. For a given load
//! all discoveries precede its `LoadComplete`/`LoadError`. Nothing else about
//! ordering is promised: replies to different requests may arrive in any order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Skin, Spray};

/// Correlation id binding a request to its eventual reply
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Seq(pub u64);

impl Seq {
    /// Raw numeric value
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Encoded image produced by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// Encoded image bytes
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    /// MIME type of `bytes` (e.g. `image/png`, `image/gif`)
    pub mime: String,
}

impl ImageData {
    /// Create image data
    pub fn new(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }
}

/// Messages from worker host to client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkerMessage {
    // ============================================
    // Lifecycle
    // ============================================
    /// Engine initialized; carries the built-in spray catalog
    Ready {
        /// Sprays shipped with the engine
        default_sprays: Vec<Spray>,
    },

    // ============================================
    // Discovery (streamed during a load)
    // ============================================
    /// A spray was found in the archive being loaded
    SprayDiscovered {
        /// Load that produced this spray
        seq: Seq,
        /// The spray
        spray: Spray,
    },

    /// A skin was found in the archive being loaded
    SkinDiscovered {
        /// Load that produced this skin
        seq: Seq,
        /// The skin
        skin: Skin,
    },

    // ============================================
    // Correlated replies
    // ============================================
    /// Archive scan finished
    LoadComplete {
        /// Load request
        seq: Seq,
    },

    /// Archive scan failed
    LoadError {
        /// Load request
        seq: Seq,
        /// Human-readable engine error
        message: String,
    },

    /// Image generated
    GenerateResult {
        /// Generate request
        seq: Seq,
        /// The encoded image
        image: ImageData,
    },

    /// Image generation failed
    GenerateError {
        /// Generate request
        seq: Seq,
        /// Human-readable engine error
        message: String,
    },
}

impl WorkerMessage {
    /// Correlation id, if this message has one
    #[must_use]
    pub fn seq(&self) -> Option<Seq> {
        match self {
            Self::Ready { .. } => None,
            Self::SprayDiscovered { seq, .. }
            | Self::SkinDiscovered { seq, .. }
            | Self::LoadComplete { seq }
            | Self::LoadError { seq, .. }
            | Self::GenerateResult { seq, .. }
            | Self::GenerateError { seq, .. } => Some(*seq),
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::SprayDiscovered { .. } => "spray_discovered",
            Self::SkinDiscovered { .. } => "skin_discovered",
            Self::LoadComplete { .. } => "load_complete",
            Self::LoadError { .. } => "load_error",
            Self::GenerateResult { .. } => "generate_result",
            Self::GenerateError { .. } => "generate_error",
        }
    }
}

/// Serde adapter writing byte buffers as hex strings in JSON frames
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
