//! Worker Requests
//!
//! Envelopes sent from the client to the worker host. Every request carries a
//! [`Seq`] allocated by the request router; the host echoes it in the reply.

use serde::{Deserialize, Serialize};

use crate::messages::Seq;
use crate::model::{ArchiveFile, GenerationOptions, SprayId};

/// Which image to generate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerateOp {
    /// Spray can icon
    SprayImage {
        /// Spray to paint the can with
        spray_id: SprayId,
    },

    /// Animated render of one sprite of a skin
    SkinAnimation {
        /// Skin name
        skin: String,
        /// Spray to apply (`None` = the skin's preferred spray)
        spray_id: Option<SprayId>,
        /// Sprite, frame and scale
        options: GenerationOptions,
    },

    /// Still thumbnail of a skin
    SkinThumbnail {
        /// Skin name
        skin: String,
        /// Spray to apply (`None` = the skin's preferred spray)
        spray_id: Option<SprayId>,
    },
}

impl GenerateOp {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::SprayImage { .. } => RequestKind::SprayImage,
            Self::SkinAnimation { .. } => RequestKind::SkinAnimation,
            Self::SkinThumbnail { .. } => RequestKind::SkinThumbnail,
        }
    }
}

/// Kind of a correlated request, recorded with each pending entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Archive scan
    LoadFile,
    /// Spray can icon
    SprayImage,
    /// Skin animation
    SkinAnimation,
    /// Skin thumbnail
    SkinThumbnail,
}

impl RequestKind {
    /// Whether the reply to this request is an image
    #[must_use]
    pub fn expects_image(self) -> bool {
        !matches!(self, Self::LoadFile)
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadFile => write!(f, "loadFile"),
            Self::SprayImage => write!(f, "sprayImage"),
            Self::SkinAnimation => write!(f, "skinAnimation"),
            Self::SkinThumbnail => write!(f, "skinThumbnail"),
        }
    }
}

/// Requests from client to worker host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerRequest {
    /// Scan an archive for sprays and skins
    FileSubmitted {
        /// Correlation id of the load
        seq: Seq,
        /// File name (the extension selects the archive format)
        name: String,
        /// Archive contents
        #[serde(with = "crate::messages::hex_bytes")]
        file: Vec<u8>,
    },

    /// Generate an image
    Generate {
        /// Correlation id
        seq: Seq,
        /// What to generate
        op: GenerateOp,
    },
}

impl WorkerRequest {
    /// Build a load request from an archive
    #[must_use]
    pub fn file_submitted(seq: Seq, file: ArchiveFile) -> Self {
        Self::FileSubmitted {
            seq,
            name: file.name,
            file: file.bytes,
        }
    }

    /// Correlation id
    #[must_use]
    pub fn seq(&self) -> Seq {
        match self {
            Self::FileSubmitted { seq, .. } | Self::Generate { seq, .. } => *seq,
        }
    }

    /// Request kind
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::FileSubmitted { .. } => RequestKind::LoadFile,
            Self::Generate { op, .. } => op.kind(),
        }
    }
}
