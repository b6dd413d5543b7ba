//! Rendering Engine Traits
//!
//! The rendering engine decodes archives and synthesizes images. It is an
//! external collaborator: this crate only defines the contract it must meet
//! and drives it from the worker host.
//!
//! # Threading
//!
//! The engine is not assumed to be reentrant. The worker host owns exactly one
//! instance on its own thread and calls it one request at a time, which is why
//! every method takes `&mut self` and the trait only requires `Send`.

use thiserror::Error;

use crate::messages::ImageData;
use crate::model::{ArchiveFile, Skin, Spray, SprayId, SpriteScale};

/// Something the engine found while scanning an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// A spray definition
    Spray(Spray),
    /// A skin definition
    Skin(Skin),
}

/// Failure raised by the engine
///
/// The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human-readable description
    pub message: String,
}

impl EngineError {
    /// Create an engine error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rendering engine contract
pub trait RenderEngine: Send + 'static {
    /// Built-in spray catalog; called once when the worker starts
    fn fetch_default_sprays(&mut self) -> Vec<Spray>;

    /// Scan an archive, reporting every spray and skin through `on_discovery`
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the archive cannot be read.
    fn fetch_all(
        &mut self,
        archive: &ArchiveFile,
        on_discovery: &mut dyn FnMut(Discovery),
    ) -> Result<(), EngineError>;

    /// Render the spray can icon painted with `spray_id`
    ///
    /// # Errors
    ///
    /// Returns `EngineError` for unknown sprays or encoding failures.
    fn generate_spray_image(&mut self, spray_id: &SprayId) -> Result<ImageData, EngineError>;

    /// Render an animation of one sprite/frame of a skin
    ///
    /// # Errors
    ///
    /// Returns `EngineError` for unknown skins/sprays or sprites the skin
    /// doesn't have.
    fn generate_skin_animation(
        &mut self,
        skin: &str,
        spray_id: Option<&SprayId>,
        sprite: &str,
        frame: &str,
        scale: SpriteScale,
    ) -> Result<ImageData, EngineError>;

    /// Render the still thumbnail of a skin
    ///
    /// # Errors
    ///
    /// Returns `EngineError` for unknown skins/sprays.
    fn generate_skin_thumbnail(
        &mut self,
        skin: &str,
        spray_id: Option<&SprayId>,
    ) -> Result<ImageData, EngineError>;
}
