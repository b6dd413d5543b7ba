//! Test utilities
//!
//! [`FixtureEngine`] is an in-memory [`RenderEngine`] scripted with archives
//! and their contents. Images are deterministic byte strings describing what
//! was asked for, so tests can assert on them directly.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Discovery, EngineError, RenderEngine};
use crate::messages::ImageData;
use crate::model::{ArchiveFile, Skin, Sprite, Spray, SprayId, SpriteScale};

/// One call the engine received
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    /// `fetch_default_sprays`
    DefaultSprays,
    /// `fetch_all` with the archive name
    FetchAll(String),
    /// `generate_spray_image`
    SprayImage(SprayId),
    /// `generate_skin_animation`
    SkinAnimation {
        /// Skin name
        skin: String,
        /// Requested spray
        spray: Option<SprayId>,
        /// Sprite code
        sprite: String,
        /// Frame
        frame: String,
        /// Scale
        scale: SpriteScale,
    },
    /// `generate_skin_thumbnail`
    SkinThumbnail {
        /// Skin name
        skin: String,
        /// Requested spray
        spray: Option<SprayId>,
    },
}

/// Shared record of engine calls, readable after the engine moved to its thread
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<EngineCall>>>);

impl CallLog {
    /// Calls so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.lock().clone()
    }

    /// Number of calls matching `pred`
    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.0.lock().iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: EngineCall) {
        self.0.lock().push(call);
    }
}

/// Scriptable in-memory engine
#[derive(Debug, Default)]
pub struct FixtureEngine {
    default_sprays: Vec<Spray>,
    archives: HashMap<String, Vec<Discovery>>,
    sprays: HashMap<SprayId, Spray>,
    skins: HashMap<String, Skin>,
    log: CallLog,
}

impl FixtureEngine {
    /// Engine with no default sprays and no known archives
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sprays reported at startup
    #[must_use]
    pub fn with_default_sprays(mut self, sprays: Vec<Spray>) -> Self {
        for spray in &sprays {
            self.sprays.insert(spray.id.clone(), spray.clone());
        }
        self.default_sprays = sprays;
        self
    }

    /// An archive that yields `discoveries` in order; any other name fails to
    /// load
    #[must_use]
    pub fn with_archive(mut self, name: impl Into<String>, discoveries: Vec<Discovery>) -> Self {
        self.archives.insert(name.into(), discoveries);
        self
    }

    /// Handle on the call record
    #[must_use]
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn known_spray(&self, spray_id: Option<&SprayId>) -> Result<String, EngineError> {
        match spray_id {
            None => Ok("preferred".to_string()),
            Some(id) if self.sprays.contains_key(id) => Ok(id.to_string()),
            Some(id) => Err(EngineError::new(format!("Unknown spray {id}"))),
        }
    }

    fn known_skin(&self, skin: &str) -> Result<&Skin, EngineError> {
        self.skins
            .get(skin)
            .ok_or_else(|| EngineError::new(format!("Unknown skin {skin}")))
    }
}

impl RenderEngine for FixtureEngine {
    fn fetch_default_sprays(&mut self) -> Vec<Spray> {
        self.log.push(EngineCall::DefaultSprays);
        self.default_sprays.clone()
    }

    fn fetch_all(
        &mut self,
        archive: &ArchiveFile,
        on_discovery: &mut dyn FnMut(Discovery),
    ) -> Result<(), EngineError> {
        self.log.push(EngineCall::FetchAll(archive.name.clone()));

        let discoveries = self.archives.get(&archive.name).cloned().ok_or_else(|| {
            EngineError::new(format!("Failed to read {}: not a valid archive", archive.name))
        })?;

        for discovery in discoveries {
            match &discovery {
                Discovery::Spray(spray) => {
                    self.sprays.insert(spray.id.clone(), spray.clone());
                }
                Discovery::Skin(skin) => {
                    self.skins.insert(skin.name.clone(), skin.clone());
                }
            }
            on_discovery(discovery);
        }
        Ok(())
    }

    fn generate_spray_image(&mut self, spray_id: &SprayId) -> Result<ImageData, EngineError> {
        self.log.push(EngineCall::SprayImage(spray_id.clone()));
        let spray = self.known_spray(Some(spray_id))?;
        Ok(ImageData::new(format!("spray:{spray}"), "image/png"))
    }

    fn generate_skin_animation(
        &mut self,
        skin: &str,
        spray_id: Option<&SprayId>,
        sprite: &str,
        frame: &str,
        scale: SpriteScale,
    ) -> Result<ImageData, EngineError> {
        self.log.push(EngineCall::SkinAnimation {
            skin: skin.to_string(),
            spray: spray_id.cloned(),
            sprite: sprite.to_string(),
            frame: frame.to_string(),
            scale,
        });

        let spray = self.known_spray(spray_id)?;
        let found = self.known_skin(skin)?;
        let frames = found
            .sprites
            .get(sprite)
            .ok_or_else(|| EngineError::new(format!("Skin {skin} has no sprite {sprite}")))?;
        if !frames.has_frame(frame) {
            return Err(EngineError::new(format!(
                "Sprite {sprite} of {skin} has no frame {frame}"
            )));
        }

        Ok(ImageData::new(
            format!("anim:{skin}:{spray}:{sprite}{frame}:{scale}"),
            "image/gif",
        ))
    }

    fn generate_skin_thumbnail(
        &mut self,
        skin: &str,
        spray_id: Option<&SprayId>,
    ) -> Result<ImageData, EngineError> {
        self.log.push(EngineCall::SkinThumbnail {
            skin: skin.to_string(),
            spray: spray_id.cloned(),
        });

        let spray = self.known_spray(spray_id)?;
        self.known_skin(skin)?;
        Ok(ImageData::new(format!("thumb:{skin}:{spray}"), "image/png"))
    }
}

/// A skin with the given sprites, e.g. `skin("sonic", &[("STIN", &["A", "B"])])`
#[must_use]
pub fn skin(name: &str, sprites: &[(&str, &[&str])]) -> Skin {
    Skin {
        name: name.to_string(),
        realname: name.to_string(),
        kartspeed: 5,
        kartweight: 5,
        sprites: sprites
            .iter()
            .map(|(code, frames)| (*code, Sprite::new(frames.iter().copied())))
            .collect(),
    }
}

/// A spray whose display name is its id
#[must_use]
pub fn spray(id: &str) -> Spray {
    Spray::new(id, id)
}
