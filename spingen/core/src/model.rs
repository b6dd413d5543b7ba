//! Catalog Model
//!
//! Value types shared by both sides of the worker boundary: sprays, skins,
//! their sprite tables and the parameters of an animation render.
//!
//! Everything here is plain data. Values are produced by the rendering engine
//! (sprays, skins) or by the viewer (generation options), and are copied
//! across the boundary, never shared.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a spray, unique within one engine instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SprayId(pub String);

impl SprayId {
    /// Create a spray id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SprayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A selectable decal/texture
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spray {
    /// Identity of the spray
    pub id: SprayId,
    /// Display name
    pub name: String,
}

impl Spray {
    /// Create a new spray
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SprayId::new(id),
            name: name.into(),
        }
    }
}

/// Ordered frame sequence for one animation state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    /// Frame identifiers in animation order (usually single letters)
    pub frames: Vec<String>,
}

impl Sprite {
    /// Create a sprite from its frames
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the sprite has the given frame
    #[must_use]
    pub fn has_frame(&self, frame: &str) -> bool {
        self.frames.iter().any(|f| f == frame)
    }

    /// First frame of the animation, if any
    #[must_use]
    pub fn first_frame(&self) -> Option<&str> {
        self.frames.first().map(String::as_str)
    }
}

/// Animation-state code to sprite table, in the order the engine parsed it
///
/// Fixed once the skin is built; only read accessors are exposed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteSet(Vec<(String, Sprite)>);

impl SpriteSet {
    /// Look up a sprite by its 4-letter code
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Sprite> {
        self.0.iter().find(|(c, _)| c == code).map(|(_, s)| s)
    }

    /// Whether the table has a sprite for `code`
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Sprite codes in parse order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    /// Number of sprites
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Sprite)> for SpriteSet {
    /// Later duplicates of a code are dropped; the first occurrence wins.
    fn from_iter<T: IntoIterator<Item = (S, Sprite)>>(iter: T) -> Self {
        let mut entries: Vec<(String, Sprite)> = Vec::new();
        for (code, sprite) in iter {
            let code = code.into();
            if !entries.iter().any(|(c, _)| *c == code) {
                entries.push((code, sprite));
            }
        }
        Self(entries)
    }
}

/// A character definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skin {
    /// Identity of the skin
    pub name: String,
    /// Name as written by the author (underscores for spaces)
    pub realname: String,
    /// Speed stat (1-9)
    pub kartspeed: u8,
    /// Weight stat (1-9)
    pub kartweight: u8,
    /// Animation states
    pub sprites: SpriteSet,
}

/// Accepted animation scales
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpriteScale {
    /// 1x
    #[default]
    X1,
    /// 2x
    X2,
    /// 3x
    X3,
    /// 4x
    X4,
    /// 6x
    X6,
    /// 8x
    X8,
}

/// Rejected scale value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid scale: {0}")]
pub struct ScaleError(pub String);

impl SpriteScale {
    /// Every accepted scale, smallest first
    pub const ALL: [SpriteScale; 6] = [
        SpriteScale::X1,
        SpriteScale::X2,
        SpriteScale::X3,
        SpriteScale::X4,
        SpriteScale::X6,
        SpriteScale::X8,
    ];

    /// Integer multiplier
    #[must_use]
    pub fn factor(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X3 => 3,
            Self::X4 => 4,
            Self::X6 => 6,
            Self::X8 => 8,
        }
    }

    /// Map an integer multiplier back to a scale
    ///
    /// # Errors
    ///
    /// Returns `ScaleError` for factors outside `{1, 2, 3, 4, 6, 8}`.
    pub fn from_factor(factor: u32) -> Result<Self, ScaleError> {
        Self::ALL
            .into_iter()
            .find(|s| s.factor() == factor)
            .ok_or_else(|| ScaleError(factor.to_string()))
    }
}

impl fmt::Display for SpriteScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

impl FromStr for SpriteScale {
    type Err = ScaleError;

    /// Accepts `"3x"` as well as a bare `"3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('x')
            .or_else(|| trimmed.strip_suffix('X'))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .map_err(|_| ScaleError(s.to_string()))
            .and_then(Self::from_factor)
            .map_err(|_| ScaleError(s.to_string()))
    }
}

/// Parameters of an animation render
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// 4-letter sprite code
    pub sprite: String,
    /// Frame identifier within the sprite
    pub frame: String,
    /// Output scale
    pub scale: SpriteScale,
}

impl GenerationOptions {
    /// Create options for a sprite/frame at the given scale
    pub fn new(sprite: impl Into<String>, frame: impl Into<String>, scale: SpriteScale) -> Self {
        Self {
            sprite: sprite.into(),
            frame: frame.into(),
            scale,
        }
    }
}

/// Archive container formats the engine can scan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    /// Zip-based package
    Pk3,
    /// Doom WAD
    Wad,
}

impl ArchiveKind {
    /// Accepted extensions, for file pickers
    pub const EXTENSIONS: [&'static str; 2] = [".pk3", ".wad"];

    /// Detect the archive kind from a file name (case-insensitive)
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pk3") {
            Some(Self::Pk3)
        } else if lower.ends_with(".wad") {
            Some(Self::Wad)
        } else {
            None
        }
    }
}

/// A user-supplied archive: its file name and raw contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveFile {
    /// File name including extension
    pub name: String,
    /// Raw archive bytes
    pub bytes: Vec<u8>,
}

impl ArchiveFile {
    /// Create an archive file
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Archive kind from the file name
    #[must_use]
    pub fn kind(&self) -> Option<ArchiveKind> {
        ArchiveKind::from_file_name(&self.name)
    }
}
