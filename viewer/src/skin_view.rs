//! Skin View
//!
//! Presentation helpers for a single skin plus the state behind its preview:
//! which spray it is painted with and which sprite/frame/scale the animation
//! shows.

use std::collections::HashMap;

use spingen_core::{GenerationOptions, ScaleError, Skin, SprayId, SpriteScale, ViewerConfig};

/// Sprite every skin is expected to have
pub const DEFAULT_SPRITE: &str = "STIN";
/// First frame of [`DEFAULT_SPRITE`]
pub const DEFAULT_FRAME: &str = "A";

const CLASSES: [&str; 9] = [
    "Class A", "Class B", "Class C", "Class D", "Class E", "Class F", "Class G", "Class H",
    "Class I",
];

/// Human readable name of a sprite code; unknown codes are returned as-is
#[must_use]
pub fn sprite_label(code: &str) -> &str {
    match code {
        "STIN" => "Still",
        "STIL" => "Still Left",
        "STIR" => "Still Right",
        "STGL" => "Still Left (glance back)",
        "STGR" => "Still Right (glance back)",
        "STLL" => "Still Left (look back)",
        "STLR" => "Still Right (look back)",
        "SLWN" => "Slow Driving",
        "SLWL" => "Slow Driving Left",
        "SLWR" => "Slow Driving Right",
        "SLGL" => "Slow Driving Left (glance back)",
        "SLGR" => "Slow Driving Right (glance back)",
        "SLLL" => "Slow Driving Left (look back)",
        "SLLR" => "Slow Driving Right (look back)",
        "FSTN" => "Fast Driving",
        "FSTL" => "Fast Driving Left",
        "FSTR" => "Fast Driving Right",
        "FSGL" => "Fast Driving Left (glance back)",
        "FSGR" => "Fast Driving Right (glance back)",
        "FSLL" => "Fast Driving Left (look back)",
        "FSLR" => "Fast Driving Right (look back)",
        "DRLN" => "Drifting Left, Steering Neutral",
        "DRLO" => "Drifting Left, Steering Outwards",
        "DRLI" => "Drifting Left, Steering Inwards",
        "DRRN" => "Drifting Right, Steering Neutral",
        "DRRO" => "Drifting Right, Steering Outwards",
        "DRRI" => "Drifting Right, Steering Inwards",
        "SPIN" => "Spinout",
        "DEAD" => "Dead",
        "SIGN" => "Finish Signpost",
        "SIGL" => "Finish Signpost, Ironman Perfect",
        "SSIG" => "\"working designs\" Signpost",
        "XTRA" => "Wanted",
        "TALK" => "Dialogue Icon",
        other => other,
    }
}

/// The skin's real name with underscores shown as spaces
#[must_use]
pub fn display_name(skin: &Skin) -> String {
    skin.realname.replace('_', " ")
}

/// Stat class of a skin, `Class A` (light and slow) to `Class I`
///
/// Speed picks the column and weight the row of a 3x3 grid, three stat
/// points per bucket. Out-of-range stats clamp to the nearest bucket.
#[must_use]
pub fn skin_class(skin: &Skin) -> &'static str {
    let bucket = |stat: u8| usize::from((stat.max(1) - 1) / 3).min(2);
    CLASSES[bucket(skin.kartweight) * 3 + bucket(skin.kartspeed)]
}

/// Spray chosen per skin; skins without an entry use their preferred spray
#[derive(Debug, Default, Clone)]
pub struct SkinSelection {
    chosen: HashMap<String, SprayId>,
}

impl SkinSelection {
    /// Nothing chosen yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint `skin` with `spray`
    pub fn select_spray(&mut self, skin: &str, spray: SprayId) {
        self.chosen.insert(skin.to_string(), spray);
    }

    /// Go back to the skin's preferred spray
    pub fn use_preferred(&mut self, skin: &str) {
        self.chosen.remove(skin);
    }

    /// Spray `skin` is painted with, `None` for its preferred one
    #[must_use]
    pub fn spray_for(&self, skin: &str) -> Option<&SprayId> {
        self.chosen.get(skin)
    }
}

/// Sprite, frame and scale of the animation preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewControls {
    sprite: String,
    frame: String,
    scale: SpriteScale,
}

impl Default for PreviewControls {
    fn default() -> Self {
        Self {
            sprite: DEFAULT_SPRITE.to_string(),
            frame: DEFAULT_FRAME.to_string(),
            scale: SpriteScale::X1,
        }
    }
}

impl PreviewControls {
    /// Controls starting at the configured sprite, frame and scale
    #[must_use]
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            sprite: config.default_sprite.clone(),
            frame: config.default_frame.clone(),
            scale: config.default_scale,
        }
    }

    /// Switch to `sprite`
    ///
    /// Keeps the current frame if the sprite has it, otherwise jumps to the
    /// sprite's first frame. If `skin` has no such sprite the controls go
    /// back to the still pose.
    pub fn set_sprite(&mut self, skin: &Skin, sprite: &str) {
        match skin.sprites.get(sprite) {
            Some(frames) => {
                if !frames.has_frame(&self.frame) {
                    self.frame = frames.first_frame().unwrap_or(DEFAULT_FRAME).to_string();
                }
                self.sprite = sprite.to_string();
            }
            None => {
                tracing::debug!(skin = %skin.name, sprite, "Skin has no such sprite, resetting");
                self.sprite = DEFAULT_SPRITE.to_string();
                self.frame = DEFAULT_FRAME.to_string();
            }
        }
    }

    /// Show `frame` of the current sprite
    pub fn set_frame(&mut self, frame: impl Into<String>) {
        self.frame = frame.into();
    }

    /// Change the output scale
    pub fn set_scale(&mut self, scale: SpriteScale) {
        self.scale = scale;
    }

    /// Change the output scale from a picker value such as `"4x"`
    ///
    /// # Errors
    ///
    /// Returns `ScaleError` and leaves the scale unchanged for values outside
    /// `1x`..`8x`.
    pub fn set_scale_str(&mut self, value: &str) -> Result<(), ScaleError> {
        self.scale = value.parse()?;
        Ok(())
    }

    /// Bring the controls in line with a newly selected skin
    pub fn follow_skin(&mut self, skin: &Skin) {
        let sprite = self.sprite.clone();
        self.set_sprite(skin, &sprite);
    }

    /// Current sprite code
    #[must_use]
    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    /// Current frame
    #[must_use]
    pub fn frame(&self) -> &str {
        &self.frame
    }

    /// Current scale
    #[must_use]
    pub fn scale(&self) -> SpriteScale {
        self.scale
    }

    /// Options for the next animation render
    #[must_use]
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions::new(self.sprite.clone(), self.frame.clone(), self.scale)
    }
}
