//! Image slots of the visible entities
//!
//! Thin wrappers that know how to turn an entity's current inputs into a
//! [`ResourceSlot`] key and a client call. The slot does the rest: same key
//! means no request, a new key means a fetch and the old image is released
//! once the new one lands.

use spingen_core::{
    AnimationKey, ClientError, GenerationOptions, ImageHandle, ResourceSlot, Skin, SpingenClient,
    Spray, SprayKey, ThumbnailKey,
};

/// Icon of one spray can button
#[derive(Debug)]
pub struct SprayIcon {
    slot: ResourceSlot<SprayKey>,
}

impl SprayIcon {
    /// Slot for `spray`; nothing is fetched until [`SprayIcon::refresh`]
    #[must_use]
    pub fn new(spray: &Spray) -> Self {
        Self {
            slot: ResourceSlot::new(format!("spray:{}", spray.id)),
        }
    }

    /// Fetch the icon unless it is already requested
    pub fn refresh(&mut self, client: &SpingenClient, spray: &Spray) -> bool {
        let client = client.clone();
        let spray = spray.clone();
        self.slot.request(SprayKey(spray.id.clone()), move |_| async move {
            client.create_spray_image(&spray).await
        })
    }

    /// Underlying slot
    pub fn slot_mut(&mut self) -> &mut ResourceSlot<SprayKey> {
        &mut self.slot
    }

    /// Installed icon
    #[must_use]
    pub fn image(&self) -> Option<&ImageHandle> {
        self.slot.current()
    }
}

/// Thumbnail of one skin button
#[derive(Debug)]
pub struct SkinThumbnail {
    slot: ResourceSlot<ThumbnailKey>,
}

impl SkinThumbnail {
    /// Slot for `skin`
    #[must_use]
    pub fn new(skin: &Skin) -> Self {
        Self {
            slot: ResourceSlot::new(format!("thumbnail:{}", skin.name)),
        }
    }

    /// Fetch the thumbnail painted with `spray` unless already requested
    pub fn refresh(&mut self, client: &SpingenClient, skin: &Skin, spray: Option<&Spray>) -> bool {
        let key = ThumbnailKey {
            skin: skin.name.clone(),
            spray: spray.map(|s| s.id.clone()),
        };
        let client = client.clone();
        let skin = skin.clone();
        let spray = spray.cloned();
        self.slot.request(key, move |_| async move {
            client.create_skin_thumbnail(&skin, spray.as_ref()).await
        })
    }

    /// Underlying slot
    pub fn slot_mut(&mut self) -> &mut ResourceSlot<ThumbnailKey> {
        &mut self.slot
    }

    /// Installed thumbnail
    #[must_use]
    pub fn image(&self) -> Option<&ImageHandle> {
        self.slot.current()
    }
}

/// Animation preview of the selected skin
#[derive(Debug)]
pub struct SkinPreview {
    slot: ResourceSlot<AnimationKey>,
}

impl Default for SkinPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl SkinPreview {
    /// Empty preview
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: ResourceSlot::new("animation"),
        }
    }

    /// Fetch the animation for these inputs unless already requested
    pub fn refresh(
        &mut self,
        client: &SpingenClient,
        skin: &Skin,
        spray: Option<&Spray>,
        options: &GenerationOptions,
    ) -> bool {
        let key = AnimationKey {
            skin: skin.name.clone(),
            spray: spray.map(|s| s.id.clone()),
            options: options.clone(),
        };
        let client = client.clone();
        let skin = skin.clone();
        let spray = spray.cloned();
        let options = options.clone();
        self.slot.request(key, move |_| async move {
            client
                .create_skin_animation(&skin, spray.as_ref(), &options)
                .await
        })
    }

    /// Wait for the newest outstanding fetch to settle
    ///
    /// Returns `None` when nothing was outstanding, otherwise the outcome of
    /// the last fetch that settled.
    pub async fn settle(&mut self) -> Option<Result<(), ClientError>> {
        let mut last = None;
        while let Some(outcome) = self.slot.next_completion().await {
            last = Some(outcome);
        }
        last
    }

    /// Underlying slot
    pub fn slot_mut(&mut self) -> &mut ResourceSlot<AnimationKey> {
        &mut self.slot
    }

    /// Installed animation
    #[must_use]
    pub fn image(&self) -> Option<&ImageHandle> {
        self.slot.current()
    }

    /// Key of the installed animation
    #[must_use]
    pub fn shown(&self) -> Option<&AnimationKey> {
        self.slot.current_key()
    }
}
