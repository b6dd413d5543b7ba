//! Catalog
//!
//! What the viewer knows about: the default sprays reported at readiness,
//! then every spray and skin discovered by any load, in arrival order.
//! Later archives may ship an entity that is already known (same spray id,
//! same skin name); the first one wins.

use std::collections::HashSet;

use spingen_core::{CatalogEvent, Skin, Spray, SprayId};

/// Known sprays and skins
#[derive(Debug, Default)]
pub struct Catalog {
    ready: bool,
    sprays: Vec<Spray>,
    skins: Vec<Skin>,
    spray_ids: HashSet<SprayId>,
    skin_names: HashSet<String>,
}

impl Catalog {
    /// Empty catalog, not yet ready
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the catalog; returns whether anything changed
    pub fn apply(&mut self, event: CatalogEvent) -> bool {
        match event {
            CatalogEvent::Ready(defaults) => self.on_ready(defaults),
            CatalogEvent::Spray(spray) => self.add_spray(spray),
            CatalogEvent::Skin(skin) => self.add_skin(skin),
        }
    }

    fn on_ready(&mut self, defaults: Vec<Spray>) -> bool {
        if self.ready {
            tracing::warn!("Catalog already ready, ignoring second default set");
            return false;
        }
        self.ready = true;

        // Defaults go in front of anything that raced ahead of readiness
        let discovered = std::mem::take(&mut self.sprays);
        self.spray_ids.clear();
        for spray in defaults.into_iter().chain(discovered) {
            self.add_spray(spray);
        }
        tracing::debug!(sprays = self.sprays.len(), "Catalog ready");
        true
    }

    fn add_spray(&mut self, spray: Spray) -> bool {
        if !self.spray_ids.insert(spray.id.clone()) {
            tracing::debug!(spray = %spray.id, "Duplicate spray ignored");
            return false;
        }
        self.sprays.push(spray);
        true
    }

    fn add_skin(&mut self, skin: Skin) -> bool {
        if !self.skin_names.insert(skin.name.clone()) {
            tracing::debug!(skin = %skin.name, "Duplicate skin ignored");
            return false;
        }
        self.skins.push(skin);
        true
    }

    /// Whether the default sprays have arrived
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Sprays, defaults first
    #[must_use]
    pub fn sprays(&self) -> &[Spray] {
        &self.sprays
    }

    /// Skins in discovery order
    #[must_use]
    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    /// Look up a spray
    #[must_use]
    pub fn spray(&self, id: &SprayId) -> Option<&Spray> {
        self.sprays.iter().find(|s| &s.id == id)
    }

    /// Look up a skin
    #[must_use]
    pub fn skin(&self, name: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.name == name)
    }
}
