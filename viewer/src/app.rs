//! Viewer - application state
//!
//! Owns the catalog, the user's choices and one image slot per visible
//! entity. After every change the viewer reconciles: slots are created for
//! entities that became visible, refreshed with their current inputs, and
//! dropped (which releases their image) for entities that went away.
//!
//! Visibility follows the browser layout:
//! - every skin in the list has a thumbnail, optionally narrowed with
//!   [`Viewer::show_only_skins`]
//! - spray icons exist while a skin is open, since the spray picker lives on
//!   the skin page
//! - the open skin has one animation preview

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};

use spingen_core::{
    ArchiveFile, ClientError, ImageHandle, LoadSummary, ResourceSlot, Skin, SpingenClient, Spray,
    SprayId, SpriteScale, Subscription, ViewerConfig,
};

use crate::catalog::Catalog;
use crate::intake::{FileIntake, Notifier, TracingNotifier};
use crate::skin_view::{PreviewControls, SkinSelection};
use crate::slots::{SkinPreview, SkinThumbnail, SprayIcon};

/// Headless skin and spray browser
#[derive(Debug)]
pub struct Viewer {
    client: SpingenClient,
    intake: FileIntake,
    subscription: Subscription,
    catalog: Catalog,
    selection: SkinSelection,
    controls: PreviewControls,
    defaults: ViewerConfig,
    selected: Option<String>,
    skin_filter: Option<HashSet<String>>,
    thumbnails: HashMap<String, SkinThumbnail>,
    icons: HashMap<SprayId, SprayIcon>,
    preview: Option<SkinPreview>,
}

impl Viewer {
    /// Viewer on top of `client`, logging notifications
    #[must_use]
    pub fn new(client: SpingenClient, config: &ViewerConfig) -> Self {
        Self::with_notifier(client, config, Arc::new(TracingNotifier))
    }

    /// Viewer reporting file progress through `notifier`
    #[must_use]
    pub fn with_notifier(
        client: SpingenClient,
        config: &ViewerConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let subscription = client.subscribe();
        Self {
            intake: FileIntake::with_notifier(client.clone(), notifier),
            client,
            subscription,
            catalog: Catalog::new(),
            selection: SkinSelection::new(),
            controls: PreviewControls::from_config(config),
            defaults: config.clone(),
            selected: None,
            skin_filter: None,
            thumbnails: HashMap::new(),
            icons: HashMap::new(),
            preview: None,
        }
    }

    // ============================================
    // Events
    // ============================================

    /// Wait for the worker, then take in the default sprays
    ///
    /// # Errors
    ///
    /// `ClientError::TransportLost` if the worker died before becoming ready.
    pub async fn ready(&mut self) -> Result<(), ClientError> {
        self.client.ready().await?;
        self.sync();
        Ok(())
    }

    /// Apply every queued catalog event and reconcile; returns how many
    /// changed the catalog
    pub fn sync(&mut self) -> usize {
        let mut changed = 0;
        while let Some(event) = self.subscription.try_recv() {
            if self.catalog.apply(event) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.reconcile();
        }
        changed
    }

    /// Wait for the next catalog event, then behave like [`Viewer::sync`]
    ///
    /// Returns `None` once the client is gone.
    pub async fn next_event(&mut self) -> Option<usize> {
        let event = self.subscription.recv().await?;
        let first = usize::from(self.catalog.apply(event));
        let rest = self.sync();
        if first > 0 && rest == 0 {
            self.reconcile();
        }
        Some(first + rest)
    }

    /// Load one archive and pick up what it contained
    ///
    /// # Errors
    ///
    /// Whatever the worker reported for the file.
    pub async fn load_file(&mut self, file: ArchiveFile) -> Result<Option<LoadSummary>, ClientError> {
        let result = self.intake.load(file).await;
        self.sync();
        result
    }

    /// Load several archives independently and pick up what they contained
    pub async fn load_files(
        &mut self,
        files: Vec<ArchiveFile>,
    ) -> Vec<Result<Option<LoadSummary>, ClientError>> {
        let results = self.intake.load_all(files).await;
        self.sync();
        results
    }

    // ============================================
    // User choices
    // ============================================

    /// Open a skin page, or close it with `None`
    pub fn select_skin(&mut self, name: Option<&str>) {
        self.selected = name.map(str::to_string);
        if let Some(skin) = name.and_then(|n| self.catalog.skin(n)) {
            self.controls.follow_skin(skin);
        } else if name.is_some() {
            tracing::warn!(skin = ?name, "Selected skin is not in the catalog yet");
        }
        self.reconcile();
    }

    /// Paint the open skin with `spray`
    pub fn select_spray(&mut self, spray: SprayId) {
        if let Some(skin) = &self.selected {
            self.selection.select_spray(skin, spray);
            self.reconcile();
        }
    }

    /// Paint the open skin with its preferred spray
    pub fn use_preferred_spray(&mut self) {
        if let Some(skin) = &self.selected {
            self.selection.use_preferred(skin);
            self.reconcile();
        }
    }

    /// Show another animation state of the open skin
    pub fn set_sprite(&mut self, sprite: &str) {
        if let Some(skin) = self.selected.as_deref().and_then(|n| self.catalog.skin(n)) {
            self.controls.set_sprite(skin, sprite);
            self.reconcile();
        }
    }

    /// Show another frame of the current sprite
    pub fn set_frame(&mut self, frame: &str) {
        self.controls.set_frame(frame);
        self.reconcile();
    }

    /// Change the animation scale
    pub fn set_scale(&mut self, scale: SpriteScale) {
        self.controls.set_scale(scale);
        self.reconcile();
    }

    /// Put the preview controls back to their configured defaults
    pub fn reset_controls(&mut self) {
        self.controls = PreviewControls::from_config(&self.defaults);
        self.reconcile();
    }

    /// Only list these skins; thumbnails of the rest are torn down
    pub fn show_only_skins<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skin_filter = Some(names.into_iter().map(Into::into).collect());
        self.reconcile();
    }

    /// List every skin again
    pub fn show_all_skins(&mut self) {
        self.skin_filter = None;
        self.reconcile();
    }

    // ============================================
    // Slots
    // ============================================

    fn reconcile(&mut self) {
        let client = &self.client;
        let catalog = &self.catalog;
        let selection = &self.selection;
        let listed: Vec<&Skin> = catalog
            .skins()
            .iter()
            .filter(|s| self.skin_filter.as_ref().map_or(true, |f| f.contains(&s.name)))
            .collect();
        self.thumbnails
            .retain(|name, _| listed.iter().any(|s| &s.name == name));
        for &skin in &listed {
            self.thumbnails
                .entry(skin.name.clone())
                .or_insert_with(|| SkinThumbnail::new(skin))
                .refresh(client, skin, painted(catalog, selection, skin));
        }

        let open = self.selected.as_deref().and_then(|n| catalog.skin(n));
        match open {
            Some(skin) => {
                for spray in catalog.sprays() {
                    self.icons
                        .entry(spray.id.clone())
                        .or_insert_with(|| SprayIcon::new(spray))
                        .refresh(client, spray);
                }
                self.preview.get_or_insert_with(SkinPreview::new).refresh(
                    client,
                    skin,
                    painted(catalog, selection, skin),
                    &self.controls.options(),
                );
            }
            None => {
                if !self.icons.is_empty() || self.preview.is_some() {
                    tracing::debug!(icons = self.icons.len(), "Skin page closed, tearing down");
                }
                self.icons.clear();
                self.preview = None;
            }
        }
    }

    /// Install whatever has completed without waiting
    pub fn poll(&mut self) -> usize {
        self.thumbnails
            .values_mut()
            .map(|t| t.slot_mut().poll())
            .chain(self.icons.values_mut().map(|i| i.slot_mut().poll()))
            .chain(self.preview.iter_mut().map(|p| p.slot_mut().poll()))
            .sum()
    }

    /// Wait until every outstanding fetch has settled; returns the failures
    pub async fn settle(&mut self) -> Vec<ClientError> {
        let mut jobs: Vec<BoxFuture<'_, Vec<ClientError>>> = Vec::new();
        for thumbnail in self.thumbnails.values_mut() {
            jobs.push(drain(thumbnail.slot_mut()).boxed());
        }
        for icon in self.icons.values_mut() {
            jobs.push(drain(icon.slot_mut()).boxed());
        }
        if let Some(preview) = self.preview.as_mut() {
            jobs.push(drain(preview.slot_mut()).boxed());
        }
        join_all(jobs).await.into_iter().flatten().collect()
    }

    // ============================================
    // Accessors
    // ============================================

    /// The client this viewer drives
    #[must_use]
    pub fn client(&self) -> &SpingenClient {
        &self.client
    }

    /// File intake sharing this viewer's notifier
    #[must_use]
    pub fn intake(&self) -> &FileIntake {
        &self.intake
    }

    /// Known sprays and skins
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The open skin
    #[must_use]
    pub fn selected_skin(&self) -> Option<&Skin> {
        self.selected.as_deref().and_then(|n| self.catalog.skin(n))
    }

    /// Spray the skin is painted with, `None` for its preferred one
    #[must_use]
    pub fn spray_for(&self, skin: &str) -> Option<&SprayId> {
        self.selection.spray_for(skin)
    }

    /// Preview controls
    #[must_use]
    pub fn controls(&self) -> &PreviewControls {
        &self.controls
    }

    /// Thumbnail of a listed skin
    #[must_use]
    pub fn thumbnail(&self, skin: &str) -> Option<&ImageHandle> {
        self.thumbnails.get(skin).and_then(SkinThumbnail::image)
    }

    /// Icon of a spray in the open skin's picker
    #[must_use]
    pub fn spray_icon(&self, spray: &SprayId) -> Option<&ImageHandle> {
        self.icons.get(spray).and_then(SprayIcon::image)
    }

    /// Animation of the open skin
    #[must_use]
    pub fn preview(&self) -> Option<&ImageHandle> {
        self.preview.as_ref().and_then(SkinPreview::image)
    }

    /// Number of thumbnail, icon and preview slots alive
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.thumbnails.len() + self.icons.len() + usize::from(self.preview.is_some())
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.client.unsubscribe(self.subscription.id());
    }
}

/// Spray a skin is painted with, resolved against the catalog
fn painted<'a>(catalog: &'a Catalog, selection: &SkinSelection, skin: &Skin) -> Option<&'a Spray> {
    let id = selection.spray_for(&skin.name)?;
    let spray = catalog.spray(id);
    if spray.is_none() {
        tracing::warn!(skin = %skin.name, spray = %id, "Chosen spray unknown, using preferred");
    }
    spray
}

async fn drain<K>(slot: &mut ResourceSlot<K>) -> Vec<ClientError>
where
    K: Clone + PartialEq + std::fmt::Debug + Send + 'static,
{
    let mut failures = Vec::new();
    while let Some(outcome) = slot.next_completion().await {
        if let Err(e) = outcome {
            failures.push(e);
        }
    }
    failures
}
