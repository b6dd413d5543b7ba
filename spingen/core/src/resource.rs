//! Resource Lifecycle Manager
//!
//! A [`ResourceSlot`] holds the generated image for one UI entity (a spray
//! button, a skin thumbnail, the animation preview) and keeps at most one
//! image alive for it.
//!
//! # Design Philosophy
//!
//! The slot is keyed by whatever inputs determine the image. Requesting the
//! key that was requested last does nothing; any other key starts a fetch.
//! Fetches run as background tasks, but their results are only installed when
//! the owner calls [`ResourceSlot::poll`] or [`ResourceSlot::next_completion`],
//! so the installed handle is only ever touched through `&mut self`.
//!
//! Installing a result releases the handle it replaces. Dropping the slot
//! releases the installed handle; results that arrive afterwards find the
//! slot gone and are released on the spot.
//!
//! There is no cache: going `k1 → k2 → k1` fetches three times.

use std::fmt::Debug;
use std::future::Future;

use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::image::ImageHandle;
use crate::model::{GenerationOptions, SprayId};

/// Key of a spray can icon
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SprayKey(pub SprayId);

/// Key of a skin thumbnail
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    /// Skin name
    pub skin: String,
    /// Chosen spray, `None` for the preferred one
    pub spray: Option<SprayId>,
}

/// Key of an animation preview
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnimationKey {
    /// Skin name
    pub skin: String,
    /// Chosen spray, `None` for the preferred one
    pub spray: Option<SprayId>,
    /// Sprite, frame and scale
    pub options: GenerationOptions,
}

/// Slot counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Fetches started
    pub fetches: u64,
    /// Results installed
    pub installs: u64,
    /// Handles released because a newer result replaced them
    pub releases: u64,
    /// Fetches that failed
    pub failures: u64,
}

type Completion<K> = (K, Result<ImageHandle, ClientError>);

/// Owner of the single live image of one UI entity
pub struct ResourceSlot<K> {
    name: String,
    requested: Option<K>,
    installed: Option<(K, ImageHandle)>,
    completion_tx: mpsc::UnboundedSender<Completion<K>>,
    completion_rx: mpsc::UnboundedReceiver<Completion<K>>,
    outstanding: usize,
    stats: SlotStats,
}

impl<K> ResourceSlot<K>
where
    K: Clone + PartialEq + Debug + Send + 'static,
{
    /// Create an empty slot; `name` only appears in logs
    pub fn new(name: impl Into<String>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            requested: None,
            installed: None,
            completion_tx,
            completion_rx,
            outstanding: 0,
            stats: SlotStats::default(),
        }
    }

    /// Ask for the image identified by `key`
    ///
    /// Does nothing if `key` is the most recently requested key. Otherwise
    /// `fetch(&key)` is spawned on the runtime and `true` is returned.
    pub fn request<F, Fut>(&mut self, key: K, fetch: F) -> bool
    where
        F: FnOnce(&K) -> Fut,
        Fut: Future<Output = Result<ImageHandle, ClientError>> + Send + 'static,
    {
        if self.requested.as_ref() == Some(&key) {
            return false;
        }

        let job = fetch(&key);
        let tx = self.completion_tx.clone();
        let slot = self.name.clone();
        let job_key = key.clone();
        tokio::spawn(async move {
            let result = job.await;
            if let Err(mpsc::error::SendError((key, Ok(handle)))) = tx.send((job_key, result)) {
                tracing::debug!(%slot, ?key, image = %handle.id(), "Slot gone, releasing late image");
                handle.release();
            }
        });

        tracing::debug!(slot = %self.name, ?key, "Fetch started");
        self.requested = Some(key);
        self.outstanding += 1;
        self.stats.fetches += 1;
        true
    }

    /// Install every fetch that has completed; returns how many settled
    pub fn poll(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            let _ = self.settle(completion);
            settled += 1;
        }
        settled
    }

    /// Wait for the next fetch to complete and install it
    ///
    /// Returns `None` immediately when nothing is outstanding, otherwise the
    /// fetch's outcome (`Ok` once installed).
    pub async fn next_completion(&mut self) -> Option<Result<(), ClientError>> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        Some(self.settle(completion))
    }

    fn settle(&mut self, (key, result): Completion<K>) -> Result<(), ClientError> {
        self.outstanding = self.outstanding.saturating_sub(1);

        match result {
            Ok(handle) => {
                tracing::debug!(slot = %self.name, ?key, image = %handle.id(), "Image installed");
                self.stats.installs += 1;
                if let Some((old_key, old)) = self.installed.replace((key, handle)) {
                    tracing::trace!(slot = %self.name, key = ?old_key, image = %old.id(), "Superseded image released");
                    old.release();
                    self.stats.releases += 1;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(slot = %self.name, ?key, error = %e, "Fetch failed, keeping previous image");
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    /// Currently installed image
    #[must_use]
    pub fn current(&self) -> Option<&ImageHandle> {
        self.installed.as_ref().map(|(_, handle)| handle)
    }

    /// Key of the installed image
    #[must_use]
    pub fn current_key(&self) -> Option<&K> {
        self.installed.as_ref().map(|(key, _)| key)
    }

    /// Most recently requested key
    #[must_use]
    pub fn requested_key(&self) -> Option<&K> {
        self.requested.as_ref()
    }

    /// Fetches not yet settled
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Slot counters
    #[must_use]
    pub fn stats(&self) -> SlotStats {
        self.stats
    }
}

impl<K> Drop for ResourceSlot<K> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.installed.take() {
            tracing::trace!(slot = %self.name, image = %handle.id(), "Slot torn down");
            handle.release();
        }
    }
}

impl<K: Debug> Debug for ResourceSlot<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSlot")
            .field("name", &self.name)
            .field("requested", &self.requested)
            .field("installed", &self.installed.as_ref().map(|(k, h)| (k, h.id())))
            .field("outstanding", &self.outstanding)
            .field("stats", &self.stats)
            .finish()
    }
}
