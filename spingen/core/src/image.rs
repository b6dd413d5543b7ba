//! Image Handles
//!
//! Generated images are held in an [`ImageStore`] and referenced through
//! [`ImageHandle`]s. A handle is the only owner of its image: it can't be
//! cloned, and releasing it (explicitly with [`ImageHandle::release`] or by
//! dropping it) removes the image from the store. Ownership makes a
//! double release impossible and a forgotten one visible in
//! [`ImageStore::stats`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::messages::ImageData;

/// Identifier of an image within its store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
    /// Raw numeric value
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// Counters describing a store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Images currently held
    pub live: usize,
    /// Bytes currently held
    pub live_bytes: usize,
    /// Handles ever issued
    pub acquired: u64,
    /// Handles ever released
    pub released: u64,
}

#[derive(Default)]
struct StoreInner {
    next_id: AtomicU64,
    live: Mutex<HashMap<ImageId, usize>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl StoreInner {
    fn release(&self, id: ImageId) {
        if self.live.lock().remove(&id).is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(image = %id, "Image released");
        } else {
            tracing::warn!(image = %id, "Release of an image the store doesn't hold");
        }
    }
}

/// Registry of live generated images
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct ImageStore {
    inner: Arc<StoreInner>,
}

impl ImageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of generated image data and issue its handle
    #[must_use]
    pub fn register(&self, image: ImageData) -> ImageHandle {
        let id = ImageId(self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let len = image.bytes.len();

        self.inner.live.lock().insert(id, len);
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(image = %id, bytes = len, mime = %image.mime, "Image acquired");

        ImageHandle {
            id,
            mime: image.mime,
            bytes: Arc::from(image.bytes),
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Whether the image is still held
    #[must_use]
    pub fn contains(&self, id: ImageId) -> bool {
        self.inner.live.lock().contains_key(&id)
    }

    /// Snapshot of the store counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let live = self.inner.live.lock();
        StoreStats {
            live: live.len(),
            live_bytes: live.values().sum(),
            acquired: self.inner.acquired.load(Ordering::SeqCst),
            released: self.inner.released.load(Ordering::SeqCst),
        }
    }
}

impl fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageStore")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Owned reference to one generated image
///
/// Dropping the handle releases the image.
pub struct ImageHandle {
    id: ImageId,
    mime: String,
    bytes: Arc<[u8]>,
    store: Weak<StoreInner>,
}

impl ImageHandle {
    /// Store-local id
    #[must_use]
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// MIME type of the encoded image
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Encoded image bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Opaque URL naming this image for display layers
    #[must_use]
    pub fn url(&self) -> String {
        format!("spingen-image://{}", self.id.0)
    }

    /// Release the image now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.release(self.id);
        }
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("id", &self.id)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}
