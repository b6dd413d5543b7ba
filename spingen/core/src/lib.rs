//! Spingen Core - Worker Relay and Image Lifecycle
//!
//! This crate drives a rendering engine that turns kart racing archives
//! (`.pk3` / `.wad`) into skin previews and spray icons. The engine is slow
//! and single-threaded, so it runs in its own worker context; this crate
//! carries requests to it, matches replies back to their callers, and keeps
//! track of every generated image so superseded ones are released.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Viewer / UI                          │
//! │   ResourceSlot per entity          Subscription (catalog)    │
//! └───────────────┬───────────────────────────────▲──────────────┘
//!                 │ create_* / load_file          │ CatalogEvent
//! ┌───────────────▼───────────────────────────────┴──────────────┐
//! │                        SpingenClient                         │
//! │   RequestRouter (seq → pending)   EventRelay (seq → scope)   │
//! │   ImageStore (live handles)       pump task                  │
//! └───────────────┬───────────────────────────────▲──────────────┘
//!                 │ WorkerRequest                 │ WorkerMessage
//! ┌───────────────▼───────────────────────────────┴──────────────┐
//! │      Transport (in-process channels / framed byte stream)    │
//! └───────────────┬───────────────────────────────▲──────────────┘
//! ┌───────────────▼───────────────────────────────┴──────────────┐
//! │           WorkerHost (own OS thread) → RenderEngine          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SpingenClient`]: async facade over the worker
//! - [`WorkerHost`]: runs a [`RenderEngine`] on a dedicated thread
//! - [`ResourceSlot`]: keeps the single live image of one UI entity
//! - [`ImageHandle`]: owned, release-once reference to a generated image
//!
//! # Quick Start
//!
//! ```ignore
//! use spingen_core::{load_config, ArchiveFile, SpingenClient};
//!
//! let config = load_config()?;
//! let (client, _worker) = SpingenClient::start(engine, &config.worker)?;
//! client.ready().await?;
//!
//! let summary = client.load_file(ArchiveFile::new("kart.pk3", bytes)).await?;
//! println!("found {summary}");
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod messages;
pub mod model;
pub mod relay;
pub mod requests;
pub mod resource;
pub mod router;
pub mod subscribers;
pub mod transport;
pub mod worker;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

// Re-exports for convenience
pub use client::SpingenClient;
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    SpingenConfig, ViewerConfig, WorkerConfig,
};
pub use engine::{Discovery, EngineError, RenderEngine};
pub use error::ClientError;
pub use image::{ImageHandle, ImageId, ImageStore, StoreStats};
pub use messages::{ImageData, Seq, WorkerMessage};
pub use model::{
    ArchiveFile, ArchiveKind, GenerationOptions, ScaleError, Skin, Sprite, SpriteScale, SpriteSet,
    Spray, SprayId,
};
pub use relay::LoadSummary;
pub use requests::{GenerateOp, RequestKind, WorkerRequest};
pub use resource::{AnimationKey, ResourceSlot, SlotStats, SprayKey, ThumbnailKey};
pub use subscribers::{CatalogEvent, Subscription, SubscriptionId};
pub use transport::{
    ClientTransport, FramedTransport, HostEndpoint, InProcessTransport, TransportError,
};
pub use worker::{WorkerHost, WorkerStats};
