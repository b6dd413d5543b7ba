//! Spingen Viewer - headless preview model
//!
//! Everything a skin/spray browser needs short of drawing pixels: the
//! catalog of what has been discovered, which spray each skin is painted
//! with, the animation controls, the image slots behind every visible
//! button, and the file intake that feeds archives to the worker.
//!
//! # Architecture
//!
//! - **Catalog**: default sprays plus discoveries, in arrival order
//! - **Skin view**: labels, class, per-skin spray choice, preview controls
//! - **Slots**: one [`spingen_core::ResourceSlot`] per spray icon, skin
//!   thumbnail and the selected skin's animation
//! - **Intake**: archive files in, notifications out
//!
//! The [`Viewer`] ties them together on top of a
//! [`spingen_core::SpingenClient`].

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod catalog;
pub mod intake;
pub mod skin_view;
pub mod slots;

pub use app::Viewer;
pub use catalog::Catalog;
pub use intake::{FileIntake, Notification, Notifier, TracingNotifier};
pub use skin_view::{display_name, skin_class, sprite_label, PreviewControls, SkinSelection};
pub use slots::{SkinPreview, SkinThumbnail, SprayIcon};
