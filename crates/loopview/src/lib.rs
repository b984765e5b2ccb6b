//! loopview: Inline looping video surfaces for egui
//!
//! This crate provides the surface widget for short looping video items:
//! a thumbnail that loads ahead of playback, a shimmer placeholder while
//! anything is still resolving, tap-to-load and tap-to-unmute interaction,
//! politeness muting after repeated loops, and auto-hiding sound/caption
//! controls.
//!
//! The actual decoding and rendering engine is injected: implement
//! [`PlaybackEngine`] and [`EngineProvider`] over your platform's media
//! stack (or take an existing integration) and hand the provider to
//! [`MediaPlayer::new`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loopview::{MediaDescriptor, MediaPlayer, PlayerSurface};
//!
//! // Created once, in app state:
//! let player = MediaPlayer::new(my_engine_provider);
//! let mut surface = PlayerSurface::with_defaults();
//! let media = MediaDescriptor::with_preview(
//!     "https://example.com/clip.mp4",
//!     "https://example.com/clip.jpg",
//!     16.0 / 9.0,
//! );
//! player.prepare(&media, &surface.as_media_surface());
//!
//! // In your egui update() function:
//! let response = surface.show(ui, available_size);
//! ```
//!
//! A tap on the surface starts playback; further taps toggle sound.

#![deny(clippy::disallowed_methods)]

pub mod media;

// Re-export main types for convenience
pub use media::{
    PlayerSurface, SurfaceConfig, SurfaceControls, SurfaceControlsConfig, SurfaceControlsResponse,
    SurfaceShared,
};

pub use loopview_core::{
    CaptionTrack, EngineProvider, FetchCancel, FetchError, HttpPreviewFetcher, ImagePreviewCache,
    ItemStatus,
    JsonSettingsStore, LoadOptions, MediaDescriptor, MediaPlayer, MediaSurface,
    MemorySettingsStore, PlaybackEngine, PlaybackState, PlayerError, PlayerStateListener,
    PreviewFetcher, SettingsStore, TimeControl, CAPTIONS_ENABLED_KEY,
};
