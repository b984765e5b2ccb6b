//! loopview-core: Headless playback coordination for looping short-form video.
//!
//! This crate provides the UI-free foundation for loopview. It contains:
//!
//! - Core types: [`media`], [`engine`]
//! - The player coordinator: [`player`]
//! - Caption track selection: [`captions`]
//! - Persisted user settings: [`settings`]
//! - Preview image byte cache: [`preview_cache`]
//! - Network utilities: [`fetch`]
//!
//! This crate has **zero egui dependency**. It is consumed by `loopview`
//! (the egui surface layer) and by headless tests.
//!
//! The playback engine itself is injected through [`engine::EngineProvider`];
//! this crate never decodes or renders media. It coordinates engine lifetime,
//! multiplexes state callbacks to listeners, and suppresses stale results
//! from asynchronous media resolution.

pub mod captions;
pub mod engine;
pub mod fetch;
pub mod media;
pub mod player;
pub mod preview_cache;
pub mod settings;

pub use captions::CaptionTrack;
pub use engine::{EngineProvider, ItemStatus, PlaybackEngine, PlayerError, TimeControl};
pub use fetch::{FetchCancel, FetchError, HttpPreviewFetcher, PreviewFetcher};
pub use media::MediaDescriptor;
pub use player::{LoadOptions, MediaPlayer, MediaSurface, PlaybackState, PlayerStateListener};
pub use preview_cache::ImagePreviewCache;
pub use settings::{
    JsonSettingsStore, MemorySettingsStore, SettingsStore, CAPTIONS_ENABLED_KEY,
};
