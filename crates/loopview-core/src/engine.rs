//! Playback engine seam.
//!
//! The player never touches a platform media framework directly. Each load
//! produces one engine through an injected [`EngineProvider`]; the player
//! drives it through [`PlaybackEngine`] and derives its public state machine
//! by sampling the engine from `poll()`. Observation is explicit: there is no
//! hidden callback channel from the engine back into the player.

use std::{error::Error, fmt};

use crate::captions::CaptionTrack;
use crate::media::MediaDescriptor;

/// Errors from engine construction and playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Media could not be resolved or opened.
    OpenFailed(String),
    /// The engine reported an unrecoverable playback failure.
    Playback(String),
    /// Network-level failure while resolving media.
    Network(String),
    /// Catch-all.
    Generic(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed(msg) => write!(f, "Failed to open media: {msg}"),
            Self::Playback(msg) => write!(f, "Playback failed: {msg}"),
            Self::Network(msg) => write!(f, "Network error: {msg}"),
            Self::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for PlayerError {}

/// Coarse transport state sampled from the engine.
///
/// Mirrors what real media frameworks expose: actively advancing, halted,
/// or stalled waiting for data while nominally playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControl {
    Playing,
    Paused,
    Waiting,
}

/// Readiness of the engine's current item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Not yet determined.
    Unknown,
    /// The item can start playback.
    ReadyToPlay,
    /// The item failed; carries a display message.
    Failed(String),
}

/// One opened playback engine, owned by the player for the lifetime of a
/// single load.
///
/// Implementations wrap a platform player (or a test double). All methods are
/// called from the thread that polls the owning player. Defaults are provided
/// for the optional capabilities so minimal engines stay small.
pub trait PlaybackEngine: Send {
    fn play(&mut self);
    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;

    fn time_control(&self) -> TimeControl;
    fn item_status(&self) -> ItemStatus;

    /// Monotonic count of loop boundaries crossed since open. The player
    /// reports a repeat whenever this grows while the transport stays in
    /// [`TimeControl::Playing`].
    fn boundary_count(&self) -> u64 {
        0
    }

    /// Whether playback should seamlessly restart at the end.
    fn set_looping(&mut self, _looping: bool) {}

    /// Caption tracks carried by the current item, if any.
    fn caption_tracks(&self) -> Vec<CaptionTrack> {
        Vec::new()
    }

    /// Select a caption track on every item of the engine's queue, or clear
    /// the selection with `None`.
    fn select_caption_track(&mut self, _track: Option<&CaptionTrack>) {}
}

/// Factory for playback engines.
///
/// `open` runs on a background thread: it may block on asset resolution.
/// The player applies the result on its own polling context and discards it
/// if the load has been superseded in the meantime.
pub trait EngineProvider: Send + Sync {
    fn open(&self, media: &MediaDescriptor) -> Result<Box<dyn PlaybackEngine + Send>, PlayerError>;
}
