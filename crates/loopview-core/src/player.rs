//! The media player coordinator.
//!
//! [`MediaPlayer`] owns at most one playback engine at a time, resolves media
//! on a background thread, and multiplexes state callbacks to a set of weakly
//! held listeners. It is driven by `poll()` from the owning UI context: poll
//! applies finished background loads (discarding results for media that is no
//! longer current) and samples the engine to derive edge-triggered state
//! transitions.
//!
//! Locking: one re-entrant lock per player, so listener code running inside a
//! callback may call back into the player on the same thread. The interior
//! `RefCell` borrow is never held across a call-out.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use poll_promise::Promise;

use crate::captions;
use crate::engine::{EngineProvider, ItemStatus, PlaybackEngine, PlayerError, TimeControl};
use crate::media::MediaDescriptor;

/// Public playback state, derived from engine samples.
///
/// `Repeated` and `ReadyToPlay` are edge-triggered notifications: listeners
/// see them once per occurrence, while `state()` keeps reporting the
/// underlying transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No engine, or readiness not yet determined.
    Unknown,
    /// The current item became playable. Reported once per load.
    ReadyToPlay,
    /// The transport is advancing.
    Playing,
    /// The transport is halted.
    Paused,
    /// Playback crossed a loop boundary while playing.
    Repeated,
    /// The transport is stalled waiting for data.
    Idle,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing | Self::Repeated)
    }
}

/// Callbacks multiplexed to everyone observing a player.
///
/// All methods default to no-ops so listeners implement only what they need.
/// Callbacks are invoked from the thread that drives the player, with the
/// player's lock re-entrant: calling back into the player is allowed.
pub trait PlayerStateListener: Send + Sync {
    fn player_state_did_change(&self, _state: PlaybackState) {}
    fn player_did_fail(&self, _message: &str) {}
    fn mute_did_change(&self, _muted: bool) {}
    fn media_did_change(&self, _media: Option<&Arc<MediaDescriptor>>) {}
}

/// The surface half of the player/surface contract.
///
/// A surface is also a listener; the player additionally asks it to preload
/// a first frame ahead of playback and to prepare when a load begins. The
/// player holds its surface weakly.
pub trait MediaSurface: PlayerStateListener {
    /// Resolve and show a preview image for `media` without starting
    /// playback.
    fn preload_first_frame(&self, media: &Arc<MediaDescriptor>, player: &Arc<MediaPlayer>);

    /// A load of `media` has started on `player`; show loading chrome and
    /// bind to the player.
    fn prepare(&self, media: &Arc<MediaDescriptor>, player: &Arc<MediaPlayer>);
}

/// Per-load playback options.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Start playback as soon as the engine is ready.
    pub autoplay: bool,
    /// Start with audio muted.
    pub mute_on_play: bool,
    /// Loop seamlessly at the end.
    pub repeatable: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            mute_on_play: false,
            repeatable: true,
        }
    }
}

/// A background engine resolution still in flight.
struct PendingLoad {
    media: Arc<MediaDescriptor>,
    promise: Promise<Result<Box<dyn PlaybackEngine + Send>, PlayerError>>,
}

struct PlayerInner {
    media: Option<Arc<MediaDescriptor>>,
    engine: Option<Box<dyn PlaybackEngine + Send>>,
    pending: Option<PendingLoad>,
    surface: Option<Weak<dyn MediaSurface>>,
    listeners: Vec<Weak<dyn PlayerStateListener>>,
    options: LoadOptions,
    state: PlaybackState,
    first_start: bool,
    last_time_control: Option<TimeControl>,
    last_boundary_count: u64,
}

impl PlayerInner {
    fn new() -> Self {
        Self {
            media: None,
            engine: None,
            pending: None,
            surface: None,
            listeners: Vec::new(),
            options: LoadOptions::default(),
            state: PlaybackState::Unknown,
            first_start: true,
            last_time_control: None,
            last_boundary_count: 0,
        }
    }
}

/// An event to deliver to listeners once the lock-guarded borrow is
/// released.
enum Event {
    State(PlaybackState),
    Failed(String),
    Mute(bool),
    MediaChanged(Option<Arc<MediaDescriptor>>),
}

/// Engine-agnostic looping media player.
pub struct MediaPlayer {
    provider: Arc<dyn EngineProvider>,
    inner: ReentrantMutex<RefCell<PlayerInner>>,
}

impl MediaPlayer {
    pub fn new(provider: Arc<dyn EngineProvider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            inner: ReentrantMutex::new(RefCell::new(PlayerInner::new())),
        })
    }

    /// Bind `surface` and ask it to preload a first frame for `media`.
    /// Does not create an engine and does not change the current media.
    pub fn prepare(self: &Arc<Self>, media: &Arc<MediaDescriptor>, surface: &Arc<dyn MediaSurface>) {
        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.surface = Some(Arc::downgrade(surface));
            let listener: Arc<dyn PlayerStateListener> = surface.clone();
            Self::add_listener_locked(&mut inner, &listener);
        }
        surface.preload_first_frame(media, self);
    }

    /// Replace the current media and start resolving an engine for it.
    ///
    /// Tears down any previous load synchronously, announces the media
    /// change, then resolves off-thread; the result is applied by a later
    /// `poll()` only if this media is still current. With `surface = None`
    /// the previously bound surface (if alive) is prepared instead.
    pub fn load_media(
        self: &Arc<Self>,
        media: &Arc<MediaDescriptor>,
        options: LoadOptions,
        surface: Option<&Arc<dyn MediaSurface>>,
    ) {
        self.stop();

        let surface = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.media = Some(media.clone());
            inner.options = options;
            inner.state = PlaybackState::Unknown;
            inner.first_start = true;
            let surface = match surface {
                Some(surface) => {
                    inner.surface = Some(Arc::downgrade(surface));
                    Some(surface.clone())
                }
                None => inner.surface.as_ref().and_then(Weak::upgrade),
            };
            if let Some(surface) = &surface {
                let listener: Arc<dyn PlayerStateListener> = surface.clone();
                Self::add_listener_locked(&mut inner, &listener);
            }
            surface
        };

        self.dispatch(vec![Event::MediaChanged(Some(media.clone()))]);

        tracing::debug!(url = %media.video_url, "Resolving media");
        let provider = self.provider.clone();
        let media_for_open = media.clone();
        let promise =
            Promise::spawn_thread("loopview-media-open", move || provider.open(&media_for_open));

        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            // A listener may have re-entered load_media or stop during the
            // media change callback; only track the promise while this media
            // is still current.
            if inner.media.as_ref().is_some_and(|m| Arc::ptr_eq(m, media)) {
                inner.pending = Some(PendingLoad {
                    media: media.clone(),
                    promise,
                });
            }
        }

        if let Some(surface) = surface {
            surface.prepare(media, self);
        }
    }

    /// Apply finished background work and sample the engine. Call from the
    /// owning UI context, once per frame or tick. All listener callbacks
    /// originating from background work are delivered here.
    pub fn poll(&self) {
        let mut events = Vec::new();
        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();

            if let Some(pending) = inner.pending.take() {
                match pending.promise.try_take() {
                    Ok(result) => {
                        let current = inner
                            .media
                            .as_ref()
                            .is_some_and(|m| Arc::ptr_eq(m, &pending.media));
                        if current {
                            Self::apply_resolution(&mut inner, result, &mut events);
                        } else {
                            tracing::debug!(
                                url = %pending.media.video_url,
                                "Discarding stale media resolution"
                            );
                        }
                    }
                    Err(promise) => {
                        inner.pending = Some(PendingLoad {
                            media: pending.media,
                            promise,
                        });
                    }
                }
            }

            let sample = inner
                .engine
                .as_ref()
                .map(|e| (e.item_status(), e.time_control(), e.boundary_count()));
            if let Some((status, time_control, boundaries)) = sample {
                Self::observe_engine(&mut inner, status, time_control, boundaries, &mut events);
            }
        }
        self.dispatch(events);
    }

    fn apply_resolution(
        inner: &mut PlayerInner,
        result: Result<Box<dyn PlaybackEngine + Send>, PlayerError>,
        events: &mut Vec<Event>,
    ) {
        match result {
            Ok(mut engine) => {
                engine.set_looping(inner.options.repeatable);
                engine.set_muted(inner.options.mute_on_play);
                // Baseline the transport before autoplay so the Playing
                // transition is observed as an edge on a later poll.
                inner.last_time_control = Some(engine.time_control());
                if inner.options.autoplay {
                    engine.play();
                }
                inner.last_boundary_count = engine.boundary_count();
                inner.engine = Some(engine);
                tracing::debug!("Media resolved, engine attached");
                // Announce the starting mute state so listeners do not have
                // to guess it from the load options.
                events.push(Event::Mute(inner.options.mute_on_play));
            }
            Err(err) => {
                tracing::warn!(%err, "Media resolution failed");
                events.push(Event::Failed(err.to_string()));
            }
        }
    }

    fn observe_engine(
        inner: &mut PlayerInner,
        status: ItemStatus,
        time_control: TimeControl,
        boundaries: u64,
        events: &mut Vec<Event>,
    ) {
        if let ItemStatus::Failed(message) = status {
            tracing::warn!(%message, "Engine reported item failure");
            inner.engine = None;
            inner.state = PlaybackState::Unknown;
            inner.last_time_control = None;
            events.push(Event::Failed(message));
            return;
        }

        if status == ItemStatus::ReadyToPlay && inner.first_start {
            inner.first_start = false;
            inner.state = PlaybackState::ReadyToPlay;
            events.push(Event::State(PlaybackState::ReadyToPlay));
        }

        if inner.last_time_control != Some(time_control) {
            inner.last_time_control = Some(time_control);
            let state = match time_control {
                TimeControl::Playing => PlaybackState::Playing,
                TimeControl::Paused => PlaybackState::Paused,
                TimeControl::Waiting => PlaybackState::Idle,
            };
            inner.state = state;
            events.push(Event::State(state));
        } else if time_control == TimeControl::Playing && boundaries > inner.last_boundary_count {
            events.push(Event::State(PlaybackState::Repeated));
        }
        inner.last_boundary_count = boundaries;
    }

    pub fn pause(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(engine) = inner.engine.as_mut() {
            engine.pause();
        }
    }

    pub fn resume(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(engine) = inner.engine.as_mut() {
            engine.play();
        }
    }

    /// Mute or unmute the engine and notify listeners. No-op without an
    /// engine.
    pub fn set_muted(&self, muted: bool) {
        let changed = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.engine.as_mut() {
                Some(engine) => {
                    engine.set_muted(muted);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.dispatch(vec![Event::Mute(muted)]);
        }
    }

    pub fn is_muted(&self) -> bool {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.engine.as_ref().is_some_and(|e| e.is_muted())
    }

    /// Tear down the current load: abandons any in-flight resolution, halts
    /// and releases the engine, and clears the current media. Safe to call
    /// repeatedly and on an already-stopped player. Emits no callbacks.
    pub fn stop(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.pending = None;
        if let Some(mut engine) = inner.engine.take() {
            engine.pause();
        }
        inner.media = None;
        inner.state = PlaybackState::Unknown;
        inner.first_start = true;
        inner.last_time_control = None;
        inner.last_boundary_count = 0;
    }

    /// Detach `surface` from this player: clears the surface binding when
    /// it is the bound one and removes it from the listener set. Surfaces
    /// call this when they move to another player.
    pub fn unbind_surface(&self, surface: &Arc<dyn MediaSurface>) {
        let listener: Arc<dyn PlayerStateListener> = surface.clone();
        let weak = Arc::downgrade(&listener);
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner
            .surface
            .as_ref()
            .is_some_and(|w| std::ptr::addr_eq(w.as_ptr(), Arc::as_ptr(surface)))
        {
            inner.surface = None;
        }
        inner.listeners.retain(|w| !same_listener(w, &weak));
    }

    /// Register a listener. Registration is identity-based and idempotent:
    /// adding the same listener twice keeps a single registration.
    pub fn add_listener(&self, listener: &Arc<dyn PlayerStateListener>) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        Self::add_listener_locked(&mut inner, listener);
    }

    /// Remove a listener by identity. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn PlayerStateListener>) {
        let weak = Arc::downgrade(listener);
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.listeners.retain(|w| !same_listener(w, &weak));
    }

    fn add_listener_locked(inner: &mut PlayerInner, listener: &Arc<dyn PlayerStateListener>) {
        let weak = Arc::downgrade(listener);
        if !inner.listeners.iter().any(|w| same_listener(w, &weak)) {
            inner.listeners.push(weak);
        }
    }

    pub fn state(&self) -> PlaybackState {
        let guard = self.inner.lock();
        let state = guard.borrow().state;
        state
    }

    pub fn current_media(&self) -> Option<Arc<MediaDescriptor>> {
        let guard = self.inner.lock();
        let media = guard.borrow().media.clone();
        media
    }

    /// Whether `media` is the player's current item, by identity.
    pub fn is_current(&self, media: &Arc<MediaDescriptor>) -> bool {
        let guard = self.inner.lock();
        let current = guard
            .borrow()
            .media
            .as_ref()
            .is_some_and(|m| Arc::ptr_eq(m, media));
        current
    }

    pub fn has_engine(&self) -> bool {
        let guard = self.inner.lock();
        let has = guard.borrow().engine.is_some();
        has
    }

    /// Whether a background resolution is still in flight.
    pub fn is_loading(&self) -> bool {
        let guard = self.inner.lock();
        let loading = guard.borrow().pending.is_some();
        loading
    }

    /// Whether the current engine carries captions for the UI locale.
    pub fn captions_available(&self) -> bool {
        self.captions_available_for_locale(&captions::current_locale())
    }

    pub fn captions_available_for_locale(&self, locale: &str) -> bool {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .engine
            .as_ref()
            .is_some_and(|e| captions::preferred(&e.caption_tracks(), locale).is_some())
    }

    /// Select or clear the locale-preferred caption track on the engine.
    /// Enabling with no matching track leaves the selection untouched.
    pub fn set_captions_enabled(&self, enabled: bool) {
        self.set_captions_enabled_for_locale(enabled, &captions::current_locale());
    }

    pub fn set_captions_enabled_for_locale(&self, enabled: bool, locale: &str) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(engine) = inner.engine.as_mut() {
            if enabled {
                let tracks = engine.caption_tracks();
                if let Some(track) = captions::preferred(&tracks, locale) {
                    engine.select_caption_track(Some(track));
                }
            } else {
                engine.select_caption_track(None);
            }
        }
    }

    /// The currently bound surface, if one is alive.
    pub fn bound_surface(&self) -> Option<Arc<dyn MediaSurface>> {
        let guard = self.inner.lock();
        let surface = guard.borrow().surface.as_ref().and_then(Weak::upgrade);
        surface
    }

    /// Deliver events to a snapshot of live listeners, lock released.
    fn dispatch(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn PlayerStateListener>> = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.listeners.retain(|w| w.strong_count() > 0);
            inner.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for event in &events {
            for listener in &listeners {
                match event {
                    Event::State(state) => listener.player_state_did_change(*state),
                    Event::Failed(message) => listener.player_did_fail(message),
                    Event::Mute(muted) => listener.mute_did_change(*muted),
                    Event::MediaChanged(media) => listener.media_did_change(media.as_ref()),
                }
            }
        }
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn same_listener(a: &Weak<dyn PlayerStateListener>, b: &Weak<dyn PlayerStateListener>) -> bool {
    // Identity is the allocation; vtable pointers may differ per codegen
    // unit, so only the data address is compared.
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_autoplay_and_loop() {
        let options = LoadOptions::default();
        assert!(options.autoplay);
        assert!(!options.mute_on_play);
        assert!(options.repeatable);
    }

    #[test]
    fn repeated_counts_as_playing() {
        assert!(PlaybackState::Playing.is_playing());
        assert!(PlaybackState::Repeated.is_playing());
        assert!(!PlaybackState::Paused.is_playing());
        assert!(!PlaybackState::Idle.is_playing());
    }
}
