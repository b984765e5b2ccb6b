//! Inline looping player surface.
//!
//! [`PlayerSurface`] is the egui widget; [`SurfaceShared`] is its shared
//! state, which implements the player's surface contract and carries all
//! behavior that does not need a `Ui`: thumbnail preloading with stale-result
//! suppression, the tap policy, loop-count politeness muting and control
//! auto-hide. The widget half is a thin painter over that state.
//!
//! Locking mirrors the player: a re-entrant lock around the state, with the
//! interior borrow never held across a call into the player or the settings
//! store when that call can re-enter the surface.

use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use egui::{Color32, CornerRadius, Rect, Response, Sense, TextureHandle, TextureOptions, Ui, Vec2};
use parking_lot::ReentrantMutex;
use poll_promise::Promise;

use loopview_core::{
    FetchCancel, FetchError, HttpPreviewFetcher, ImagePreviewCache, JsonSettingsStore,
    LoadOptions, MediaDescriptor, MediaPlayer, MediaSurface, MemorySettingsStore, PlaybackState,
    PlayerStateListener, PreviewFetcher, SettingsStore, CAPTIONS_ENABLED_KEY,
};

use super::shimmer;
use super::surface_controls::SurfaceControls;

/// Behavior knobs for a surface.
#[derive(Clone)]
pub struct SurfaceConfig {
    /// Loops with audible sound before the surface mutes the player.
    pub max_loops_before_mute: u32,
    /// How long controls stay up after an interaction.
    pub hide_delay: Duration,
    /// How long controls stay up when playback first becomes ready.
    pub initial_hide_delay: Duration,
    /// Control fade-in time in seconds.
    pub fade_in: f32,
    /// Control fade-out time in seconds.
    pub fade_out: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            max_loops_before_mute: 3,
            hide_delay: Duration::from_millis(2500),
            initial_hide_delay: Duration::from_secs(3),
            fade_in: 0.1,
            fade_out: 0.4,
        }
    }
}

/// A preview fetch still in flight. Dropping the promise only detaches the
/// worker; `cancel` is tripped on supersession so the fetch stops early.
struct PendingFetch {
    generation: u64,
    media: Arc<MediaDescriptor>,
    cancel: FetchCancel,
    promise: Promise<Result<Arc<Vec<u8>>, FetchError>>,
}

/// Resolved preview for the current media. The texture is uploaded lazily
/// on the first paint.
struct PreviewImage {
    media: Arc<MediaDescriptor>,
    bytes: Arc<Vec<u8>>,
    texture: Option<TextureHandle>,
}

struct SurfaceState {
    media: Option<Arc<MediaDescriptor>>,
    player: Option<Weak<MediaPlayer>>,
    playback_state: PlaybackState,
    loop_count: u32,
    sound_on: bool,
    captions_on: bool,
    controls_visible: bool,
    hide_at: Option<Instant>,
    fetch: Option<PendingFetch>,
    fetch_generation: u64,
    preview: Option<PreviewImage>,
}

impl SurfaceState {
    fn new() -> Self {
        Self {
            media: None,
            player: None,
            playback_state: PlaybackState::Unknown,
            loop_count: 0,
            sound_on: false,
            captions_on: false,
            controls_visible: false,
            hide_at: None,
            fetch: None,
            fetch_generation: 0,
            preview: None,
        }
    }
}

/// Shared half of a player surface. Implements the surface contract and all
/// the headless policy; safe to drive without a `Ui`.
pub struct SurfaceShared {
    weak_self: Weak<SurfaceShared>,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<ImagePreviewCache>,
    fetcher: Arc<dyn PreviewFetcher>,
    config: SurfaceConfig,
    state: ReentrantMutex<RefCell<SurfaceState>>,
}

impl SurfaceShared {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        cache: Arc<ImagePreviewCache>,
        fetcher: Arc<dyn PreviewFetcher>,
        config: SurfaceConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            settings,
            cache,
            fetcher,
            config,
            state: ReentrantMutex::new(RefCell::new(SurfaceState::new())),
        })
    }

    fn as_surface(&self) -> Option<Arc<dyn MediaSurface>> {
        self.weak_self
            .upgrade()
            .map(|strong| strong as Arc<dyn MediaSurface>)
    }

    fn player(&self) -> Option<Arc<MediaPlayer>> {
        let guard = self.state.lock();
        let player = guard.borrow().player.as_ref().and_then(Weak::upgrade);
        player
    }

    /// Remember `player` and detach from the previously bound one, so a
    /// surface that moves between players never receives events from both.
    fn bind_player(&self, player: &Arc<MediaPlayer>) {
        let previous = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            let previous = state
                .player
                .as_ref()
                .and_then(Weak::upgrade)
                .filter(|p| !Arc::ptr_eq(p, player));
            state.player = Some(Arc::downgrade(player));
            previous
        };
        if let Some(previous) = previous {
            if let Some(me) = self.as_surface() {
                previous.unbind_surface(&me);
            }
        }
    }

    /// Drive background work: the bound player's poll loop, preview fetch
    /// completion (with stale-result suppression) and the control hide
    /// timer. Called from `show`, or directly in headless use.
    pub fn pump(&self) {
        if let Some(player) = self.player() {
            player.poll();
        }

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if let Some(fetch) = state.fetch.take() {
            let PendingFetch {
                generation,
                media,
                cancel,
                promise,
            } = fetch;
            match promise.try_take() {
                Ok(result) => {
                    let current = generation == state.fetch_generation
                        && state
                            .media
                            .as_ref()
                            .is_some_and(|m| Arc::ptr_eq(m, &media));
                    match result {
                        Ok(bytes) => {
                            if let Some(url) = &media.image_preview_url {
                                self.cache.put(url, bytes.clone());
                            }
                            if current {
                                state.preview = Some(PreviewImage {
                                    media,
                                    bytes,
                                    texture: None,
                                });
                            } else {
                                tracing::debug!("Discarding stale preview fetch");
                            }
                        }
                        Err(FetchError::Cancelled) => {
                            tracing::debug!("Preview fetch stopped after cancellation");
                        }
                        Err(err) => {
                            // Preview failures stay silent; the shimmer keeps
                            // showing and a later preload may retry.
                            tracing::warn!(%err, "Preview fetch failed");
                        }
                    }
                }
                Err(promise) => {
                    state.fetch = Some(PendingFetch {
                        generation,
                        media,
                        cancel,
                        promise,
                    });
                }
            }
        }

        if state.hide_at.is_some_and(|at| Instant::now() >= at) {
            state.hide_at = None;
            state.controls_visible = false;
        }
    }

    /// The tap policy. A tap either starts a load (no media loaded here, or
    /// this surface's media is not what the player has) or acts on the
    /// running playback: unmute-and-resume when paused, otherwise toggle
    /// sound. Without media the tap does nothing.
    pub fn tapped(&self) {
        let (media, player) = {
            let guard = self.state.lock();
            let state = guard.borrow();
            (state.media.clone(), state.player.clone())
        };
        let Some(media) = media else {
            return;
        };
        let Some(player) = player.and_then(|w| w.upgrade()) else {
            return;
        };

        if !player.is_current(&media) || !player.has_engine() {
            if let Some(surface) = self.as_surface() {
                player.load_media(&media, LoadOptions::default(), Some(&surface));
            }
            return;
        }

        if player.state() == PlaybackState::Paused {
            player.set_muted(false);
            player.resume();
        } else {
            player.set_muted(!player.is_muted());
        }
        self.show_controls(self.config.hide_delay);
    }

    /// Show controls and (re)arm the hide timer; an earlier timer is
    /// replaced, not stacked.
    pub fn show_controls(&self, delay: Duration) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        Self::show_controls_locked(&mut state, delay);
    }

    fn show_controls_locked(state: &mut SurfaceState, delay: Duration) {
        state.controls_visible = true;
        state.hide_at = Some(Instant::now() + delay);
    }

    fn reset_controls_locked(state: &mut SurfaceState) {
        state.controls_visible = false;
        state.hide_at = None;
        state.sound_on = false;
    }

    /// Toggle captions: flips the persisted preference and applies it to the
    /// bound player's engine.
    pub fn toggle_captions(&self) {
        let enabled = !self.settings.bool_for(CAPTIONS_ENABLED_KEY);
        self.set_captions_enabled(enabled);
        self.show_controls(self.config.hide_delay);
    }

    fn set_captions_enabled(&self, enabled: bool) {
        self.settings.set_bool(CAPTIONS_ENABLED_KEY, enabled);
        {
            let guard = self.state.lock();
            guard.borrow_mut().captions_on = enabled;
        }
        if let Some(player) = self.player() {
            player.set_captions_enabled(enabled);
        }
    }

    // Inspection, used by the widget half and by tests.

    pub fn current_media(&self) -> Option<Arc<MediaDescriptor>> {
        let guard = self.state.lock();
        let media = guard.borrow().media.clone();
        media
    }

    pub fn playback_state(&self) -> PlaybackState {
        let guard = self.state.lock();
        let state = guard.borrow().playback_state;
        state
    }

    pub fn loop_count(&self) -> u32 {
        let guard = self.state.lock();
        let count = guard.borrow().loop_count;
        count
    }

    pub fn sound_on(&self) -> bool {
        let guard = self.state.lock();
        let on = guard.borrow().sound_on;
        on
    }

    pub fn captions_on(&self) -> bool {
        let guard = self.state.lock();
        let on = guard.borrow().captions_on;
        on
    }

    pub fn controls_visible(&self) -> bool {
        let guard = self.state.lock();
        let visible = guard.borrow().controls_visible;
        visible
    }

    /// Whether preview bytes for the current media are available.
    pub fn has_preview(&self) -> bool {
        let guard = self.state.lock();
        let has = guard.borrow().preview.is_some();
        has
    }

    /// Bytes of the resolved preview, if any.
    pub fn preview_bytes(&self) -> Option<Arc<Vec<u8>>> {
        let guard = self.state.lock();
        let bytes = guard.borrow().preview.as_ref().map(|p| p.bytes.clone());
        bytes
    }

    /// Whether a preview fetch is in flight.
    pub fn is_fetching_preview(&self) -> bool {
        let guard = self.state.lock();
        let fetching = guard.borrow().fetch.is_some();
        fetching
    }

    /// Paint the surface into `rect`. Thumbnail when resolved, shimmer while
    /// anything is still loading, controls on top.
    fn paint(&self, ui: &mut Ui, rect: Rect) {
        let base_id = egui::Id::new(self as *const Self as usize);

        // Upload preview bytes on first paint; undecodable bytes are
        // dropped so the shimmer shows instead.
        let texture = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if let Some(preview) = state.preview.as_mut() {
                if preview.texture.is_none() {
                    preview.texture = decode_texture(ui.ctx(), &preview.bytes);
                    if preview.texture.is_none() {
                        tracing::warn!(
                            url = ?preview.media.image_preview_url,
                            "Failed to decode preview image"
                        );
                    }
                }
            }
            if state.preview.as_ref().is_some_and(|p| p.texture.is_none()) {
                state.preview = None;
            }
            state.preview.as_ref().and_then(|p| p.texture.clone())
        };

        let (media, sound_on, captions_on, controls_visible, fetching, hide_at) = {
            let guard = self.state.lock();
            let state = guard.borrow();
            (
                state.media.clone(),
                state.sound_on,
                state.captions_on,
                state.controls_visible,
                state.fetch.is_some(),
                state.hide_at,
            )
        };

        ui.painter().rect_filled(rect, CornerRadius::ZERO, Color32::BLACK);

        let aspect = media.as_ref().map_or(1.0, |m| m.aspect_ratio);
        let content = aspect_fit(rect, aspect);

        if let Some(texture) = &texture {
            ui.painter().image(
                texture.id(),
                content,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        } else if let Some(media) = &media {
            let time = ui.input(|i| i.time);
            shimmer::paint(
                &ui.painter().with_clip_rect(rect),
                content,
                time,
                shimmer::placeholder_color(&media.video_url),
            );
            ui.ctx().request_repaint();
        }

        // Controls overlay. The speaker stays up whenever sound is off, even
        // after the hide timer fires, doubling as the tap-for-sound hint over
        // a bare thumbnail; the caption button needs matching tracks.
        let player = self.player();
        let captions_available = player.as_ref().is_some_and(|p| p.captions_available());
        let speaker_target = media.is_some() && (controls_visible || !sound_on);
        let captions_target = controls_visible && captions_available;

        let sound_alpha = ui.ctx().animate_bool_with_time(
            base_id.with("sound"),
            speaker_target,
            if speaker_target {
                self.config.fade_in
            } else {
                self.config.fade_out
            },
        );
        let captions_alpha = ui.ctx().animate_bool_with_time(
            base_id.with("captions"),
            captions_target,
            if captions_target {
                self.config.fade_in
            } else {
                self.config.fade_out
            },
        );

        if sound_alpha > 0.0 || captions_alpha > 0.0 {
            let controls = SurfaceControls::new(sound_on, captions_on)
                .with_alphas(sound_alpha, captions_alpha);
            let controls_response = controls.show(ui, rect);
            if controls_response.toggle_captions {
                self.toggle_captions();
            }
        }

        if fetching {
            ui.ctx().request_repaint();
        }
        if let Some(at) = hide_at {
            let now = Instant::now();
            if at > now {
                ui.ctx().request_repaint_after(at - now);
            }
        }
    }
}

impl PlayerStateListener for SurfaceShared {
    fn player_state_did_change(&self, playback_state: PlaybackState) {
        let mut auto_mute = false;
        let mut apply_captions = false;
        {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            match playback_state {
                PlaybackState::Repeated => {
                    state.loop_count += 1;
                    if state.loop_count == self.config.max_loops_before_mute && state.sound_on {
                        auto_mute = true;
                    }
                }
                PlaybackState::ReadyToPlay => {
                    state.playback_state = playback_state;
                    apply_captions = self.settings.bool_for(CAPTIONS_ENABLED_KEY);
                    state.captions_on = apply_captions;
                    Self::show_controls_locked(&mut state, self.config.initial_hide_delay);
                }
                other => state.playback_state = other,
            }
        }
        if let Some(player) = self.player() {
            if auto_mute && !player.is_muted() {
                tracing::debug!("Loop limit reached, muting");
                player.set_muted(true);
            }
            if apply_captions {
                player.set_captions_enabled(true);
            }
        }
    }

    fn player_did_fail(&self, message: &str) {
        tracing::warn!(%message, "Playback failed on surface");
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.playback_state = PlaybackState::Unknown;
        Self::reset_controls_locked(&mut state);
    }

    fn mute_did_change(&self, muted: bool) {
        let guard = self.state.lock();
        guard.borrow_mut().sound_on = !muted;
    }

    fn media_did_change(&self, media: Option<&Arc<MediaDescriptor>>) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.loop_count = 0;
        let ours = match (media, &state.media) {
            (Some(new), Some(current)) => Arc::ptr_eq(new, current),
            _ => false,
        };
        if !ours {
            // The player moved on to someone else's media.
            state.playback_state = PlaybackState::Unknown;
            Self::reset_controls_locked(&mut state);
        }
    }
}

impl MediaSurface for SurfaceShared {
    fn preload_first_frame(&self, media: &Arc<MediaDescriptor>, player: &Arc<MediaPlayer>) {
        self.bind_player(player);

        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.media = Some(media.clone());
        state.loop_count = 0;

        // Already showing this item's preview.
        if state
            .preview
            .as_ref()
            .is_some_and(|p| Arc::ptr_eq(&p.media, media))
        {
            if let Some(old) = state.fetch.take() {
                old.cancel.cancel();
            }
            return;
        }
        state.preview = None;
        // Supersede any in-flight fetch: stop the work itself, and bump the
        // generation so a result already produced will not apply.
        state.fetch_generation += 1;
        if let Some(old) = state.fetch.take() {
            old.cancel.cancel();
        }

        let Some(url) = media.image_preview_url.clone() else {
            return;
        };

        if let Some(bytes) = self.cache.get(&url) {
            state.preview = Some(PreviewImage {
                media: media.clone(),
                bytes,
                texture: None,
            });
            return;
        }

        tracing::debug!(%url, "Fetching preview");
        let fetcher = self.fetcher.clone();
        let generation = state.fetch_generation;
        let cancel = FetchCancel::new();
        let fetch_cancel = cancel.clone();
        let promise = Promise::spawn_thread("loopview-preview-fetch", move || {
            fetcher.fetch(&url, &fetch_cancel).map(Arc::new)
        });
        state.fetch = Some(PendingFetch {
            generation,
            media: media.clone(),
            cancel,
            promise,
        });
    }

    fn prepare(&self, media: &Arc<MediaDescriptor>, player: &Arc<MediaPlayer>) {
        self.bind_player(player);
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.media = Some(media.clone());
        state.loop_count = 0;
        state.playback_state = PlaybackState::Unknown;
        Self::reset_controls_locked(&mut state);
    }
}

/// The egui widget over a [`SurfaceShared`].
pub struct PlayerSurface {
    shared: Arc<SurfaceShared>,
}

impl PlayerSurface {
    /// Surface with explicit settings and cache, the production fetcher and
    /// default behavior.
    pub fn new(settings: Arc<dyn SettingsStore>, cache: Arc<ImagePreviewCache>) -> Self {
        Self {
            shared: SurfaceShared::new(
                settings,
                cache,
                Arc::new(HttpPreviewFetcher),
                SurfaceConfig::default(),
            ),
        }
    }

    /// Fully customized surface.
    pub fn with_parts(
        settings: Arc<dyn SettingsStore>,
        cache: Arc<ImagePreviewCache>,
        fetcher: Arc<dyn PreviewFetcher>,
        config: SurfaceConfig,
    ) -> Self {
        Self {
            shared: SurfaceShared::new(settings, cache, fetcher, config),
        }
    }

    /// Surface with platform-default settings and cache locations. Falls
    /// back to in-memory settings when the platform has no config dir.
    pub fn with_defaults() -> Self {
        let settings: Arc<dyn SettingsStore> = match JsonSettingsStore::new() {
            Some(store) => Arc::new(store),
            None => Arc::new(MemorySettingsStore::default()),
        };
        Self::new(settings, ImagePreviewCache::shared())
    }

    /// The shared half, for handing to [`MediaPlayer::prepare`] and
    /// [`MediaPlayer::load_media`].
    pub fn handle(&self) -> Arc<SurfaceShared> {
        self.shared.clone()
    }

    pub fn as_media_surface(&self) -> Arc<dyn MediaSurface> {
        self.shared.clone()
    }

    /// Render the surface and handle taps. Call every frame.
    pub fn show(&mut self, ui: &mut Ui, size: Vec2) -> Response {
        self.shared.pump();

        let (rect, response) = ui.allocate_exact_size(size, Sense::click());
        if response.clicked() {
            self.shared.tapped();
        }
        if ui.is_rect_visible(rect) {
            self.shared.paint(ui, rect);
        }
        response
    }
}

/// Largest rect with the given aspect ratio centered inside `rect`.
fn aspect_fit(rect: Rect, aspect_ratio: f32) -> Rect {
    let aspect = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    };
    let mut size = Vec2::new(rect.width(), rect.width() / aspect);
    if size.y > rect.height() {
        size = Vec2::new(rect.height() * aspect, rect.height());
    }
    Rect::from_center_size(rect.center(), size)
}

fn decode_texture(ctx: &egui::Context, bytes: &[u8]) -> Option<TextureHandle> {
    let image = image::load_from_memory(bytes).ok()?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
    Some(ctx.load_texture("loopview-preview", color_image, TextureOptions::LINEAR))
}
