//! Behavioral tests for the player coordinator, driven by scripted engines.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use loopview_core::{
    CaptionTrack, EngineProvider, ItemStatus, LoadOptions, MediaDescriptor, MediaPlayer,
    PlaybackEngine, PlaybackState, PlayerError, PlayerStateListener, TimeControl,
};

/// Shared handle that a test keeps to drive and inspect its mock engine.
#[derive(Default)]
struct EngineHandle {
    muted: Mutex<bool>,
    time_control: Mutex<Option<TimeControl>>,
    status: Mutex<Option<ItemStatus>>,
    boundaries: AtomicU64,
    looping: Mutex<bool>,
    tracks: Mutex<Vec<CaptionTrack>>,
    selected: Mutex<Option<Option<CaptionTrack>>>,
}

impl EngineHandle {
    fn ready() -> Arc<Self> {
        let handle = Arc::new(Self::default());
        *handle.status.lock() = Some(ItemStatus::ReadyToPlay);
        handle
    }

    fn cross_boundary(&self) {
        self.boundaries.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockEngine {
    handle: Arc<EngineHandle>,
}

impl PlaybackEngine for MockEngine {
    fn play(&mut self) {
        *self.handle.time_control.lock() = Some(TimeControl::Playing);
    }

    fn pause(&mut self) {
        *self.handle.time_control.lock() = Some(TimeControl::Paused);
    }

    fn set_muted(&mut self, muted: bool) {
        *self.handle.muted.lock() = muted;
    }

    fn is_muted(&self) -> bool {
        *self.handle.muted.lock()
    }

    fn time_control(&self) -> TimeControl {
        self.handle.time_control.lock().unwrap_or(TimeControl::Paused)
    }

    fn item_status(&self) -> ItemStatus {
        self.handle
            .status
            .lock()
            .clone()
            .unwrap_or(ItemStatus::Unknown)
    }

    fn boundary_count(&self) -> u64 {
        self.handle.boundaries.load(Ordering::SeqCst)
    }

    fn set_looping(&mut self, looping: bool) {
        *self.handle.looping.lock() = looping;
    }

    fn caption_tracks(&self) -> Vec<CaptionTrack> {
        self.handle.tracks.lock().clone()
    }

    fn select_caption_track(&mut self, track: Option<&CaptionTrack>) {
        *self.handle.selected.lock() = Some(track.cloned());
    }
}

/// What the provider should do for the `open` of one URL. Opens run on
/// concurrent background threads, so scripts are keyed by URL rather than
/// consumed in call order.
enum Script {
    Open(Arc<EngineHandle>),
    Fail(PlayerError),
    /// Block until the test sends a follow-up script.
    Gated(mpsc::Receiver<Script>),
}

struct ScriptedProvider {
    scripts: Mutex<VecDeque<(String, Script)>>,
}

impl ScriptedProvider {
    fn new(scripts: Vec<(&str, Script)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(
                scripts
                    .into_iter()
                    .map(|(url, script)| (url.to_string(), script))
                    .collect(),
            ),
        })
    }
}

fn run_script(script: Script) -> Result<Box<dyn PlaybackEngine + Send>, PlayerError> {
    match script {
        Script::Open(handle) => Ok(Box::new(MockEngine { handle })),
        Script::Fail(err) => Err(err),
        Script::Gated(rx) => run_script(rx.recv().expect("gate sender dropped")),
    }
}

impl EngineProvider for ScriptedProvider {
    fn open(&self, media: &MediaDescriptor) -> Result<Box<dyn PlaybackEngine + Send>, PlayerError> {
        let script = {
            let mut scripts = self.scripts.lock();
            let at = scripts
                .iter()
                .position(|(url, _)| *url == media.video_url)
                .expect("open called for an unscripted URL");
            scripts.remove(at).map(|(_, script)| script).expect("indexed")
        };
        run_script(script)
    }
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn count_of(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl PlayerStateListener for RecordingListener {
    fn player_state_did_change(&self, state: PlaybackState) {
        self.events.lock().push(format!("state:{state:?}"));
    }

    fn player_did_fail(&self, message: &str) {
        self.events.lock().push(format!("fail:{message}"));
    }

    fn mute_did_change(&self, muted: bool) {
        self.events.lock().push(format!("mute:{muted}"));
    }

    fn media_did_change(&self, media: Option<&Arc<MediaDescriptor>>) {
        let url = media.map_or("none".to_string(), |m| m.video_url.clone());
        self.events.lock().push(format!("media:{url}"));
    }
}

fn poll_until(player: &MediaPlayer, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        player.poll();
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn as_listener(listener: &Arc<RecordingListener>) -> Arc<dyn PlayerStateListener> {
    listener.clone()
}

#[test]
fn load_attaches_engine_and_reports_ready_then_playing() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);

    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));
    assert!(*handle.looping.lock());

    let events = listener.events();
    assert_eq!(events[0], "media:https://example.com/a.mp4");
    // The starting mute state is announced when the engine attaches.
    assert!(events.contains(&"mute:false".to_string()));
    assert!(events.contains(&"state:ReadyToPlay".to_string()));
    assert!(events.contains(&"state:Playing".to_string()));
    let ready_at = events.iter().position(|e| e == "state:ReadyToPlay").unwrap();
    let playing_at = events.iter().position(|e| e == "state:Playing").unwrap();
    assert!(ready_at < playing_at);
}

#[test]
fn ready_to_play_is_reported_once_per_load() {
    let provider = ScriptedProvider::new(vec![
        ("https://example.com/a.mp4", Script::Open(EngineHandle::ready())),
        ("https://example.com/b.mp4", Script::Open(EngineHandle::ready())),
    ]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    // Keep observing; readiness must not be reported again.
    for _ in 0..20 {
        player.poll();
    }
    assert_eq!(listener.count_of("state:ReadyToPlay"), 1);

    // A fresh load re-arms the gate.
    let next = MediaDescriptor::new("https://example.com/b.mp4");
    player.load_media(&next, LoadOptions::default(), None);
    assert!(poll_until(&player, || listener.count_of("state:ReadyToPlay") == 2));
}

#[test]
fn stale_resolution_is_discarded_silently() {
    let (gate_tx, gate_rx) = mpsc::channel();
    let b_handle = EngineHandle::ready();
    // First load is gated and would fail loudly if it were ever applied.
    let provider = ScriptedProvider::new(vec![
        ("https://example.com/a.mp4", Script::Gated(gate_rx)),
        ("https://example.com/b.mp4", Script::Open(b_handle.clone())),
    ]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let a = MediaDescriptor::new("https://example.com/a.mp4");
    let b = MediaDescriptor::new("https://example.com/b.mp4");
    player.load_media(&a, LoadOptions::default(), None);
    player.poll();

    // Supersede the first load, then let it finish with an error.
    player.load_media(&b, LoadOptions::default(), None);
    gate_tx
        .send(Script::Fail(PlayerError::OpenFailed("too late".into())))
        .unwrap();

    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));
    thread::sleep(Duration::from_millis(20));
    for _ in 0..20 {
        player.poll();
    }

    // The superseded failure produced no callback of any kind.
    assert_eq!(listener.count_of("fail:Failed to open media: too late"), 0);
    assert!(listener.events().iter().all(|e| !e.starts_with("fail:")));
    assert!(player.is_current(&b));
}

#[test]
fn non_stale_failure_is_reported() {
    let provider =
        ScriptedProvider::new(vec![(
            "https://example.com/a.mp4",
            Script::Fail(PlayerError::OpenFailed("no codec".into())),
        )]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);

    assert!(poll_until(&player, || listener
        .count_of("fail:Failed to open media: no codec")
        == 1));
    assert!(!player.has_engine());
}

#[test]
fn add_listener_is_idempotent_and_remove_forgets() {
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(EngineHandle::ready()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    let as_dyn = as_listener(&listener);
    player.add_listener(&as_dyn);
    player.add_listener(&as_dyn);
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert_eq!(listener.count_of("media:https://example.com/a.mp4"), 1);

    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));
    let events_before = listener.events().len();

    player.remove_listener(&as_listener(&listener));
    player.set_muted(true);
    player.stop();
    assert_eq!(listener.events().len(), events_before);
}

#[test]
fn dropped_listener_is_pruned() {
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(EngineHandle::ready()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));
    drop(listener);

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));
}

#[test]
fn pause_and_resume_are_observed_as_transitions() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    player.pause();
    player.poll();
    assert_eq!(player.state(), PlaybackState::Paused);
    assert_eq!(listener.count_of("state:Paused"), 1);

    player.resume();
    player.poll();
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(listener.count_of("state:Playing"), 2);
}

#[test]
fn loop_boundary_while_playing_reports_repeated() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    handle.cross_boundary();
    player.poll();
    handle.cross_boundary();
    player.poll();
    player.poll();

    assert_eq!(listener.count_of("state:Repeated"), 2);
    // Repeated is a notification, not a resting state.
    assert_eq!(player.state(), PlaybackState::Playing);
}

#[test]
fn stalled_transport_reports_idle() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    *handle.time_control.lock() = Some(TimeControl::Waiting);
    player.poll();
    assert_eq!(player.state(), PlaybackState::Idle);
}

#[test]
fn mute_on_play_applies_before_playback_and_notifies() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    let options = LoadOptions {
        mute_on_play: true,
        ..LoadOptions::default()
    };
    player.load_media(&media, options, None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    assert!(player.is_muted());
    assert!(*handle.muted.lock());
    assert_eq!(listener.count_of("mute:true"), 1);
}

#[test]
fn set_muted_without_engine_is_silent() {
    let provider = ScriptedProvider::new(vec![]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    player.set_muted(true);
    assert!(!player.is_muted());
    assert!(listener.events().is_empty());
}

#[test]
fn stop_is_idempotent_and_clears_media_silently() {
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(EngineHandle::ready()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    // Stopping before anything was ever loaded is safe too.
    player.stop();
    assert!(player.current_media().is_none());
    assert!(listener.events().is_empty());

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));
    let events_before = listener.events().len();

    player.stop();
    player.stop();
    player.stop();

    assert!(player.current_media().is_none());
    assert!(!player.has_engine());
    assert_eq!(player.state(), PlaybackState::Unknown);
    assert_eq!(listener.events().len(), events_before);

    // Stopping an already-idle player is also fine.
    player.poll();
}

#[test]
fn stop_abandons_in_flight_resolution() {
    let (gate_tx, gate_rx) = mpsc::channel();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Gated(gate_rx))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    player.stop();
    assert!(!player.is_loading());

    gate_tx.send(Script::Open(EngineHandle::ready())).unwrap();
    thread::sleep(Duration::from_millis(20));
    for _ in 0..20 {
        player.poll();
    }
    assert!(!player.has_engine());
}

#[test]
fn engine_item_failure_tears_down_and_reports() {
    let handle = EngineHandle::ready();
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.state() == PlaybackState::Playing));

    *handle.status.lock() = Some(ItemStatus::Failed("decode error".into()));
    player.poll();

    assert_eq!(listener.count_of("fail:decode error"), 1);
    assert!(!player.has_engine());
    assert_eq!(player.state(), PlaybackState::Unknown);
}

#[test]
fn captions_follow_locale_and_selection_is_queue_wide() {
    let handle = EngineHandle::ready();
    *handle.tracks.lock() = vec![
        CaptionTrack::new("de"),
        CaptionTrack::new("en-GB"),
        CaptionTrack::new("en"),
    ];
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle.clone()))]);
    let player = MediaPlayer::new(provider);

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    player.load_media(&media, LoadOptions::default(), None);
    assert!(poll_until(&player, || player.has_engine()));

    assert!(player.captions_available_for_locale("en-US"));
    assert!(!player.captions_available_for_locale("fr"));

    player.set_captions_enabled_for_locale(true, "en-US");
    assert_eq!(
        handle.selected.lock().clone(),
        Some(Some(CaptionTrack::new("en-GB")))
    );

    player.set_captions_enabled_for_locale(false, "en-US");
    assert_eq!(handle.selected.lock().clone(), Some(None));

    // Enabling with no matching track leaves the selection untouched.
    player.set_captions_enabled_for_locale(true, "fr");
    assert_eq!(handle.selected.lock().clone(), Some(None));
}

#[test]
fn no_autoplay_waits_for_resume() {
    let handle = EngineHandle::ready();
    *handle.time_control.lock() = Some(TimeControl::Paused);
    let provider = ScriptedProvider::new(vec![("https://example.com/a.mp4", Script::Open(handle))]);
    let player = MediaPlayer::new(provider);
    let listener = Arc::new(RecordingListener::default());
    player.add_listener(&as_listener(&listener));

    let media = MediaDescriptor::new("https://example.com/a.mp4");
    let options = LoadOptions {
        autoplay: false,
        ..LoadOptions::default()
    };
    player.load_media(&media, options, None);
    assert!(poll_until(&player, || player.has_engine()));
    for _ in 0..10 {
        player.poll();
    }

    assert_eq!(listener.count_of("state:Playing"), 0);
    player.resume();
    player.poll();
    assert_eq!(player.state(), PlaybackState::Playing);
}
