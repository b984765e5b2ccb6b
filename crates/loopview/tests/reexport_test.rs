//! Compile-time regression test for the loopview public API surface.
//!
//! Verifies that the headless types from loopview-core remain accessible
//! through loopview paths. If this file compiles, the re-exports work.

// Core types accessible via loopview:: (compile-time import check)
#[allow(unused_imports)]
use loopview::{
    CaptionTrack, EngineProvider, FetchCancel, FetchError, HttpPreviewFetcher, ImagePreviewCache,
    ItemStatus, JsonSettingsStore, LoadOptions, MediaDescriptor, MediaPlayer, MediaSurface,
    MemorySettingsStore, PlaybackEngine, PlaybackState, PlayerError, PlayerStateListener,
    PreviewFetcher, SettingsStore, TimeControl, CAPTIONS_ENABLED_KEY,
};

// Surface widget types — compile-time import check
#[allow(unused_imports)]
use loopview::{
    PlayerSurface, SurfaceConfig, SurfaceControls, SurfaceControlsConfig, SurfaceControlsResponse,
    SurfaceShared,
};

// Caption helpers via media:: path — compile-time import check
#[allow(unused_imports)]
use loopview::media::captions::{current_locale, locale_matched, preferred, primary_subtag};

#[test]
fn public_types_are_accessible() {
    // Compile-time only — if this compiles, the re-exports work.
    fn _assert_types() {
        let _: fn() -> PlaybackState = || PlaybackState::Unknown;
        let _: fn() -> TimeControl = || TimeControl::Paused;
        let _: fn() -> ItemStatus = || ItemStatus::Unknown;
        let _: fn() -> LoadOptions = LoadOptions::default;
    }
}

#[test]
fn media_descriptor_constructors() {
    let media = MediaDescriptor::new("test.mp4");
    assert!(media.image_preview_url.is_none());
    assert_eq!(media.aspect_ratio, 1.0);

    let media2 = MediaDescriptor::with_preview("test.mp4", "test.jpg", 16.0 / 9.0);
    assert_eq!(media2.image_preview_url.as_deref(), Some("test.jpg"));
}

#[test]
fn caption_helpers_accessible() {
    let tracks = vec![CaptionTrack::new("en-US")];
    assert_eq!(preferred(&tracks, "en").unwrap().language, "en-US");
    assert_eq!(primary_subtag("pt_BR"), "pt");
}
