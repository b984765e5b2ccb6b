//! Media descriptor shared between the player, surfaces and caches.

use std::sync::Arc;

/// Immutable description of one playable item.
///
/// Descriptors are handed around as `Arc<MediaDescriptor>`. Identity for all
/// staleness and "is this still current" checks is the allocation
/// ([`Arc::ptr_eq`]), never field equality: two descriptors with the same
/// URLs are still two different loads.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    /// URL of the video asset.
    pub video_url: String,
    /// Optional URL of a still preview shown before playback starts.
    pub image_preview_url: Option<String>,
    /// Width / height of the video, used for aspect-fit layout.
    pub aspect_ratio: f32,
}

impl MediaDescriptor {
    pub fn new(video_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            video_url: video_url.into(),
            image_preview_url: None,
            aspect_ratio: 1.0,
        })
    }

    pub fn with_preview(
        video_url: impl Into<String>,
        image_preview_url: impl Into<String>,
        aspect_ratio: f32,
    ) -> Arc<Self> {
        Arc::new(Self {
            video_url: video_url.into(),
            image_preview_url: Some(image_preview_url.into()),
            aspect_ratio,
        })
    }

    /// Allocation identity, the equality the player cares about.
    pub fn same_item(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }
}
