//! Surface widgets for loopview.
//!
//! - [`PlayerSurface`] - Inline looping player surface for egui
//! - [`SurfaceControls`] - Speaker indicator and caption toggle overlay
//! - [`shimmer`] - Animated loading placeholder

// Re-export the headless layer so consumers only need this crate.
pub use loopview_core::captions;
pub use loopview_core::engine;
pub use loopview_core::fetch;
pub use loopview_core::media;
pub use loopview_core::player;
pub use loopview_core::preview_cache;
pub use loopview_core::settings;

pub mod shimmer;
pub mod surface;
pub mod surface_controls;

pub use surface::{PlayerSurface, SurfaceConfig, SurfaceShared};
pub use surface_controls::{SurfaceControls, SurfaceControlsConfig, SurfaceControlsResponse};
