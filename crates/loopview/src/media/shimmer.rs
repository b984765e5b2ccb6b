//! Animated loading placeholder.
//!
//! A muted base color derived from the media URL, with a diagonal highlight
//! band sweeping across while the preview or the video is still loading.
//! Painted directly; the caller requests repaints while visible.

use egui::{Color32, CornerRadius, Painter, Pos2, Rect};

/// Sweep period in seconds.
const SWEEP_PERIOD: f64 = 1.4;

/// Band width as a fraction of the rect diagonal.
const BAND_FRACTION: f32 = 0.25;

/// Stable placeholder color for a media URL: muted, dark, and the same
/// every time the item appears.
pub fn placeholder_color(seed: &str) -> Color32 {
    let hash = seed
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        });
    let r = 40 + (hash & 0x3f) as u8;
    let g = 40 + ((hash >> 8) & 0x3f) as u8;
    let b = 40 + ((hash >> 16) & 0x3f) as u8;
    Color32::from_rgb(r, g, b)
}

/// Paint the placeholder fill and the moving highlight into `rect`.
/// `time` is the egui frame time.
pub fn paint(painter: &Painter, rect: Rect, time: f64, base: Color32) {
    painter.rect_filled(rect, CornerRadius::ZERO, base);

    let phase = ((time % SWEEP_PERIOD) / SWEEP_PERIOD) as f32;
    let band_width = rect.width().max(rect.height()) * BAND_FRACTION;
    // Travel from fully off-screen left to fully off-screen right.
    let sweep = rect.width() + 2.0 * (band_width + rect.height());
    let head_x = rect.min.x - band_width - rect.height() + phase * sweep;

    // Three parallel diagonal stripes, brightest in the middle, clipped to
    // the surface rect.
    let clipped = painter.with_clip_rect(rect);
    let stripes = [
        (0.0, 18),
        (band_width * 0.5, 36),
        (band_width, 18),
    ];
    for (offset, alpha) in stripes {
        let color = Color32::from_rgba_unmultiplied(255, 255, 255, alpha);
        let x = head_x + offset;
        // Diagonal quad leaning 45 degrees.
        let points = vec![
            Pos2::new(x, rect.max.y),
            Pos2::new(x + rect.height(), rect.min.y),
            Pos2::new(x + rect.height() + band_width * 0.5, rect.min.y),
            Pos2::new(x + band_width * 0.5, rect.max.y),
        ];
        clipped.add(egui::Shape::convex_polygon(
            points,
            color,
            egui::Stroke::NONE,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_color_is_stable_and_muted() {
        let a = placeholder_color("https://example.com/a.mp4");
        let b = placeholder_color("https://example.com/a.mp4");
        assert_eq!(a, b);
        assert!(a.r() >= 40 && a.r() < 104);
        assert!(a.g() >= 40 && a.g() < 104);
        assert!(a.b() >= 40 && a.b() < 104);
    }

    #[test]
    fn different_urls_usually_differ() {
        let a = placeholder_color("https://example.com/a.mp4");
        let b = placeholder_color("https://example.com/b.mp4");
        assert_ne!(a, b);
    }
}
