//! Overlay controls for a player surface.
//!
//! Two elements in the bottom corners: a speaker indicator (not clickable,
//! taps anywhere on the surface toggle sound) and a caption toggle button.
//! Both are drawn with the given alpha so the surface can fade them.

use egui::{Align2, Color32, CornerRadius, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};

/// Configuration for surface controls appearance.
#[derive(Clone)]
pub struct SurfaceControlsConfig {
    /// Side length of a control element
    pub button_size: f32,
    /// Distance from the surface edges
    pub margin: f32,
    /// Icon color
    pub icon_color: Color32,
    /// Caption button color when captions are on
    pub active_color: Color32,
    /// Color of the cross drawn over the speaker when muted
    pub muted_color: Color32,
}

impl Default for SurfaceControlsConfig {
    fn default() -> Self {
        Self {
            button_size: 28.0,
            margin: 10.0,
            icon_color: Color32::WHITE,
            active_color: Color32::from_rgb(100, 200, 255),
            muted_color: Color32::from_rgb(255, 100, 100),
        }
    }
}

/// Response from surface controls interaction.
#[derive(Default)]
pub struct SurfaceControlsResponse {
    /// Whether the caption button was clicked
    pub toggle_captions: bool,
}

/// Overlay controls widget.
pub struct SurfaceControls {
    config: SurfaceControlsConfig,
    /// Alpha of the speaker indicator (0 = hidden)
    sound_alpha: f32,
    /// Alpha of the caption button (0 = hidden)
    captions_alpha: f32,
    /// Whether audio is currently audible
    sound_on: bool,
    /// Whether captions are currently shown
    captions_on: bool,
}

impl SurfaceControls {
    pub fn new(sound_on: bool, captions_on: bool) -> Self {
        Self {
            config: SurfaceControlsConfig::default(),
            sound_alpha: 1.0,
            captions_alpha: 1.0,
            sound_on,
            captions_on,
        }
    }

    pub fn with_config(mut self, config: SurfaceControlsConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the fade alphas for the two elements.
    pub fn with_alphas(mut self, sound_alpha: f32, captions_alpha: f32) -> Self {
        self.sound_alpha = sound_alpha.clamp(0.0, 1.0);
        self.captions_alpha = captions_alpha.clamp(0.0, 1.0);
        self
    }

    /// Shows the controls over `surface_rect`.
    pub fn show(&self, ui: &mut Ui, surface_rect: Rect) -> SurfaceControlsResponse {
        let mut response = SurfaceControlsResponse::default();
        let size = Vec2::splat(self.config.button_size);

        // Speaker bottom-left
        if self.sound_alpha > 0.0 {
            let speaker_rect = Rect::from_min_size(
                Pos2::new(
                    surface_rect.min.x + self.config.margin,
                    surface_rect.max.y - self.config.margin - size.y,
                ),
                size,
            );
            self.draw_speaker(ui, speaker_rect);
        }

        // Caption button bottom-right
        if self.captions_alpha > 0.0 {
            let cc_rect = Rect::from_min_size(
                Pos2::new(
                    surface_rect.max.x - self.config.margin - size.x,
                    surface_rect.max.y - self.config.margin - size.y,
                ),
                size,
            );
            response.toggle_captions = self.draw_caption_button(ui, cc_rect);
        }

        response
    }

    fn faded(&self, color: Color32, alpha: f32) -> Color32 {
        color.gamma_multiply(alpha)
    }

    /// Draws the speaker indicator. Display only: the whole surface is the
    /// tap target for sound.
    fn draw_speaker(&self, ui: &Ui, rect: Rect) {
        let alpha = self.sound_alpha;
        let icon_color = self.faded(self.config.icon_color, alpha);

        ui.painter().rect_filled(
            rect,
            CornerRadius::same(4),
            self.faded(Color32::from_rgba_unmultiplied(0, 0, 0, 140), alpha),
        );

        let center = rect.center();
        let icon_size = rect.width() * 0.4;

        // Speaker body
        let speaker_rect = Rect::from_center_size(
            Pos2::new(center.x - icon_size * 0.2, center.y),
            Vec2::new(icon_size * 0.3, icon_size * 0.5),
        );
        ui.painter()
            .rect_filled(speaker_rect, CornerRadius::same(1), icon_color);

        // Speaker cone
        let cone_points = vec![
            Pos2::new(center.x - icon_size * 0.05, center.y - icon_size * 0.25),
            Pos2::new(center.x - icon_size * 0.05, center.y + icon_size * 0.25),
            Pos2::new(center.x + icon_size * 0.3, center.y + icon_size * 0.5),
            Pos2::new(center.x + icon_size * 0.3, center.y - icon_size * 0.5),
        ];
        ui.painter().add(egui::Shape::convex_polygon(
            cone_points,
            icon_color,
            Stroke::NONE,
        ));

        if self.sound_on {
            // Sound waves
            let wave_stroke = Stroke::new(1.5, icon_color);
            for i in 0..2 {
                let wave_x = center.x + icon_size * 0.45 + (i as f32) * icon_size * 0.2;
                let wave_height = icon_size * (0.3 + (i as f32) * 0.15);
                let segments = 6;
                for j in 0..segments {
                    let t1 = (j as f32) / (segments as f32) - 0.5;
                    let t2 = ((j + 1) as f32) / (segments as f32) - 0.5;
                    let p1 = Pos2::new(
                        wave_x,
                        center.y + (t1 * std::f32::consts::PI).sin() * wave_height,
                    );
                    let p2 = Pos2::new(
                        wave_x + icon_size * 0.05,
                        center.y + (t2 * std::f32::consts::PI).sin() * wave_height,
                    );
                    ui.painter().line_segment([p1, p2], wave_stroke);
                }
            }
        } else {
            // Cross through the speaker
            let stroke = Stroke::new(2.0, self.faded(self.config.muted_color, alpha));
            let r = icon_size * 0.5;
            ui.painter().line_segment(
                [
                    Pos2::new(center.x - r, center.y - r),
                    Pos2::new(center.x + r, center.y + r),
                ],
                stroke,
            );
            ui.painter().line_segment(
                [
                    Pos2::new(center.x - r, center.y + r),
                    Pos2::new(center.x + r, center.y - r),
                ],
                stroke,
            );
        }
    }

    /// Draws the caption toggle button and reports clicks.
    fn draw_caption_button(&self, ui: &mut Ui, rect: Rect) -> bool {
        let response = ui.allocate_rect(rect, Sense::click());
        let alpha = self.captions_alpha;

        let bg = if self.captions_on {
            Color32::from_rgba_unmultiplied(255, 255, 255, 50)
        } else if response.hovered() {
            Color32::from_rgba_unmultiplied(255, 255, 255, 30)
        } else {
            Color32::from_rgba_unmultiplied(0, 0, 0, 140)
        };
        ui.painter()
            .rect_filled(rect, CornerRadius::same(4), self.faded(bg, alpha));

        let text_color = if self.captions_on {
            self.config.active_color
        } else {
            self.config.icon_color
        };
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            "CC",
            FontId::proportional(rect.width() * 0.4),
            self.faded(text_color, alpha),
        );

        response.clicked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphas_are_clamped() {
        let controls = SurfaceControls::new(true, false).with_alphas(2.0, -1.0);
        assert_eq!(controls.sound_alpha, 1.0);
        assert_eq!(controls.captions_alpha, 0.0);
    }
}
