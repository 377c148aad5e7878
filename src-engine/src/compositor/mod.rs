//! Per-frame composition of the source content into the synthetic device
//! frame: chassis, clipped screen with status bar and glyphs, notch, home
//! indicator.
//!
//! Drawing happens in a fixed five-step order (background, chassis, screen
//! content, notch, home indicator); the layering is load-bearing. Every
//! coordinate comes from the precomputed [`Layout`] in physical pixels.

mod chrome;

use crate::error::EngineError;
use crate::geometry::Layout;
use crate::sampler::sample_status_color;
use crate::source::SourceFrame;
use bezelrec_types::{BackgroundStyle, CaptureMode, Rgb};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, GradientStop, IntSize, LinearGradient, Mask, Paint,
    PathBuilder, Pixmap, PixmapPaint, Point, Rect, SpreadMode, Transform,
};

/// Silver used for the side buttons and the gradient mid section.
fn silver() -> Color {
    Color::from_rgba8(0xD1, 0xD1, 0xD6, 0xFF)
}
/// Bright edge highlight of the metal gradient.
fn silver_light() -> Color {
    Color::from_rgba8(0xE5, 0xE5, 0xEA, 0xFF)
}
/// Dark outer edge of the metal gradient.
fn silver_dark() -> Color {
    Color::from_rgba8(0x8E, 0x8E, 0x93, 0xFF)
}
/// Camera lens inside the notch pill.
fn lens_color() -> Color {
    Color::from_rgba8(0x1A, 0x1A, 0x1A, 0xFF)
}

/// Stateful frame compositor bound to one session's layout and flags.
pub struct Compositor {
    layout: Layout,
    show_notch: bool,
    background: BackgroundStyle,
    mode: CaptureMode,
    surface: Pixmap,
    /// Rounded screen clip
    screen_mask: Mask,
    /// Screen clip intersected with the content area below the status bar
    content_mask: Mask,
}

impl Compositor {
    pub fn new(
        layout: Layout,
        show_notch: bool,
        background: BackgroundStyle,
        mode: CaptureMode,
    ) -> Result<Self, EngineError> {
        let surface = Pixmap::new(layout.canvas_width, layout.canvas_height).ok_or_else(|| {
            EngineError::CompositingFault(format!(
                "cannot allocate {}x{} surface",
                layout.canvas_width, layout.canvas_height
            ))
        })?;

        let screen_path = chrome::rounded_rect(
            layout.bezel,
            layout.bezel,
            layout.screen_width,
            layout.screen_height,
            if layout.show_frame {
                layout.inner_radius.max(0.0)
            } else {
                0.0
            },
        )
        .ok_or_else(|| EngineError::CompositingFault("screen clip path".to_string()))?;

        let mut screen_mask =
            Mask::new(layout.canvas_width, layout.canvas_height).ok_or_else(|| {
                EngineError::CompositingFault("cannot allocate screen mask".to_string())
            })?;
        screen_mask.fill_path(&screen_path, FillRule::Winding, true, Transform::identity());

        let mut content_mask = screen_mask.clone();
        let content_rect = Rect::from_xywh(
            layout.bezel,
            layout.bezel + layout.status_bar_height,
            layout.screen_width,
            (layout.screen_height - layout.status_bar_height).max(1.0),
        )
        .ok_or_else(|| EngineError::CompositingFault("content rect".to_string()))?;
        content_mask.intersect_path(
            &PathBuilder::from_rect(content_rect),
            FillRule::Winding,
            true,
            Transform::identity(),
        );

        Ok(Self {
            layout,
            show_notch,
            background,
            mode,
            surface,
            screen_mask,
            content_mask,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Composite one source frame. Returns `false` when the tick was skipped
    /// because the frame had no readable pixels; the surface is untouched in
    /// that case. `clock_text` is the preformatted 24h HH:MM string.
    pub fn draw(&mut self, frame: &SourceFrame, clock_text: &str) -> bool {
        let crop = self.layout.cover_crop(frame.width, frame.height);
        let Some(status_color) = sample_status_color(frame, &crop) else {
            return false;
        };
        let Some(source) = premultiplied_pixmap(frame) else {
            return false;
        };

        let l = self.layout;
        let s = l.scale;

        // Step 1: background policy. Screenshots are always transparent so
        // they can be layered onto other backgrounds.
        match (self.mode, self.background) {
            (CaptureMode::Screenshot, _)
            | (_, BackgroundStyle::Transparent)
            | (_, BackgroundStyle::TransparentForce) => {
                self.surface.fill(Color::TRANSPARENT);
            }
            (_, BackgroundStyle::Solid(rgb)) => {
                self.surface.fill(Color::from_rgba8(rgb.r, rgb.g, rgb.b, 0xFF));
            }
        }

        // Step 2: chassis chrome.
        if l.show_frame {
            for (x, y, w, h) in [
                (-2.0 * s, 100.0 * s, 6.0 * s, 20.0 * s),
                (-2.0 * s, 140.0 * s, 6.0 * s, 45.0 * s),
                (-2.0 * s, 200.0 * s, 6.0 * s, 45.0 * s),
                (l.frame_width - 4.0 * s, 160.0 * s, 6.0 * s, 70.0 * s),
            ] {
                if let Some(path) = chrome::rounded_rect(x, y, w, h, 2.0 * s) {
                    chrome::fill(&mut self.surface, &path, silver(), None);
                }
            }

            if let Some(path) = chrome::rounded_rect(
                0.0,
                0.0,
                l.frame_width,
                l.frame_height,
                l.corner_radius + l.bezel / 2.0,
            ) {
                let mut paint = Paint::default();
                paint.anti_alias = true;
                if let Some(shader) = LinearGradient::new(
                    Point::from_xy(0.0, 0.0),
                    Point::from_xy(l.frame_width, 0.0),
                    vec![
                        GradientStop::new(0.0, silver_dark()),
                        GradientStop::new(0.05, silver_light()),
                        GradientStop::new(0.2, silver()),
                        GradientStop::new(0.8, silver()),
                        GradientStop::new(0.95, silver_light()),
                        GradientStop::new(1.0, silver_dark()),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                ) {
                    paint.shader = shader;
                }
                self.surface.fill_path(
                    &path,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }

            if let Some(path) = chrome::rounded_rect(
                l.rim_width,
                l.rim_width,
                l.frame_width - l.rim_width * 2.0,
                l.frame_height - l.rim_width * 2.0,
                l.corner_radius,
            ) {
                chrome::fill(&mut self.surface, &path, Color::BLACK, None);
            }
        }

        // Step 3: screen content inside the rounded clip.
        self.fill_status_bar(status_color);
        self.blit_source(&source, &crop);
        self.draw_status_bar_overlay(clock_text);

        // Step 4: notch pill with its lens.
        if self.show_notch {
            if let Some(path) = chrome::rounded_rect(
                l.notch_x,
                l.notch_y,
                l.notch_width,
                l.notch_height,
                l.notch_height / 2.0,
            ) {
                chrome::fill(&mut self.surface, &path, Color::BLACK, None);
            }
            let mut pb = PathBuilder::new();
            pb.push_circle(
                l.notch_x + l.notch_width - 12.0 * s,
                l.notch_y + l.notch_height / 2.0,
                6.0 * s,
            );
            if let Some(path) = pb.finish() {
                chrome::fill(&mut self.surface, &path, lens_color(), None);
            }
        }

        // Step 5: home indicator.
        if let Some(path) = chrome::rounded_rect(
            l.home_x,
            l.home_y,
            l.home_width,
            l.home_height,
            l.home_height / 2.0,
        ) {
            let translucent_white = Color::from_rgba(1.0, 1.0, 1.0, 0.8).unwrap_or(Color::WHITE);
            chrome::fill(&mut self.surface, &path, translucent_white, None);
        }

        true
    }

    fn fill_status_bar(&mut self, color: Rgb) {
        let l = self.layout;
        if let Some(rect) = Rect::from_xywh(
            l.bezel,
            l.bezel,
            l.screen_width,
            l.status_bar_height,
        ) {
            chrome::fill(
                &mut self.surface,
                &PathBuilder::from_rect(rect),
                Color::from_rgba8(color.r, color.g, color.b, 0xFF),
                Some(&self.screen_mask),
            );
        }
    }

    fn blit_source(&mut self, source: &Pixmap, crop: &crate::geometry::CropRect) {
        let l = self.layout;
        let clean = crop.clean();
        let dest_x = l.bezel;
        let dest_y = l.bezel + l.status_bar_height;
        let dest_w = l.screen_width;
        let dest_h = (l.screen_height - l.status_bar_height).max(1.0);
        if clean.width <= 0.0 || clean.height <= 0.0 {
            return;
        }

        let transform = Transform::from_translate(dest_x, dest_y)
            .pre_scale(dest_w / clean.width, dest_h / clean.height)
            .pre_translate(-clean.x, -clean.y);

        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.surface.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            transform,
            Some(&self.content_mask),
        );
    }

    fn draw_status_bar_overlay(&mut self, clock_text: &str) {
        let l = self.layout;
        let s = l.scale;
        let text_y = l.bezel + l.status_bar_height * 0.65;

        chrome::draw_clock_text(
            &mut self.surface,
            Some(&self.screen_mask),
            clock_text,
            l.bezel + 50.0 * s,
            text_y,
            s,
        );

        let icon_y = text_y - 11.0 * s;
        let right_margin = l.bezel + l.screen_width - 25.0 * s;
        let mask = Some(&self.screen_mask);
        chrome::draw_battery(
            &mut self.surface,
            mask,
            right_margin - 25.0 * s,
            icon_y,
            22.0 * s,
            11.0 * s,
        );
        chrome::draw_wifi(
            &mut self.surface,
            mask,
            right_margin - 55.0 * s,
            icon_y - 2.0 * s,
            16.0 * s,
        );
        chrome::draw_signal(
            &mut self.surface,
            mask,
            right_margin - 80.0 * s,
            icon_y,
            17.0 * s,
            11.0 * s,
        );
    }

    /// The composited surface (premultiplied RGBA).
    pub fn surface(&self) -> &Pixmap {
        &self.surface
    }

    /// Straight-alpha RGBA bytes of the current surface, the representation
    /// the encoders and PNG writer consume.
    pub fn surface_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.surface.data().len());
        for px in self.surface.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// Encode the current surface as a PNG (screenshot artifacts).
    pub fn surface_png(&self) -> Result<Vec<u8>, EngineError> {
        let rgba = self.surface_rgba();
        let img = image::RgbaImage::from_raw(
            self.surface.width(),
            self.surface.height(),
            rgba,
        )
        .ok_or_else(|| EngineError::CompositingFault("surface buffer size mismatch".to_string()))?;

        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| EngineError::CompositingFault(format!("png encode: {}", e)))?;
        Ok(bytes)
    }
}

/// Convert a straight-alpha source frame into a premultiplied pixmap.
fn premultiplied_pixmap(frame: &SourceFrame) -> Option<Pixmap> {
    if !frame.is_readable() {
        return None;
    }
    let mut data = Vec::with_capacity(frame.data.len());
    for px in frame.data.chunks_exact(4) {
        let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Pixmap::from_vec(data, IntSize::from_wh(frame.width, frame.height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compositor(
        logical: (u32, u32),
        dpr: f32,
        show_frame: bool,
        show_notch: bool,
        background: BackgroundStyle,
        mode: CaptureMode,
    ) -> Compositor {
        let layout = Layout::compute(logical.0, logical.1, dpr, show_frame);
        Compositor::new(layout, show_notch, background, mode).unwrap()
    }

    fn pixel(c: &Compositor, x: f32, y: f32) -> [u8; 4] {
        let px = c
            .surface()
            .pixel(x as u32, y as u32)
            .expect("pixel in bounds");
        let d = px.demultiply();
        [d.red(), d.green(), d.blue(), d.alpha()]
    }

    #[test]
    fn test_unreadable_frame_skips_tick() {
        let mut c = compositor(
            (100, 200),
            1.0,
            false,
            false,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let empty = SourceFrame {
            width: 0,
            height: 0,
            data: vec![],
        };
        assert!(!c.draw(&empty, "12:00"));
        assert!(c.surface().pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn test_solid_background_fills_canvas_corner() {
        let mut c = compositor(
            (100, 200),
            1.0,
            true,
            false,
            BackgroundStyle::Solid(Rgb::new(10, 200, 30)),
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(100, 200, 255, 255, 255);
        assert!(c.draw(&frame, "12:00"));
        // The outer chassis is rounded, the very corner shows the background.
        assert_eq!(pixel(&c, 0.0, 0.0), [10, 200, 30, 255]);
    }

    #[test]
    fn test_screenshot_mode_forces_transparent_corner() {
        let mut c = compositor(
            (100, 200),
            1.0,
            true,
            false,
            BackgroundStyle::Solid(Rgb::new(10, 200, 30)),
            CaptureMode::Screenshot,
        );
        let frame = SourceFrame::solid(100, 200, 255, 255, 255);
        assert!(c.draw(&frame, "12:00"));
        assert_eq!(pixel(&c, 0.0, 0.0)[3], 0);
    }

    #[test]
    fn test_status_bar_tinted_with_sampled_color() {
        let mut c = compositor(
            (100, 200),
            1.0,
            false,
            false,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(100, 200, 180, 40, 220);
        assert!(c.draw(&frame, "12:00"));
        // Frameless: status bar band starts at the canvas origin. Probe a
        // point away from the clock and glyphs.
        let [r, g, b, a] = pixel(&c, 5.0, 5.0);
        assert_eq!([r, g, b, a], [180, 40, 220, 255]);
    }

    #[test]
    fn test_content_below_status_bar_is_source_color() {
        let layout = Layout::compute(100, 200, 1.0, false);
        let mut c = compositor(
            (100, 200),
            1.0,
            false,
            false,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(200, 400, 7, 99, 41);
        assert!(c.draw(&frame, "12:00"));
        let y = layout.status_bar_height + 20.0;
        let [r, g, b, a] = pixel(&c, 50.0, y);
        assert_eq!([r, g, b, a], [7, 99, 41, 255]);
    }

    #[test]
    fn test_notch_drawn_black_at_top_center() {
        let layout = Layout::compute(390, 844, 1.0, true);
        let mut c = compositor(
            (390, 844),
            1.0,
            true,
            true,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(390, 844, 255, 255, 255);
        assert!(c.draw(&frame, "12:00"));
        let cx = layout.notch_x + layout.notch_width / 2.0;
        let cy = layout.notch_y + layout.notch_height / 2.0;
        assert_eq!(pixel(&c, cx, cy), [0, 0, 0, 255]);
    }

    #[test]
    fn test_home_indicator_visible() {
        let layout = Layout::compute(390, 844, 1.0, true);
        let mut c = compositor(
            (390, 844),
            1.0,
            true,
            false,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(390, 844, 0, 0, 0);
        assert!(c.draw(&frame, "12:00"));
        let cx = layout.home_x + layout.home_width / 2.0;
        let cy = layout.home_y + layout.home_height / 2.0;
        let [r, _, _, a] = pixel(&c, cx, cy);
        // Translucent white over black content.
        assert!(a == 255);
        assert!(r > 150);
    }

    #[test]
    fn test_surface_rgba_length_matches_canvas() {
        let mut c = compositor(
            (101, 99),
            1.5,
            true,
            true,
            BackgroundStyle::Transparent,
            CaptureMode::Recording,
        );
        let frame = SourceFrame::solid(101, 99, 1, 2, 3);
        assert!(c.draw(&frame, "23:59"));
        let rgba = c.surface_rgba();
        let l = c.layout();
        assert_eq!(
            rgba.len(),
            (l.canvas_width as usize) * (l.canvas_height as usize) * 4
        );
    }

    #[test]
    fn test_surface_png_decodable_header() {
        let mut c = compositor(
            (50, 80),
            1.0,
            false,
            false,
            BackgroundStyle::Transparent,
            CaptureMode::Screenshot,
        );
        let frame = SourceFrame::solid(50, 80, 1, 2, 3);
        assert!(c.draw(&frame, "00:00"));
        let png = c.surface_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
