//! Pure layout math for the synthetic device frame.
//!
//! All inputs are logical (CSS) pixels plus a device pixel ratio; every
//! derived field is in physical pixels. The outer canvas is rounded up to
//! even dimensions on both axes, odd sizes are rejected or produce
//! artifacts in several video codecs.

/// Bezel thickness around the screen, logical px (framed only).
const BEZEL_LOGICAL: f32 = 20.0;
/// Outer chassis corner radius, logical px (framed only).
const CORNER_RADIUS_LOGICAL: f32 = 55.0;
/// Black rim inset between chassis and screen, logical px.
const RIM_LOGICAL: f32 = 3.5;
/// Synthetic status bar band height, logical px.
const STATUS_BAR_LOGICAL: f32 = 50.0;
/// Notch pill height, logical px.
const NOTCH_HEIGHT_LOGICAL: f32 = 35.0;
/// Notch top inset from the screen edge, logical px.
const NOTCH_TOP_INSET_LOGICAL: f32 = 12.0;
/// Notch width as a fraction of the screen width.
const NOTCH_WIDTH_RATIO: f32 = 0.3;
/// Home indicator width as a fraction of the logical content width.
const HOME_WIDTH_RATIO: f32 = 0.35;
/// Home indicator inset from the bottom frame edge, logical px.
const HOME_BOTTOM_INSET_LOGICAL: f32 = 8.0;
/// Fraction of the cover crop actually blitted; trims capture edge noise.
const CLEAN_ZOOM: f32 = 0.99;

/// Complete per-session layout in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Physical output canvas width, always even
    pub canvas_width: u32,
    /// Physical output canvas height, always even
    pub canvas_height: u32,
    /// Device pixel ratio the layout was computed with
    pub scale: f32,
    /// Outer frame width (un-evened; the canvas may be up to 2px larger)
    pub frame_width: f32,
    /// Outer frame height (un-evened)
    pub frame_height: f32,
    /// Bezel thickness; 0 when the frame is disabled
    pub bezel: f32,
    /// Outer chassis corner radius; 0 when the frame is disabled
    pub corner_radius: f32,
    /// Black rim stroke width between chassis and screen
    pub rim_width: f32,
    /// Screen content width
    pub screen_width: f32,
    /// Screen content height
    pub screen_height: f32,
    /// Corner radius of the rounded screen clip
    pub inner_radius: f32,
    /// Status bar band height
    pub status_bar_height: f32,
    pub notch_width: f32,
    pub notch_height: f32,
    pub notch_x: f32,
    pub notch_y: f32,
    pub home_width: f32,
    pub home_height: f32,
    pub home_x: f32,
    pub home_y: f32,
    /// Whether the chassis is drawn at all
    pub show_frame: bool,
}

/// Centered cover-fit crop of a source against the screen aspect ratio,
/// in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    /// Slightly zoomed-in variant used for the actual blit: same top edge,
    /// horizontally re-centered.
    pub fn clean(&self) -> CropRect {
        let width = self.width * CLEAN_ZOOM;
        let height = self.height * CLEAN_ZOOM;
        CropRect {
            x: self.x + (self.width - width) / 2.0,
            y: self.y,
            width,
            height,
        }
    }
}

/// Round a physical extent up to the next even pixel count. Saturates at
/// the largest even u32 instead of overflowing on absurd inputs.
fn even_ceil(v: f32) -> u32 {
    let n = (v.ceil().max(0.0) as u64).min(u64::from(u32::MAX - 2));
    ((n + 1) & !1) as u32
}

impl Layout {
    /// Compute the full layout. Pure arithmetic, no error conditions;
    /// `dpr` values below 1.0 are clamped to 1.0.
    pub fn compute(logical_width: u32, logical_height: u32, dpr: f32, show_frame: bool) -> Layout {
        let dpr = if dpr >= 1.0 { dpr } else { 1.0 };
        let logical_w = logical_width as f32;
        let logical_h = logical_height as f32;

        let bezel_logical = if show_frame { BEZEL_LOGICAL } else { 0.0 };
        let radius_logical = if show_frame { CORNER_RADIUS_LOGICAL } else { 0.0 };

        let home_w_logical = (logical_w * HOME_WIDTH_RATIO).round();
        let home_h_logical = (5.0 * (dpr / 3.0)).round();

        let outer_logical_w = logical_w + bezel_logical * 2.0;
        let outer_logical_h = logical_h + bezel_logical * 2.0;

        // Force even dimensions for encoding stability.
        let canvas_width = even_ceil(outer_logical_w * dpr);
        let canvas_height = even_ceil(outer_logical_h * dpr);

        let frame_width = outer_logical_w * dpr;
        let frame_height = outer_logical_h * dpr;
        let bezel = bezel_logical * dpr;
        let corner_radius = radius_logical * dpr;
        let rim_width = RIM_LOGICAL * dpr;
        let screen_width = logical_w * dpr;
        let screen_height = logical_h * dpr;

        let inner_radius = if show_frame {
            corner_radius - (bezel - rim_width)
        } else {
            0.0
        };

        let notch_width = screen_width * NOTCH_WIDTH_RATIO;
        let notch_height = NOTCH_HEIGHT_LOGICAL * dpr;
        let home_width = home_w_logical * dpr;
        let home_height = home_h_logical * dpr;

        Layout {
            canvas_width,
            canvas_height,
            scale: dpr,
            frame_width,
            frame_height,
            bezel,
            corner_radius,
            rim_width,
            screen_width,
            screen_height,
            inner_radius,
            status_bar_height: STATUS_BAR_LOGICAL * dpr,
            notch_width,
            notch_height,
            notch_x: (frame_width - notch_width) / 2.0,
            notch_y: bezel + NOTCH_TOP_INSET_LOGICAL * dpr,
            home_width,
            home_height,
            home_x: (frame_width - home_width) / 2.0,
            home_y: frame_height - bezel - HOME_BOTTOM_INSET_LOGICAL * dpr,
            show_frame,
        }
    }

    /// Cover-fit crop of a `source_width` x `source_height` frame against the
    /// screen aspect ratio, centered. Under-resolution sources get the same
    /// crop and are upscaled at blit time.
    pub fn cover_crop(&self, source_width: u32, source_height: u32) -> CropRect {
        let src_w = source_width as f32;
        let src_h = source_height as f32;
        let target_ratio = self.screen_width / self.screen_height;
        let source_ratio = src_w / src_h;

        let (width, height) = if source_ratio > target_ratio {
            (src_h * target_ratio, src_h)
        } else {
            (src_w, src_w / target_ratio)
        };

        CropRect {
            x: (src_w - width) / 2.0,
            y: (src_h - height) / 2.0,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_dimensions_even_and_cover_logical() {
        for &(w, h, dpr) in &[
            (390u32, 844u32, 3.0f32),
            (1080, 2340, 3.0),
            (375, 667, 2.0),
            (101, 99, 1.0),
            (800, 600, 1.5),
        ] {
            for &framed in &[true, false] {
                let layout = Layout::compute(w, h, dpr, framed);
                assert_eq!(layout.canvas_width % 2, 0);
                assert_eq!(layout.canvas_height % 2, 0);
                assert!(layout.canvas_width as f32 >= w as f32 * dpr);
                assert!(layout.canvas_height as f32 >= h as f32 * dpr);
            }
        }
    }

    #[test]
    fn test_huge_dimensions_saturate_instead_of_overflow() {
        let layout = Layout::compute(u32::MAX, u32::MAX, 1.0e9, true);
        assert_eq!(layout.canvas_width % 2, 0);
        assert_eq!(layout.canvas_height % 2, 0);
        assert!(layout.canvas_width >= 2);
        assert_eq!(even_ceil(f32::MAX), u32::MAX - 1);
        assert_eq!(even_ceil(0.0), 0);
        assert_eq!(even_ceil(3.2), 4);
        assert_eq!(even_ceil(4.0), 4);
    }

    #[test]
    fn test_frameless_layout_has_no_bezel() {
        let layout = Layout::compute(390, 844, 2.0, false);
        assert_eq!(layout.bezel, 0.0);
        assert_eq!(layout.corner_radius, 0.0);
        assert_eq!(layout.inner_radius, 0.0);
        assert_eq!(layout.frame_width, layout.screen_width);
        assert_eq!(layout.frame_height, layout.screen_height);
    }

    #[test]
    fn test_framed_layout_constants() {
        let layout = Layout::compute(390, 844, 3.0, true);
        assert_eq!(layout.bezel, 60.0);
        assert_eq!(layout.corner_radius, 165.0);
        assert_eq!(layout.rim_width, 10.5);
        assert_eq!(layout.status_bar_height, 150.0);
        assert_eq!(layout.frame_width, (390.0 + 40.0) * 3.0);
        // radius - (bezel - rim)
        assert_eq!(layout.inner_radius, 165.0 - (60.0 - 10.5));
    }

    #[test]
    fn test_dpr_below_one_clamped() {
        let layout = Layout::compute(100, 100, 0.25, false);
        assert_eq!(layout.scale, 1.0);
        assert_eq!(layout.screen_width, 100.0);
    }

    #[test]
    fn test_home_indicator_centered() {
        let layout = Layout::compute(1080, 2340, 3.0, true);
        assert_eq!(layout.home_width, (1080.0f32 * 0.35).round() * 3.0);
        assert_eq!(layout.home_height, 5.0 * 3.0);
        let center = layout.home_x + layout.home_width / 2.0;
        assert!((center - layout.frame_width / 2.0).abs() < 0.5);
        assert!(layout.home_y < layout.frame_height);
    }

    #[test]
    fn test_notch_geometry() {
        let layout = Layout::compute(390, 844, 2.0, true);
        assert_eq!(layout.notch_width, layout.screen_width * 0.3);
        assert_eq!(layout.notch_height, 70.0);
        assert_eq!(layout.notch_y, layout.bezel + 24.0);
        let center = layout.notch_x + layout.notch_width / 2.0;
        assert!((center - layout.frame_width / 2.0).abs() < 0.5);
    }

    #[test]
    fn test_cover_crop_wide_source() {
        // Source wider than the target aspect: full height, cropped sides.
        let layout = Layout::compute(400, 800, 1.0, false);
        let crop = layout.cover_crop(1920, 1080);
        assert_eq!(crop.height, 1080.0);
        assert_eq!(crop.width, 1080.0 * 0.5);
        assert_eq!(crop.y, 0.0);
        assert!((crop.x - (1920.0 - crop.width) / 2.0).abs() < 0.001);
    }

    #[test]
    fn test_cover_crop_tall_source() {
        // Source taller than the target aspect: full width, cropped bottom/top.
        let layout = Layout::compute(800, 400, 1.0, false);
        let crop = layout.cover_crop(400, 1000);
        assert_eq!(crop.width, 400.0);
        assert_eq!(crop.height, 200.0);
        assert_eq!(crop.x, 0.0);
    }

    #[test]
    fn test_clean_crop_keeps_top_edge() {
        let crop = CropRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 200.0,
        };
        let clean = crop.clean();
        assert_eq!(clean.y, 20.0);
        assert!(clean.width < crop.width);
        assert!(clean.x > crop.x);
        let center = clean.x + clean.width / 2.0;
        assert!((center - (crop.x + crop.width / 2.0)).abs() < 0.001);
    }
}
