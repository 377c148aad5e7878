//! Status-bar color sampling.
//!
//! The synthetic status bar is tinted with one pixel probed from the source
//! frame at the horizontal center and vertical top of the cover crop, so
//! the bar blends with whatever the captured page renders under it.

use crate::geometry::CropRect;
use crate::source::SourceFrame;
use bezelrec_types::Rgb;

/// Sample the status-bar tint color from `frame` inside `crop`.
///
/// Returns `None` for frames with no readable pixels (e.g. a stream that
/// has not decoded yet) or probes falling outside the frame; the caller
/// skips the tick instead of failing.
pub fn sample_status_color(frame: &SourceFrame, crop: &CropRect) -> Option<Rgb> {
    if !frame.is_readable() {
        return None;
    }

    let probe_x = crop.x + crop.width / 2.0;
    let probe_y = crop.y;
    if probe_x < 0.0 || probe_y < 0.0 {
        return None;
    }

    let x = (probe_x as u32).min(frame.width.saturating_sub(1));
    let y = (probe_y as u32).min(frame.height.saturating_sub(1));
    frame.pixel(x, y).map(|[r, g, b, _]| Rgb::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_crop(frame: &SourceFrame) -> CropRect {
        CropRect {
            x: 0.0,
            y: 0.0,
            width: frame.width as f32,
            height: frame.height as f32,
        }
    }

    #[test]
    fn test_samples_top_center_pixel() {
        let mut frame = SourceFrame::solid(10, 10, 0, 0, 0);
        // Paint the top-center pixel red.
        let idx = 5 * 4;
        frame.data[idx] = 200;
        frame.data[idx + 1] = 50;
        frame.data[idx + 2] = 25;
        let crop = full_crop(&frame);
        assert_eq!(sample_status_color(&frame, &crop), Some(Rgb::new(200, 50, 25)));
    }

    #[test]
    fn test_empty_frame_returns_none() {
        let frame = SourceFrame {
            width: 0,
            height: 0,
            data: vec![],
        };
        let crop = CropRect {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        assert_eq!(sample_status_color(&frame, &crop), None);
    }

    #[test]
    fn test_probe_clamped_to_frame() {
        let frame = SourceFrame::solid(4, 4, 9, 8, 7);
        // Crop wider than the frame; probe clamps instead of failing.
        let crop = CropRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        assert_eq!(sample_status_color(&frame, &crop), Some(Rgb::new(9, 8, 7)));
    }

    #[test]
    fn test_negative_probe_returns_none() {
        let frame = SourceFrame::solid(4, 4, 1, 2, 3);
        let crop = CropRect {
            x: -100.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(sample_status_color(&frame, &crop), None);
    }
}
