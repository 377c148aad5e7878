//! Drawing primitives for the synthetic device chrome: rounded-rect and arc
//! path construction, the signal/wifi/battery status glyphs and the built-in
//! clock digits. All coordinates are physical pixels.

use tiny_skia::{
    Color, FillRule, LineCap, Mask, Paint, Path, PathBuilder, Pixmap, Stroke, Transform,
};

/// Cubic bezier circle approximation constant.
const KAPPA: f32 = 0.552_284_8;

/// Build a rounded rectangle path. The radius is clamped to half the shorter
/// side, matching canvas arcTo behavior for oversized radii.
pub fn rounded_rect(x: f32, y: f32, w: f32, h: f32, r: f32) -> Option<Path> {
    let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
    let mut pb = PathBuilder::new();
    if r <= 0.0 {
        pb.push_rect(tiny_skia::Rect::from_xywh(x, y, w, h)?);
        return pb.finish();
    }
    let k = KAPPA * r;
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Append a circular arc (radians, clockwise-positive in screen space) to a
/// path builder, starting with a move_to unless `connect` is set.
fn push_arc(pb: &mut PathBuilder, cx: f32, cy: f32, r: f32, start: f32, sweep: f32, connect: bool) {
    let segments = (sweep.abs() / std::f32::consts::FRAC_PI_2).ceil().max(1.0) as u32;
    let delta = sweep / segments as f32;
    let k = 4.0 / 3.0 * (delta / 4.0).tan();

    let mut a0 = start;
    let p0 = (cx + r * a0.cos(), cy + r * a0.sin());
    if connect {
        pb.line_to(p0.0, p0.1);
    } else {
        pb.move_to(p0.0, p0.1);
    }
    for _ in 0..segments {
        let a1 = a0 + delta;
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        let p1 = (cx + r * (c0 - k * s0), cy + r * (s0 + k * c0));
        let p2 = (cx + r * (c1 + k * s1), cy + r * (s1 - k * c1));
        let p3 = (cx + r * c1, cy + r * s1);
        pb.cubic_to(p1.0, p1.1, p2.0, p2.1, p3.0, p3.1);
        a0 = a1;
    }
}

/// Standalone arc path for stroking.
pub fn arc(cx: f32, cy: f32, r: f32, start: f32, sweep: f32) -> Option<Path> {
    let mut pb = PathBuilder::new();
    push_arc(&mut pb, cx, cy, r, start, sweep, false);
    pb.finish()
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

pub fn fill(pixmap: &mut Pixmap, path: &Path, color: Color, mask: Option<&Mask>) {
    pixmap.fill_path(
        path,
        &solid_paint(color),
        FillRule::Winding,
        Transform::identity(),
        mask,
    );
}

fn stroke(pixmap: &mut Pixmap, path: &Path, color: Color, width: f32, mask: Option<&Mask>) {
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        path,
        &solid_paint(color),
        &stroke,
        Transform::identity(),
        mask,
    );
}

const WHITE: Color = Color::WHITE;

/// Four signal bars of increasing height.
pub fn draw_signal(pixmap: &mut Pixmap, mask: Option<&Mask>, x: f32, y: f32, w: f32, h: f32) {
    let gap = w * 0.2;
    let bar_w = (w - 3.0 * gap) / 4.0;
    for i in 0..4 {
        let bar_h = h * (0.4 + 0.2 * i as f32);
        if let Some(path) = rounded_rect(x + i as f32 * (bar_w + gap), y + (h - bar_h), bar_w, bar_h, 1.0)
        {
            fill(pixmap, &path, WHITE, mask);
        }
    }
}

/// Two concentric arcs plus a dot.
pub fn draw_wifi(pixmap: &mut Pixmap, mask: Option<&Mask>, x: f32, y: f32, size: f32) {
    use std::f32::consts::PI;
    let cx = x + size / 2.0;
    let cy = y + size;
    for radius in [size * 0.9, size * 0.6] {
        if let Some(path) = arc(cx, cy, radius, PI * 1.25, PI * 0.5) {
            stroke(pixmap, &path, WHITE, 2.5, mask);
        }
    }
    let mut pb = PathBuilder::new();
    pb.push_circle(cx, y + size * 0.9, size * 0.15);
    if let Some(path) = pb.finish() {
        fill(pixmap, &path, WHITE, mask);
    }
}

/// Rounded outline, inner fill and the terminal nub.
pub fn draw_battery(pixmap: &mut Pixmap, mask: Option<&Mask>, x: f32, y: f32, w: f32, h: f32) {
    use std::f32::consts::FRAC_PI_2;
    if let Some(path) = rounded_rect(x, y, w, h, h / 3.0) {
        stroke(pixmap, &path, WHITE, 2.0, mask);
    }
    if let Some(path) = rounded_rect(x + 2.0, y + 2.0, w - 4.0, h - 4.0, h / 4.0) {
        fill(pixmap, &path, WHITE, mask);
    }
    // Terminal nub: half-disc bulging to the right of the body.
    let mut pb = PathBuilder::new();
    push_arc(&mut pb, x + w + 2.0, y + h / 2.0, h / 4.0, -FRAC_PI_2, std::f32::consts::PI, false);
    pb.close();
    if let Some(path) = pb.finish() {
        fill(pixmap, &path, WHITE, mask);
    }
}

/// 5x7 bitmap rows for '0'..'9' and ':'. No font asset ships with the
/// engine; the clock renders from these glyphs at status-bar text size.
const GLYPHS_5X7: [[u8; 7]; 11] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111], // 2
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110], // 3
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110], // 5
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000], // 7
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100], // 9
    [0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000], // :
];

fn glyph_index(c: char) -> Option<usize> {
    match c {
        '0'..='9' => Some(c as usize - '0' as usize),
        ':' => Some(10),
        _ => None,
    }
}

/// Pixel width of `text` at the given scale, for centering.
pub fn clock_text_width(text: &str, scale: f32) -> f32 {
    let cell = cell_size(scale);
    let n = text.chars().filter(|c| glyph_index(*c).is_some()).count() as f32;
    if n == 0.0 {
        0.0
    } else {
        n * 6.0 * cell - cell
    }
}

// Glyph cap height tracks the original's 15px font (~11px cap height).
fn cell_size(scale: f32) -> f32 {
    11.0 * scale / 7.0
}

/// Draw clock text centered on `center_x` with its baseline on `baseline_y`.
/// Unknown characters are skipped.
pub fn draw_clock_text(
    pixmap: &mut Pixmap,
    mask: Option<&Mask>,
    text: &str,
    center_x: f32,
    baseline_y: f32,
    scale: f32,
) {
    let cell = cell_size(scale);
    let top = baseline_y - 7.0 * cell;
    let mut pen_x = center_x - clock_text_width(text, scale) / 2.0;

    for c in text.chars() {
        let Some(glyph) = glyph_index(c) else { continue };
        let rows = &GLYPHS_5X7[glyph];
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5u32 {
                if bits & (1 << (4 - col)) == 0 {
                    continue;
                }
                if let Some(rect) = tiny_skia::Rect::from_xywh(
                    pen_x + col as f32 * cell,
                    top + row as f32 * cell,
                    cell,
                    cell,
                ) {
                    let path = PathBuilder::from_rect(rect);
                    fill(pixmap, &path, WHITE, mask);
                }
            }
        }
        pen_x += 6.0 * cell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_rect_clamps_radius() {
        // Radius larger than half the short side must still produce a path.
        assert!(rounded_rect(0.0, 0.0, 10.0, 4.0, 50.0).is_some());
        assert!(rounded_rect(0.0, 0.0, 10.0, 4.0, 0.0).is_some());
    }

    #[test]
    fn test_arc_produces_path() {
        use std::f32::consts::PI;
        let path = arc(10.0, 10.0, 5.0, PI * 1.25, PI * 0.5).unwrap();
        let bounds = path.bounds();
        // The wifi arc sweeps over the top of the circle.
        assert!(bounds.top() < 10.0);
    }

    #[test]
    fn test_clock_text_width_scales() {
        let narrow = clock_text_width("12:34", 1.0);
        let wide = clock_text_width("12:34", 3.0);
        assert!(narrow > 0.0);
        assert!((wide - narrow * 3.0).abs() < 0.01);
        assert_eq!(clock_text_width("", 2.0), 0.0);
    }

    #[test]
    fn test_clock_text_marks_pixels() {
        let mut pixmap = Pixmap::new(100, 40).unwrap();
        draw_clock_text(&mut pixmap, None, "08:15", 50.0, 30.0, 1.5);
        let lit = pixmap.pixels().iter().filter(|p| p.alpha() > 0).count();
        assert!(lit > 0);
    }

    #[test]
    fn test_glyphs_draw_inside_bounds() {
        let mut pixmap = Pixmap::new(120, 60).unwrap();
        draw_signal(&mut pixmap, None, 10.0, 20.0, 17.0, 11.0);
        draw_wifi(&mut pixmap, None, 40.0, 18.0, 16.0);
        draw_battery(&mut pixmap, None, 70.0, 20.0, 22.0, 11.0);
        let lit = pixmap.pixels().iter().filter(|p| p.alpha() > 0).count();
        assert!(lit > 50);
    }
}
