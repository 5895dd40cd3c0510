//! Status overlays: a translucent strip across the top of the frame with a
//! short uppercase message, and a marker shown once the destination is
//! reached. Text is drawn with a tiny built-in 5x7 bitmap font so frames
//! can be annotated without a font file.

use crate::navigator::Guidance;
use image::{Rgb, RgbImage};

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
/// One blank column between glyphs.
const ADVANCE: u32 = GLYPH_W + 1;

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const ARRIVED_COLOR: Rgb<u8> = Rgb([40, 200, 80]);
/// How much of the background survives under the banner strip.
const STRIP_KEEP: f32 = 0.4;

/// Rows of a 5x7 glyph, most significant of the low five bits leftmost.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        ' ' => [0x00; 7],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Width in pixels of `text` drawn at `scale` pixels per font dot.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        0
    } else {
        (n * ADVANCE - 1) * scale
    }
}

/// Draws `text` with its top-left corner at `(x, y)`. Dots falling outside
/// the frame are dropped.
pub fn draw_text(frame: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
    let (fw, fh) = frame.dimensions();
    let scale = scale.max(1);

    for (n, c) in text.chars().enumerate() {
        let gx = x + n as u32 * ADVANCE * scale;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        if px + dx < fw && py + dy < fh {
                            frame.put_pixel(px + dx, py + dy, color);
                        }
                    }
                }
            }
        }
    }
}

/// Darkens a strip across the top of the frame and centers `text` on it.
/// The font grows with the frame but shrinks again if the text would not
/// fit the width.
pub fn draw_banner(frame: &mut RgbImage, text: &str) {
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 {
        return;
    }

    let mut scale = (fh / 120).max(1);
    while scale > 1 && text_width(text, scale) + 2 * scale > fw {
        scale -= 1;
    }
    let pad = 2 * scale;
    let strip_h = (GLYPH_H * scale + 2 * pad).min(fh);

    for y in 0..strip_h {
        for x in 0..fw {
            let p = frame.get_pixel_mut(x, y);
            for c in 0..3 {
                p[c] = (p[c] as f32 * STRIP_KEEP).round() as u8;
            }
        }
    }

    let x = fw.saturating_sub(text_width(text, scale)) / 2;
    draw_text(frame, text, x, pad, scale, TEXT_COLOR);
}

/// A filled disc where the arrow would otherwise be.
pub fn draw_arrival_marker(frame: &mut RgbImage, anchor_fraction: f64) {
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 {
        return;
    }
    let radius = (fw.min(fh) / 8).max(2) as i64;
    let cx = fw as i64 / 2;
    let cy = ((fh as f64 * anchor_fraction) as i64).clamp(0, fh as i64 - 1);

    for y in (cy - radius).max(0)..(cy + radius + 1).min(fh as i64) {
        for x in (cx - radius).max(0)..(cx + radius + 1).min(fw as i64) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                frame.put_pixel(x as u32, y as u32, ARRIVED_COLOR);
            }
        }
    }
}

/// "12 M" below a kilometer, "1.2 KM" above.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} KM", meters / 1000.0)
    } else {
        format!("{:.0} M", meters.max(0.0))
    }
}

/// The banner message for a navigation step on a route of `route_len`
/// waypoints.
pub fn status_text(guidance: &Guidance, route_len: usize) -> String {
    match guidance {
        Guidance::WaitingForSignal => "WAITING FOR GPS".to_string(),
        Guidance::Arrived { .. } => "DESTINATION REACHED".to_string(),
        Guidance::Heading {
            target_index,
            distance_m,
            ..
        } => format!(
            "{} TO WAYPOINT {}/{}",
            format_distance(*distance_m),
            target_index + 1,
            route_len
        ),
    }
}
