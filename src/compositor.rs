//! Draws the direction arrow onto a camera frame.
//!
//! The sprite is rotated about its own center, scaled, shrunk if it would
//! not fit, anchored horizontally centered in the lower part of the frame
//! and alpha blended over the background. Anything that would produce a
//! degenerate or out of bounds draw simply leaves the frame untouched.

use crate::config::NavConfig;
use image::{imageops, imageops::FilterType, Rgba, RgbImage, RgbaImage};

/// Where and how small the arrow may be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    /// Vertical position of the sprite center as a fraction of frame height.
    pub anchor_fraction: f64,
    /// Scaled sprites narrower or shorter than this are not drawn.
    pub min_sprite_px: u32,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self::from(&NavConfig::default())
    }
}

impl From<&NavConfig> for CompositeParams {
    fn from(config: &NavConfig) -> Self {
        Self {
            anchor_fraction: config.anchor_fraction,
            min_sprite_px: config.min_sprite_px,
        }
    }
}

/// Rotates `img` about its center so that something pointing up ends up
/// pointing `angle_deg` degrees clockwise on screen. The canvas keeps its
/// size and uncovered corners are fully transparent.
pub fn rotate_rgba(img: &RgbaImage, angle_deg: f64) -> RgbaImage {
    let (w, h) = img.dimensions();
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;

    // inverse mapping: for each output pixel, find the source pixel that
    // lands on it and sample it (nearest neighbour)
    RgbaImage::from_fn(w, h, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let sx = (cos * dx + sin * dy + cx).floor();
        let sy = (-sin * dx + cos * dy + cy).floor();
        if sx >= 0.0 && sy >= 0.0 && sx < w as f64 && sy < h as f64 {
            *img.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Shrinks `(w, h)` uniformly until it fits inside `(max_w, max_h)`.
/// Sizes that already fit come back unchanged.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let (mut w, mut h) = (w, h);
    if h > max_h {
        w = (w as u64 * max_h as u64 / h as u64) as u32;
        h = max_h;
    }
    if w > max_w {
        h = (h as u64 * max_w as u64 / w as u64) as u32;
        w = max_w;
    }
    (w, h)
}

/// Blends `fg` over `frame` with its top-left corner at `(x, y)`. Only the
/// part that overlaps the frame is touched.
pub fn blend_at(frame: &mut RgbImage, fg: &RgbaImage, x: u32, y: u32) {
    let (fw, fh) = frame.dimensions();
    if x >= fw || y >= fh {
        return;
    }
    let w = fg.width().min(fw - x);
    let h = fg.height().min(fh - y);

    for j in 0..h {
        for i in 0..w {
            let src = fg.get_pixel(i, j);
            let alpha = src[3];
            if alpha == 0 {
                continue;
            }
            let dst = frame.get_pixel_mut(x + i, y + j);
            if alpha == 255 {
                dst.0 = [src[0], src[1], src[2]];
                continue;
            }
            let a = alpha as f32 / 255.0;
            for c in 0..3 {
                let blended = dst[c] as f32 * (1.0 - a) + src[c] as f32 * a;
                dst[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Draws `sprite` onto `frame`, rotated by `angle_deg` (clockwise on
/// screen) and scaled by `scale`. Returns whether anything was drawn.
pub fn composite(
    frame: &mut RgbImage,
    sprite: &RgbaImage,
    angle_deg: f64,
    scale: f64,
    params: &CompositeParams,
) -> bool {
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 || !scale.is_finite() || scale <= 0.0 || !angle_deg.is_finite() {
        return false;
    }

    let rotated = rotate_rgba(sprite, angle_deg);

    let target_w = (rotated.width() as f64 * scale) as u32;
    let target_h = (rotated.height() as f64 * scale) as u32;
    if target_w < params.min_sprite_px || target_h < params.min_sprite_px {
        return false;
    }

    let (target_w, target_h) = fit_within(target_w, target_h, fw, fh);
    if target_w == 0 || target_h == 0 {
        return false;
    }

    let scaled = if (target_w, target_h) == rotated.dimensions() {
        rotated
    } else {
        imageops::resize(&rotated, target_w, target_h, FilterType::Triangle)
    };

    let (x, y) = anchor(fw, fh, target_w, target_h, params.anchor_fraction);
    blend_at(frame, &scaled, x, y);
    true
}

/// Top-left corner for a `w`x`h` sprite: horizontally centered, vertical
/// center at `anchor_fraction` of the frame height, clamped inside the frame.
fn anchor(fw: u32, fh: u32, w: u32, h: u32, anchor_fraction: f64) -> (u32, u32) {
    let x = fw as i64 / 2 - w as i64 / 2;
    let y = (fh as f64 * anchor_fraction) as i64 - h as i64 / 2;

    let x = x.clamp(0, (fw as i64 - w as i64).max(0));
    let y = y.clamp(0, (fh as i64 - h as i64).max(0));
    (x as u32, y as u32)
}
