//! The arrow drawn over the camera feed. It points straight up in its
//! source image; the compositor rotates it toward the next waypoint.

use image::{ImageError, Rgba, RgbaImage};
use log::{info, warn};
use std::path::Path;

/// Edge length of the synthesized arrow, in pixels.
pub const PLACEHOLDER_SIZE: u32 = 160;

const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([0, 200, 255, 255]);

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    image: RgbaImage,
}

impl Sprite {
    /// Wraps an already decoded RGBA image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decodes an image file. Files without an alpha channel come out fully
    /// opaque.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self { image })
    }

    /// Like [`Sprite::load`], but a missing or unreadable file yields the
    /// [`Sprite::placeholder`] arrow instead of an error.
    pub fn load_or_placeholder(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(sprite) => {
                info!(
                    "Loaded arrow sprite {} ({}x{})",
                    path.display(),
                    sprite.image.width(),
                    sprite.image.height()
                );
                sprite
            }
            Err(e) => {
                warn!(
                    "Could not load arrow sprite {}: {}. Using placeholder.",
                    path.display(),
                    e
                );
                Self::placeholder(PLACEHOLDER_SIZE)
            }
        }
    }

    /// A solid upward triangle on a transparent square.
    pub fn placeholder(size: u32) -> Self {
        let size = size.max(3);
        let half = size as f64 / 2.0;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            let cx = x as f64 + 0.5;
            let cy = y as f64 + 0.5;
            // apex at top center, base along the bottom edge
            let half_width_here = half * (cy / size as f64);
            if (cx - half).abs() <= half_width_here {
                PLACEHOLDER_COLOR
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn placeholder_is_a_triangle() {
        let sprite = Sprite::placeholder(100);
        assert_eq!((sprite.width(), sprite.height()), (100, 100));
        let img = sprite.image();
        // corners are transparent, bottom center and apex are filled
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(99, 0)[3], 0);
        assert_eq!(img.get_pixel(50, 99)[3], 255);
        assert_eq!(img.get_pixel(50, 1)[3], 255);
        assert_eq!(img.get_pixel(5, 10)[3], 0);
    }

    #[test]
    fn missing_file_falls_back() {
        let sprite = Sprite::load_or_placeholder("/definitely/not/here/arrow.png");
        assert_eq!(sprite, Sprite::placeholder(PLACEHOLDER_SIZE));
    }

    #[test]
    fn rgb_file_becomes_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrow.png");
        RgbImage::from_pixel(12, 8, Rgb([10, 20, 30])).save(&path).unwrap();

        let sprite = Sprite::load(&path).unwrap();
        assert_eq!((sprite.width(), sprite.height()), (12, 8));
        assert!(sprite.image().pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }
}
