//! Camera access. The navigation loop reads frames from a [`FrameSource`];
//! a [`CaptureBackend`] knows how to open a source by device index.
//!
//! Phones and laptops often expose a front and a rear camera, and only the
//! rear one is any use for wayfinding. [`acquire`] therefore walks an
//! ordered list of candidate indices and keeps the first device that
//! actually delivers a frame.

use image::{imageops, imageops::FilterType, ImageError, RgbImage};
use log::{info, warn};
use std::{
    borrow::Cow,
    fmt, fs,
    path::{Path, PathBuf},
};

/// A live camera. Owned by exactly one thread at a time.
pub trait FrameSource: Send {
    /// Blocks until the next frame is available.
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Gives the device back. Called once, before the source is dropped.
    fn release(&mut self) {}
}

pub trait CaptureBackend {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError>;
}

#[derive(Debug)]
pub enum CaptureError {
    /// There is no device with this index.
    NotFound(u32),
    /// The device is open but did not produce a frame.
    ReadFailed(String),
    /// None of the candidate devices produced a frame.
    NoDevice { tried: Vec<u32> },
    IoError(std::io::Error),
    ImageError(ImageError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            CaptureError::NotFound(i) => Cow::from(format!("no capture device {i}")),
            CaptureError::ReadFailed(why) => Cow::from(format!("frame read failed: {why}")),
            CaptureError::NoDevice { tried } => {
                Cow::from(format!("camera not available (tried devices {tried:?})"))
            }
            CaptureError::IoError(error) => Cow::from(format!("io error: {}", error)),
            CaptureError::ImageError(error) => Cow::from(format!("image error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ImageError> for CaptureError {
    fn from(value: ImageError) -> Self {
        Self::ImageError(value)
    }
}

/// Opens the first candidate device that can deliver a frame.
///
/// Every candidate is probed with one read; devices that open but stay
/// dark are released again before moving on.
pub fn acquire(
    backend: &dyn CaptureBackend,
    candidates: &[u32],
) -> Result<(u32, Box<dyn FrameSource>), CaptureError> {
    for &index in candidates {
        let mut source = match backend.open(index) {
            Ok(source) => source,
            Err(e) => {
                info!("Capture device {} unavailable: {}", index, e);
                continue;
            }
        };

        match source.read_frame() {
            Ok(frame) => {
                info!(
                    "Using capture device {} ({}x{})",
                    index,
                    frame.width(),
                    frame.height()
                );
                return Ok((index, source));
            }
            Err(e) => {
                warn!("Capture device {} opened but gave no frame: {}", index, e);
                source.release();
            }
        }
    }

    Err(CaptureError::NoDevice {
        tried: candidates.to_vec(),
    })
}

/// Treats `<root>/video<N>` directories of still images as capture devices.
/// Frames are replayed in file-name order, looping forever. Handy for
/// running the loop on a desk with recorded footage.
#[derive(Debug, Clone)]
pub struct ImageDirBackend {
    root: PathBuf,
}

impl ImageDirBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn device_dir(&self, index: u32) -> PathBuf {
        self.root.join(format!("video{index}"))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

impl CaptureBackend for ImageDirBackend {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        let dir = self.device_dir(index);
        if !dir.is_dir() {
            return Err(CaptureError::NotFound(index));
        }

        let mut frames: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CaptureError::NotFound(index));
        }

        Ok(Box::new(ImageDirCapture {
            frames,
            next: 0,
            size: None,
        }))
    }
}

/// One `video<N>` directory opened as a camera.
pub struct ImageDirCapture {
    frames: Vec<PathBuf>,
    next: usize,
    /// Size of the first frame; later frames are resized to match.
    size: Option<(u32, u32)>,
}

impl FrameSource for ImageDirCapture {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.frames.is_empty() {
            return Err(CaptureError::ReadFailed("device released".to_string()));
        }
        let path = &self.frames[self.next];
        self.next = (self.next + 1) % self.frames.len();

        let frame = image::open(path)?.to_rgb8();
        match self.size {
            None => {
                self.size = Some(frame.dimensions());
                Ok(frame)
            }
            Some(size) if size == frame.dimensions() => Ok(frame),
            Some((w, h)) => Ok(imageops::resize(&frame, w, h, FilterType::Triangle)),
        }
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy_capture::DummyBackend;
    use image::Rgb;

    fn write_frames(dir: &Path, sizes: &[(u32, u32)]) {
        fs::create_dir_all(dir).unwrap();
        for (i, &(w, h)) in sizes.iter().enumerate() {
            RgbImage::from_pixel(w, h, Rgb([i as u8 * 40, 0, 0]))
                .save(dir.join(format!("frame{i:03}.png")))
                .unwrap();
        }
    }

    #[test]
    fn image_dir_replays_and_keeps_size() {
        let root = tempfile::tempdir().unwrap();
        write_frames(&root.path().join("video0"), &[(32, 24), (64, 48)]);
        fs::write(root.path().join("video0").join("notes.txt"), "ignored").unwrap();

        let backend = ImageDirBackend::new(root.path());
        let mut cam = backend.open(0).unwrap();
        let first = cam.read_frame().unwrap();
        let second = cam.read_frame().unwrap();
        let third = cam.read_frame().unwrap();

        assert_eq!(first.dimensions(), (32, 24));
        assert_eq!(second.dimensions(), (32, 24));
        assert_eq!(third, first);

        cam.release();
        assert!(cam.read_frame().is_err());
    }

    #[test]
    fn missing_dirs_are_not_found() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("video2")).unwrap();
        let backend = ImageDirBackend::new(root.path());
        assert!(matches!(backend.open(1), Err(CaptureError::NotFound(1))));
        assert!(matches!(backend.open(2), Err(CaptureError::NotFound(2))));
    }

    #[test]
    fn acquire_prefers_first_live_candidate() {
        let root = tempfile::tempdir().unwrap();
        write_frames(&root.path().join("video0"), &[(8, 8)]);
        let backend = ImageDirBackend::new(root.path());

        let (index, _) = acquire(&backend, &[1, 0]).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn acquire_skips_dark_devices_and_releases_them() {
        let backend = DummyBackend::builder().available(&[0, 1]).dark(&[1]).build();
        let counters = backend.counters();

        let (index, _) = acquire(&backend, &[1, 0]).unwrap();
        assert_eq!(index, 0);
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn acquire_fails_when_nothing_works() {
        let backend = DummyBackend::builder().available(&[]).build();
        match acquire(&backend, &[1, 0]) {
            Err(CaptureError::NoDevice { tried }) => assert_eq!(tried, vec![1, 0]),
            other => panic!("unexpected {:?}", other.map(|(i, _)| i)),
        }
    }
}
