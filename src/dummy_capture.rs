//! A pretend camera for tests and for running without hardware. Frames are
//! a moving gradient; reads can be made to fail on a schedule, and shared
//! counters let a test see exactly what the loop did with the device.

use crate::capture::{CaptureBackend, CaptureError, FrameSource};
use image::{Rgb, RgbImage};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

/// What happened to the dummy devices, readable from any thread.
#[derive(Debug, Default)]
pub struct CaptureCounters {
    opens: AtomicUsize,
    frames: AtomicUsize,
    failures: AtomicUsize,
    releases: AtomicUsize,
}

impl CaptureCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Frames successfully handed out, probe reads included.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct DummyCapture {
    width: u32,
    height: u32,
    frame_no: usize,
    reads: usize,
    /// Every read fails.
    dark: bool,
    /// Every `n`th read fails.
    fail_every: Option<usize>,
    read_delay: Duration,
    released: bool,
    counters: Arc<CaptureCounters>,
}

impl DummyCapture {
    fn gradient(&self) -> RgbImage {
        let shift = (self.frame_no * 4) as u32;
        let (w, h) = (self.width.max(1), self.height.max(1));
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x * 255 / w + shift) % 256) as u8,
                (y * 255 / h) as u8,
                96,
            ])
        })
    }
}

impl FrameSource for DummyCapture {
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        self.reads += 1;

        let scheduled_failure = self.fail_every.map_or(false, |n| self.reads % n == 0);
        if self.released || self.dark || scheduled_failure {
            self.counters.failures.fetch_add(1, Ordering::SeqCst);
            return Err(CaptureError::ReadFailed("dummy read failure".to_string()));
        }

        let frame = self.gradient();
        self.frame_no += 1;
        self.counters.frames.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Opens [`DummyCapture`] devices.
pub struct DummyBackend {
    available: Vec<u32>,
    dark: Vec<u32>,
    width: u32,
    height: u32,
    fail_every: Option<usize>,
    read_delay: Duration,
    counters: Arc<CaptureCounters>,
}

pub struct DummyBackendBuilder {
    available: Vec<u32>,
    dark: Vec<u32>,
    width: u32,
    height: u32,
    fail_every: Option<usize>,
    read_delay: Duration,
}

impl DummyBackendBuilder {
    /// Device indices that can be opened.
    pub fn available(mut self, indices: &[u32]) -> Self {
        self.available = indices.to_vec();
        self
    }

    /// Devices that open but never produce a frame.
    pub fn dark(mut self, indices: &[u32]) -> Self {
        self.dark = indices.to_vec();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Make every `n`th read on a device fail.
    pub fn fail_every(mut self, n: usize) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Simulated exposure time per read.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn build(self) -> DummyBackend {
        DummyBackend {
            available: self.available,
            dark: self.dark,
            width: self.width,
            height: self.height,
            fail_every: self.fail_every,
            read_delay: self.read_delay,
            counters: Arc::new(CaptureCounters::default()),
        }
    }
}

impl DummyBackend {
    pub fn builder() -> DummyBackendBuilder {
        DummyBackendBuilder {
            available: vec![0],
            dark: vec![],
            width: 160,
            height: 120,
            fail_every: None,
            read_delay: Duration::ZERO,
        }
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        Arc::clone(&self.counters)
    }
}

impl CaptureBackend for DummyBackend {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, CaptureError> {
        if !self.available.contains(&index) {
            return Err(CaptureError::NotFound(index));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(DummyCapture {
            width: self.width,
            height: self.height,
            frame_no: 0,
            reads: 0,
            dark: self.dark.contains(&index),
            fail_every: self.fail_every,
            read_delay: self.read_delay,
            released: false,
            counters: self.counters(),
        }))
    }
}
