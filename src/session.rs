//! The live wayfinding loop.
//!
//! A [`NavigationSession`] owns one route, one arrow sprite and one set of
//! tunables. Starting it opens a camera on the caller's thread (so a
//! missing camera is reported before anything runs) and then hands the
//! device to a single worker thread that repeats, until told to stop:
//!
//! 1. read a frame, backing off briefly if the read fails
//! 2. poll position and heading
//! 3. step the [`Navigator`]
//! 4. draw the arrow (or a waiting / arrived indicator) and the banner
//! 5. JPEG-encode the frame and deliver it
//! 6. sleep for the frame interval
//!
//! Stopping is cooperative: the worker checks a [`StopFlag`] at the top of
//! every iteration and releases the camera before it returns.

use crate::banner;
use crate::capture::{self, CaptureBackend, CaptureError, FrameSource};
use crate::compositor::{self, CompositeParams};
use crate::config::{ConfigError, NavConfig};
use crate::geodesy::LatLon;
use crate::navigator::{Guidance, Navigator};
use crate::position::PositionSource;
use crate::route::{Route, RouteError};
use crate::sprite::Sprite;

use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, ImageResult, RgbImage};
use log::{debug, info, warn};
use std::{
    borrow::Cow,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread::{self, JoinHandle},
};

/// A cancellation flag shared between the owner of a session and its
/// worker. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One composited frame on its way to the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredFrame {
    /// Counts delivered frames from zero, in capture order.
    pub sequence: u64,
    pub guidance: Guidance,
    /// Baseline JPEG bytes.
    pub jpeg: Vec<u8>,
}

impl DeliveredFrame {
    /// The JPEG as standard base64, the form image widgets usually take.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.jpeg)
    }
}

/// Where finished frames go. Called once per iteration on the worker
/// thread; the loop does not continue until it returns.
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: DeliveredFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(DeliveredFrame) + Send,
{
    fn deliver(&mut self, frame: DeliveredFrame) {
        self(frame)
    }
}

/// Forwards frames into a channel. A hung-up receiver is not an error;
/// the frames are dropped until the session is stopped.
pub struct ChannelSink(pub Sender<DeliveredFrame>);

impl FrameSink for ChannelSink {
    fn deliver(&mut self, frame: DeliveredFrame) {
        if let Err(e) = self.0.send(frame) {
            debug!("Frame receiver gone, dropping frame {}", e.0.sequence);
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    Route(RouteError),
    Config(ConfigError),
    /// No camera could be opened; nothing was started.
    Capture(CaptureError),
    Spawn(std::io::Error),
    WorkerPanicked,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SessionError::Route(e) => Cow::from(format!("route error: {e}")),
            SessionError::Config(e) => Cow::from(format!("config error: {e}")),
            SessionError::Capture(e) => Cow::from(format!("capture error: {e}")),
            SessionError::Spawn(e) => Cow::from(format!("could not start worker: {e}")),
            SessionError::WorkerPanicked => Cow::from("navigation worker panicked"),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {}

impl From<RouteError> for SessionError {
    fn from(value: RouteError) -> Self {
        Self::Route(value)
    }
}

impl From<ConfigError> for SessionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<CaptureError> for SessionError {
    fn from(value: CaptureError) -> Self {
        Self::Capture(value)
    }
}

/// How a finished session went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub frames_delivered: u64,
    pub read_failures: u64,
    pub encode_failures: u64,
    /// Waypoint being walked to when the loop stopped.
    pub final_index: usize,
    pub completed: bool,
}

pub struct NavigationSession {
    route: Arc<Route>,
    sprite: Sprite,
    config: NavConfig,
}

impl NavigationSession {
    /// Fails if `config` does not pass [`NavConfig::validate`], so a built
    /// session can always run its loop.
    pub fn new(route: Arc<Route>, sprite: Sprite, config: NavConfig) -> Result<Self, SessionError> {
        config.validate()?;
        if route.is_empty() {
            return Err(RouteError::Empty.into());
        }

        Ok(Self {
            route,
            sprite,
            config,
        })
    }

    /// Builds a session straight from raw waypoints. An empty sequence is
    /// refused here rather than discovered mid-loop.
    pub fn from_waypoints(
        waypoints: Vec<LatLon>,
        sprite: Sprite,
        config: NavConfig,
    ) -> Result<Self, SessionError> {
        let route = Route::new(waypoints)?;
        Self::new(Arc::new(route), sprite, config)
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Opens a camera and runs the loop on a new worker thread.
    ///
    /// Fails without spawning anything if none of the configured camera
    /// candidates delivers a frame.
    pub fn start<P, S>(
        self,
        backend: &dyn CaptureBackend,
        positions: P,
        mut sink: S,
    ) -> Result<SessionHandle, SessionError>
    where
        P: PositionSource + 'static,
        S: FrameSink + 'static,
    {
        let (device, source) = capture::acquire(backend, &self.config.camera_candidates)?;
        let stop = StopFlag::new();
        let worker_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("sarina-nav".to_string())
            .spawn(move || self.run(source, &positions, &mut sink, &worker_stop))
            .map_err(SessionError::Spawn)?;

        info!("Navigation session started on capture device {}", device);
        Ok(SessionHandle {
            stop,
            device,
            handle: Some(handle),
        })
    }

    /// The loop body, run on the calling thread until `stop` is raised.
    /// `source` is released before this returns.
    pub fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        positions: &dyn PositionSource,
        sink: &mut dyn FrameSink,
        stop: &StopFlag,
    ) -> SessionSummary {
        let mut navigator = Navigator::new(Arc::clone(&self.route), self.config.clone());
        let params = CompositeParams::from(&self.config);
        let mut summary = SessionSummary::default();
        let mut failed_reads_in_a_row = 0u64;

        info!(
            "Navigating {} waypoints ({:.0} m)",
            self.route.len(),
            self.route.length_m()
        );

        while !stop.is_raised() {
            let mut frame = match source.read_frame() {
                Ok(frame) => {
                    failed_reads_in_a_row = 0;
                    frame
                }
                Err(e) => {
                    summary.read_failures += 1;
                    failed_reads_in_a_row += 1;
                    if failed_reads_in_a_row == 1 {
                        warn!("Frame read failed, retrying: {}", e);
                    } else {
                        debug!("Frame read failed {} times: {}", failed_reads_in_a_row, e);
                    }
                    spin_sleep::sleep(self.config.read_retry());
                    continue;
                }
            };

            let position = positions.current_position();
            let heading = positions.current_heading();
            let guidance = navigator.step(position, heading);

            self.render(&mut frame, &guidance, &params);

            match encode_jpeg(&frame, self.config.jpeg_quality) {
                Ok(jpeg) => {
                    sink.deliver(DeliveredFrame {
                        sequence: summary.frames_delivered,
                        guidance,
                        jpeg,
                    });
                    summary.frames_delivered += 1;
                }
                Err(e) => {
                    summary.encode_failures += 1;
                    warn!("Could not encode frame: {}", e);
                }
            }

            spin_sleep::sleep(self.config.frame_interval());
        }

        source.release();
        summary.final_index = navigator.index();
        summary.completed = navigator.is_complete();
        info!("Navigation session stopped: {:?}", summary);
        summary
    }

    fn render(&self, frame: &mut RgbImage, guidance: &Guidance, params: &CompositeParams) {
        match *guidance {
            Guidance::Heading {
                draw_angle_deg,
                scale,
                ..
            } => {
                if !compositor::composite(frame, self.sprite.image(), draw_angle_deg, scale, params) {
                    debug!("Arrow skipped at scale {:.3}", scale);
                }
            }
            Guidance::Arrived { .. } => {
                banner::draw_arrival_marker(frame, params.anchor_fraction);
            }
            Guidance::WaitingForSignal => {}
        }

        if self.config.banner {
            banner::draw_banner(frame, &banner::status_text(guidance, self.route.len()));
        }
    }
}

/// Encodes an RGB frame as a baseline JPEG.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(frame)?;
    Ok(jpeg)
}

/// A running session. Dropping the handle stops the worker and waits for
/// it, so the camera is always released.
pub struct SessionHandle {
    stop: StopFlag,
    device: u32,
    handle: Option<JoinHandle<SessionSummary>>,
}

impl SessionHandle {
    /// Asks the worker to finish after its current iteration.
    pub fn stop(&self) {
        self.stop.raise();
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Index of the capture device in use.
    pub fn device(&self) -> u32 {
        self.device
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stops the worker and waits for it.
    pub fn join(mut self) -> Result<SessionSummary, SessionError> {
        self.stop.raise();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SessionError::WorkerPanicked),
            None => Ok(SessionSummary::default()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.raise();
            if handle.join().is_err() {
                warn!("Navigation worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy_capture::DummyBackend;
    use crate::geodesy;
    use crate::position::FixedPosition;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    const WP0: LatLon = LatLon::new(13.6217, 123.1948);
    const WP1: LatLon = LatLon::new(13.6220, 123.1950);

    fn fast_config() -> NavConfig {
        NavConfig {
            frame_interval_ms: 2,
            read_retry_ms: 1,
            camera_candidates: vec![0],
            ..NavConfig::default()
        }
    }

    fn session(waypoints: Vec<LatLon>) -> NavigationSession {
        NavigationSession::from_waypoints(waypoints, Sprite::placeholder(40), fast_config()).unwrap()
    }

    /// Runs a session on this thread until `n` frames were delivered.
    fn run_frames(
        session: &NavigationSession,
        backend: &DummyBackend,
        positions: &dyn PositionSource,
        n: usize,
    ) -> (SessionSummary, Vec<DeliveredFrame>) {
        let source = backend.open(0).unwrap();
        let stop = StopFlag::new();
        let sink_stop = stop.clone();
        let mut frames = Vec::new();
        let summary = {
            let mut sink = |f: DeliveredFrame| {
                frames.push(f);
                if frames.len() >= n {
                    sink_stop.raise();
                }
            };
            session.run(source, positions, &mut sink, &stop)
        };
        (summary, frames)
    }

    #[test]
    fn campus_scenario_end_to_end() {
        let session = session(vec![WP0, WP1]);
        let backend = DummyBackend::builder().build();
        let (summary, frames) = run_frames(&session, &backend, &FixedPosition::new(WP0, 0.0), 1);

        assert_eq!(frames.len(), 1);
        let expected = geodesy::bearing(WP0, WP1);
        match frames[0].guidance {
            Guidance::Heading {
                target_index,
                bearing_deg,
                draw_angle_deg,
                ..
            } => {
                assert_eq!(target_index, 1);
                assert!((bearing_deg - expected).abs() < 1e-9);
                assert!((draw_angle_deg - expected).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(&frames[0].jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&frames[0].jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 120));

        assert_eq!(summary.frames_delivered, 1);
        assert_eq!(summary.final_index, 1);
        assert!(!summary.completed);
        assert_eq!(backend.counters().releases(), 1);
    }

    #[test]
    fn missing_fix_still_streams() {
        let session = session(vec![WP0, WP1]);
        let backend = DummyBackend::builder().build();
        let (summary, frames) = run_frames(&session, &backend, &FixedPosition::no_fix(), 3);

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.guidance == Guidance::WaitingForSignal));
        assert_eq!(summary.final_index, 0);
    }

    #[test]
    fn arrival_keeps_streaming() {
        let session = session(vec![WP0]);
        let backend = DummyBackend::builder().build();
        let (summary, frames) = run_frames(&session, &backend, &FixedPosition::new(WP0, 0.0), 4);

        assert!(frames.iter().all(|f| f.guidance == Guidance::Arrived { index: 0 }));
        assert!(summary.completed);
        assert_eq!(summary.frames_delivered, 4);
    }

    #[test]
    fn read_failures_are_retried() {
        let session = session(vec![WP0, WP1]);
        let backend = DummyBackend::builder().fail_every(2).build();
        let (summary, frames) = run_frames(&session, &backend, &FixedPosition::new(WP1, 0.0), 5);

        assert_eq!(frames.len(), 5);
        assert!(summary.read_failures >= 4);
        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_route_is_refused() {
        let res = NavigationSession::from_waypoints(vec![], Sprite::placeholder(40), fast_config());
        assert!(matches!(res, Err(SessionError::Route(RouteError::Empty))));
    }

    #[test]
    fn no_camera_is_reported_before_starting() {
        let backend = DummyBackend::builder().available(&[]).build();
        let res = session(vec![WP0]).start(&backend, FixedPosition::no_fix(), |_: DeliveredFrame| {});
        assert!(matches!(
            res,
            Err(SessionError::Capture(CaptureError::NoDevice { .. }))
        ));
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = NavConfig {
            smoothing: 2.0,
            ..fast_config()
        };
        let res = NavigationSession::from_waypoints(vec![WP0], Sprite::placeholder(40), config);
        assert!(matches!(res, Err(SessionError::Config(_))));
    }

    #[test]
    fn inverted_scale_range_is_refused_before_running() {
        let route = Arc::new(Route::new(vec![WP0, WP1]).unwrap());
        let config = NavConfig {
            scale_min: 2.0,
            scale_max: 1.0,
            ..fast_config()
        };
        let res = NavigationSession::new(route, Sprite::placeholder(40), config);
        assert!(matches!(res, Err(SessionError::Config(_))));
    }

    #[test]
    fn stop_is_observed_within_one_iteration() {
        let backend = DummyBackend::builder()
            .read_delay(Duration::from_millis(2))
            .build();
        let counters = backend.counters();

        let delivered = Arc::new(AtomicUsize::new(0));
        let after_stop = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = channel();

        let handle = {
            let delivered = Arc::clone(&delivered);
            let after_stop = Arc::clone(&after_stop);
            let stop_probe: Arc<std::sync::Mutex<Option<StopFlag>>> = Default::default();
            let probe = Arc::clone(&stop_probe);
            let handle = session(vec![WP0, WP1])
                .start(&backend, FixedPosition::new(WP0, 0.0), move |f: DeliveredFrame| {
                    delivered.fetch_add(1, Ordering::SeqCst);
                    if let Some(stop) = probe.lock().unwrap().as_ref() {
                        if stop.is_raised() {
                            after_stop.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    let _ = tx.send(f.sequence);
                })
                .unwrap();
            *stop_probe.lock().unwrap() = Some(handle.stop_flag());
            handle
        };

        // let a few frames through, then stop
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(handle.is_running());
        handle.stop();
        let summary = handle.join().unwrap();

        assert!(after_stop.load(Ordering::SeqCst) <= 1);
        assert_eq!(summary.frames_delivered as usize, delivered.load(Ordering::SeqCst));
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn channel_sink_delivers_in_order_and_drop_stops() {
        let backend = DummyBackend::builder().build();
        let counters = backend.counters();
        let (tx, rx) = channel();

        let handle = session(vec![WP0, WP1])
            .start(&backend, FixedPosition::new(WP0, 45.0), ChannelSink(tx))
            .unwrap();
        assert_eq!(handle.device(), 0);

        let frames: Vec<DeliveredFrame> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        drop(handle);

        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.sequence, i as u64);
            assert!(!f.to_base64().is_empty());
        }
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn base64_matches_jpeg_bytes() {
        let frame = DeliveredFrame {
            sequence: 0,
            guidance: Guidance::WaitingForSignal,
            jpeg: vec![0xFF, 0xD8, 0xFF],
        };
        assert_eq!(frame.to_base64(), "/9j/");
    }
}
