//! Command line front end for the SARI NA wayfinding loop.

use clap::Parser;
use sarina::{
    args::{
        CommandTask, NavigateCommand, PlacesCommand, RouteCommand, SarinaArgs, SimulateCommand,
    },
    capture::ImageDirBackend,
    config::NavConfig,
    dummy_capture::DummyBackend,
    gui,
    navigator::Guidance,
    nmea,
    places::PlaceCatalog,
    position::{SharedPosition, SimulatedWalker},
    route::Route,
    session::{ChannelSink, DeliveredFrame, NavigationSession, StopFlag},
    sprite::{Sprite, PLACEHOLDER_SIZE},
};

use log::{error, info, warn};
use serial2::SerialPort;
use std::{
    error::Error,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

// Example:
// cargo run --bin sarina --
//                         navigate
//                         --route      routes/gate-to-library.ron
//                         --camera-dir recordings
//                         --gps        /dev/ttyUSB0
//                         --out        frames

fn main() {
    env_logger::init();
    let args = SarinaArgs::parse();

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("sarina: {}", e);
        std::process::exit(1);
    }
}

fn run(args: SarinaArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => NavConfig::from_path(path)?,
        None => NavConfig::default(),
    };

    match args.command {
        CommandTask::Navigate(cmd) => navigate(cmd, config),
        CommandTask::Simulate(cmd) => simulate(cmd, config),
        CommandTask::Route(cmd) => print_route(cmd),
        CommandTask::Places(cmd) => print_places(cmd),
    }
}

fn load_sprite(path: Option<&Path>) -> Sprite {
    match path {
        Some(path) => Sprite::load_or_placeholder(path),
        None => Sprite::placeholder(PLACEHOLDER_SIZE),
    }
}

fn write_frame(out: Option<&Path>, frame: &DeliveredFrame) -> io::Result<()> {
    if let Some(dir) = out {
        fs::write(dir.join(format!("frame{:06}.jpg", frame.sequence)), &frame.jpeg)?;
    }
    Ok(())
}

fn prepare_out(out: Option<&Path>) -> io::Result<()> {
    if let Some(dir) = out {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Finds the GPS port the user asked for, if any.
fn gps_port(cmd: &NavigateCommand) -> Result<Option<PathBuf>, Box<dyn Error>> {
    if let Some(port) = &cmd.gps {
        return Ok(Some(PathBuf::from(port)));
    }
    if !cmd.select_gps {
        return Ok(None);
    }
    let available_ports = SerialPort::available_ports()?;
    if available_ports.is_empty() {
        warn!("No serial ports found");
    }
    Ok(gui::device_selector(available_ports)?)
}

/// Reads NMEA sentences on its own thread. Dropping it stops and joins the
/// thread, whichever way `navigate` returns.
struct GpsReader {
    stop: StopFlag,
    thread: Option<JoinHandle<()>>,
}

impl GpsReader {
    fn spawn<R: Read + Send + 'static>(reader: R, shared: SharedPosition) -> io::Result<Self> {
        let stop = StopFlag::new();
        let reader_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("sarina-gps".to_string())
            .spawn(move || nmea::read_sentences(reader, &shared, &reader_stop))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    fn open(port_name: &Path, baud: u32, shared: SharedPosition) -> io::Result<Self> {
        let mut port = SerialPort::open(port_name, baud)?;
        // short timeout so the reader notices the stop flag
        port.set_read_timeout(Duration::from_millis(500))?;
        info!("Reading GPS from {} at {} baud", port_name.display(), baud);
        Self::spawn(port, shared)
    }
}

impl Drop for GpsReader {
    fn drop(&mut self) {
        self.stop.raise();
        if let Some(th) = self.thread.take() {
            if th.join().is_err() {
                warn!("GPS reader panicked");
            }
        }
    }
}

fn navigate(cmd: NavigateCommand, config: NavConfig) -> Result<(), Box<dyn Error>> {
    let mut route = Route::from_path(&cmd.route)?;
    if let Some(name) = &cmd.to {
        // clap guarantees --places alongside --to
        let places_path = cmd.places.as_deref().ok_or("--to needs --places")?;
        let catalog = PlaceCatalog::from_path(places_path)?;
        let (name, destination) = catalog
            .get(name)
            .ok_or_else(|| format!("unknown destination {name:?}"))?;
        info!("Destination {} at {}", name, destination);
        route = route.ending_at(destination, config.arrival_radius_m);
    }
    let route = Arc::new(route);
    let out = cmd.out.as_deref();
    prepare_out(out)?;

    let positions = SharedPosition::new();
    let _gps = match gps_port(&cmd)? {
        Some(port) => Some(GpsReader::open(&port, cmd.baud, positions.clone())?),
        None => {
            warn!("No GPS receiver, guidance will wait for a position");
            None
        }
    };

    let session = NavigationSession::new(
        Arc::clone(&route),
        load_sprite(cmd.sprite.as_deref()),
        config,
    )?;
    let backend = ImageDirBackend::new(&cmd.camera_dir);
    let (tx, rx) = mpsc::channel();
    let handle = session.start(&backend, positions, ChannelSink(tx))?;

    let summary = match cmd.frames {
        Some(n) => {
            for frame in rx.iter().take(n as usize) {
                write_frame(out, &frame)?;
            }
            handle.join()?
        }
        None => gui::watch_session(handle, rx, route.len(), |frame| {
            if let Err(e) = write_frame(out, frame) {
                warn!("Could not save frame {}: {}", frame.sequence, e);
            }
        })?,
    };

    println!(
        "{} frames, reached waypoint {} of {}{}",
        summary.frames_delivered,
        summary.final_index,
        route.last_index(),
        if summary.completed { ", destination reached" } else { "" }
    );
    Ok(())
}

fn simulate(cmd: SimulateCommand, config: NavConfig) -> Result<(), Box<dyn Error>> {
    let route = Arc::new(Route::from_path(&cmd.route)?);
    let out = cmd.out.as_deref();
    prepare_out(out)?;

    let walker = SimulatedWalker::builder(Arc::clone(&route))
        .step(cmd.speed)
        .build();
    let backend = DummyBackend::builder().size(640, 480).build();
    let session = NavigationSession::new(
        Arc::clone(&route),
        load_sprite(cmd.sprite.as_deref()),
        config,
    )?;

    let (tx, rx) = mpsc::channel();
    let handle = session.start(&backend, walker, ChannelSink(tx))?;
    for frame in rx.iter().take(cmd.frames as usize) {
        write_frame(out, &frame)?;
        if let Guidance::Arrived { .. } = frame.guidance {
            break;
        }
    }
    let summary = handle.join()?;

    println!(
        "{} frames, reached waypoint {} of {}{}",
        summary.frames_delivered,
        summary.final_index,
        route.last_index(),
        if summary.completed { ", destination reached" } else { "" }
    );
    Ok(())
}

fn print_route(cmd: RouteCommand) -> Result<(), Box<dyn Error>> {
    let mut route = Route::from_path(&cmd.route)?;
    if let Some(tolerance) = cmd.simplify {
        let before = route.len();
        route = route.simplify(tolerance);
        println!("Simplified from {} to {} waypoints", before, route.len());
    }

    if let Some(name) = route.name() {
        println!("{}", name);
    }
    println!("{} waypoints, {:.1} m", route.len(), route.length_m());
    for (i, (p, d)) in route
        .waypoints()
        .iter()
        .zip(route.cumulative_m())
        .enumerate()
    {
        println!("{:>4}  {}  {:>8.1} m", i, p, d);
    }
    Ok(())
}

fn print_places(cmd: PlacesCommand) -> Result<(), Box<dyn Error>> {
    let catalog = PlaceCatalog::from_path(&cmd.places)?;
    let matches = catalog.search(cmd.query.as_deref().unwrap_or(""));
    if matches.is_empty() {
        println!("No places found");
    }
    for (name, location) in matches {
        println!("{}  {}", location, name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A receiver that never sends anything, like a quiet serial port.
    /// Notes when the reader thread lets go of it.
    struct Silent(Arc<AtomicBool>);

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(5));
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    impl Drop for Silent {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn gps_reader_stops_when_navigation_bails_out() {
        fn fails_midway(reader: Silent) -> Result<(), Box<dyn Error>> {
            let _gps = GpsReader::spawn(reader, SharedPosition::new())?;
            Err("could not write frame".into())
        }

        let released = Arc::new(AtomicBool::new(false));
        assert!(fails_midway(Silent(Arc::clone(&released))).is_err());
        assert!(released.load(Ordering::SeqCst));
    }
}
