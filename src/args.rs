// Commandline argument parser using clap for SARI NA

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct SarinaArgs {
    #[command(subcommand, long_about)]
    /// Which task to perform
    pub command: CommandTask,

    /// RON file overriding the navigation tunables
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Guide along a route using a camera and, optionally, a serial GPS receiver
    #[command(about)]
    Navigate(NavigateCommand),

    /// Walk a route with a simulated user and a synthetic camera
    #[command(about)]
    Simulate(SimulateCommand),

    /// Print a route's length and distance to each waypoint
    #[command(about)]
    Route(RouteCommand),

    /// List or search the destination catalogue
    #[command(about)]
    Places(PlacesCommand),
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct NavigateCommand {
    /// Route file (RON) to follow
    #[arg(short = 'r', long = "route")]
    pub route: PathBuf,

    /// Name of the destination; appended to the route if it is not already its end
    #[arg(short = 't', long = "to", requires = "places")]
    pub to: Option<String>,

    /// Destination catalogue (RON) used to resolve --to
    #[arg(short = 'p', long = "places")]
    pub places: Option<PathBuf>,

    /// Arrow image; a plain triangle is drawn if missing
    #[arg(short = 's', long = "sprite")]
    pub sprite: Option<PathBuf>,

    /// Directory holding video<N> subdirectories of recorded frames
    #[arg(long = "camera-dir")]
    pub camera_dir: PathBuf,

    /// Serial port of an NMEA GPS receiver
    #[arg(short = 'g', long = "gps", conflicts_with = "select_gps")]
    pub gps: Option<String>,

    /// Choose the GPS serial port interactively
    #[arg(long = "select-gps")]
    pub select_gps: bool,

    /// Baud rate of the GPS receiver
    #[arg(short = 'b', long = "baud", default_value_t = 9600)]
    pub baud: u32,

    /// Directory that composited JPEG frames are written to
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Stop after this many frames instead of running until a key is pressed
    #[arg(short = 'n', long = "frames")]
    pub frames: Option<u64>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct SimulateCommand {
    /// Route file (RON) to walk
    #[arg(short = 'r', long = "route")]
    pub route: PathBuf,

    /// Arrow image; a plain triangle is drawn if missing
    #[arg(short = 's', long = "sprite")]
    pub sprite: Option<PathBuf>,

    /// Directory that composited JPEG frames are written to
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Number of frames to produce
    #[arg(short = 'n', long = "frames", default_value_t = 200)]
    pub frames: u64,

    /// Meters the simulated user walks per frame
    #[arg(long = "speed", default_value_t = 1.4)]
    pub speed: f64,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct RouteCommand {
    /// Route file (RON) to inspect
    #[arg(short = 'r', long = "route")]
    pub route: PathBuf,

    /// Simplify with this tolerance, in meters, before printing
    #[arg(long = "simplify")]
    pub simplify: Option<f64>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PlacesCommand {
    /// Destination catalogue (RON)
    #[arg(short = 'p', long = "places")]
    pub places: PathBuf,

    /// Part of a place name; lists everything when omitted
    pub query: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigate() {
        let args = SarinaArgs::try_parse_from([
            "sarina",
            "--config",
            "nav.ron",
            "navigate",
            "--route",
            "r.ron",
            "--camera-dir",
            "cams",
            "--gps",
            "/dev/ttyUSB0",
            "--frames",
            "10",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("nav.ron")));
        match args.command {
            CommandTask::Navigate(nav) => {
                assert_eq!(nav.route, PathBuf::from("r.ron"));
                assert_eq!(nav.gps.as_deref(), Some("/dev/ttyUSB0"));
                assert_eq!(nav.baud, 9600);
                assert_eq!(nav.frames, Some(10));
                assert!(!nav.select_gps);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn destination_needs_a_catalogue() {
        let res = SarinaArgs::try_parse_from([
            "sarina",
            "navigate",
            "-r",
            "r.ron",
            "--camera-dir",
            "cams",
            "--to",
            "Library",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn gps_choices_conflict() {
        let res = SarinaArgs::try_parse_from([
            "sarina",
            "navigate",
            "-r",
            "r.ron",
            "--camera-dir",
            "cams",
            "--gps",
            "COM3",
            "--select-gps",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn places_query_is_positional() {
        let args = SarinaArgs::try_parse_from(["sarina", "places", "-p", "p.ron", "lib"]).unwrap();
        match args.command {
            CommandTask::Places(p) => assert_eq!(p.query.as_deref(), Some("lib")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn simulate_defaults() {
        let args = SarinaArgs::try_parse_from(["sarina", "simulate", "-r", "r.ron"]).unwrap();
        match args.command {
            CommandTask::Simulate(s) => {
                assert_eq!(s.frames, 200);
                assert!((s.speed - 1.4).abs() < 1e-12);
                assert!(s.out.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn frames_help_names_the_stop_key() {
        use clap::CommandFactory;

        let cmd = SarinaArgs::command();
        let navigate = cmd.find_subcommand("navigate").unwrap();
        let frames = navigate
            .get_arguments()
            .find(|a| a.get_id() == "frames")
            .unwrap();
        let help = frames.get_help().unwrap().to_string();
        assert!(help.contains("key is pressed"), "{help}");
        assert!(!help.contains("Ctrl-C"));
    }
}
