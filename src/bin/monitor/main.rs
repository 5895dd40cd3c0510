mod gui;

use std::{path::PathBuf, sync::mpsc, sync::Arc};

use clap::Parser;
use log::error;
use sarina::{
    config::NavConfig,
    dummy_capture::DummyBackend,
    position::SimulatedWalker,
    route::Route,
    session::{ChannelSink, NavigationSession},
    sprite::{Sprite, PLACEHOLDER_SIZE},
};

use gui::engage_gui;

/// Watch a simulated walk along a route
#[derive(Debug, Parser)]
#[clap(version, about)]
struct MonitorArgs {
    /// Route file (RON) to walk
    #[arg(short = 'r', long = "route")]
    route: PathBuf,

    /// Meters the simulated user walks per frame
    #[arg(long = "speed", default_value_t = 0.5)]
    speed: f64,
}

fn main() {
    env_logger::init();
    let args = MonitorArgs::parse();

    let route = match Route::from_path(&args.route) {
        Ok(route) => Arc::new(route),
        Err(e) => {
            eprintln!("monitor: {}", e);
            std::process::exit(1);
        }
    };

    let walker = Arc::new(
        SimulatedWalker::builder(Arc::clone(&route))
            .step(args.speed)
            .jitter(1.5)
            .heading_jitter(8.0)
            .build(),
    );
    let backend = DummyBackend::builder().build();
    let session = NavigationSession::new(
        Arc::clone(&route),
        Sprite::placeholder(PLACEHOLDER_SIZE),
        NavConfig::default(),
    );

    let (tx, rx) = mpsc::channel();
    let started =
        session.and_then(|session| session.start(&backend, Arc::clone(&walker), ChannelSink(tx)));
    let handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("monitor: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = engage_gui(route, walker, rx) {
        error!("Monitor failed: {}", e);
    }

    match handle.join() {
        Ok(summary) => println!("{:#?}", summary),
        Err(e) => eprintln!("monitor: {}", e),
    }
}
