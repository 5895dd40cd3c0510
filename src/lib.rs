//! SARI NA is a campus wayfinding aid. Walking a route, the user holds up
//! their phone and sees the live camera picture with an arrow drawn on top,
//! pointing toward the next waypoint and growing as it gets closer. Once the
//! last waypoint is reached the arrow gives way to an arrival marker.
//!
//! This crate is the navigation core behind that view:
//!
//! - [`geodesy`], [`route`] and [`places`] describe where to go.
//! - [`position`] and [`nmea`] report where the user is and which way the
//!   device faces.
//! - [`capture`] reads camera frames.
//! - [`navigator`] decides what to show for each frame, and [`compositor`]
//!   and [`banner`] draw it.
//! - [`session`] ties all of that into a loop on a worker thread that hands
//!   out JPEG frames until it is stopped.
//!
//! The `sarina` binary runs the loop from the command line against recorded
//! camera frames and a serial GPS receiver; `monitor` shows a simulated walk
//! in the terminal.

pub mod args;
pub mod banner;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod dummy_capture;
pub mod geodesy;
pub mod gui;
pub mod navigator;
pub mod nmea;
pub mod places;
pub mod position;
pub mod route;
pub mod session;
pub mod sprite;
