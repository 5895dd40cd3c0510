//! Per-frame navigation state: which waypoint the user is walking to, where
//! the arrow should point and how big it should be.
//!
//! The [`Navigator`] is deliberately free of cameras and threads so that
//! waypoint advancement can be driven step by step from plain positions.

use crate::config::NavConfig;
use crate::geodesy::{self, Degrees, LatLon, Meters};
use crate::route::Route;
use log::{debug, info};
use std::sync::Arc;

/// What the overlay should show for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guidance {
    /// No position fix; navigation state was left untouched.
    WaitingForSignal,
    /// The final waypoint has been reached.
    Arrived { index: usize },
    /// Walk toward waypoint `target_index`.
    Heading {
        target_index: usize,
        /// Compass bearing from the user to the target.
        bearing_deg: Degrees,
        distance_m: Meters,
        /// Bearing relative to the device heading, in `[0, 360)`.
        draw_angle_deg: Degrees,
        /// Smoothed arrow scale.
        scale: f64,
    },
}

pub struct Navigator {
    route: Arc<Route>,
    config: NavConfig,
    index: usize,
    smoothed_scale: f64,
    complete: bool,
}

impl Navigator {
    pub fn new(route: Arc<Route>, config: NavConfig) -> Self {
        let smoothed_scale = config.initial_scale;
        Self {
            route,
            config,
            index: 0,
            smoothed_scale,
            complete: false,
        }
    }

    /// Index of the waypoint currently being walked to.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn smoothed_scale(&self) -> f64 {
        self.smoothed_scale
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Arrow scale for a target `distance_m` away, before smoothing: closer
    /// targets get a bigger arrow.
    pub fn target_scale(&self, distance_m: Meters) -> f64 {
        let c = &self.config;
        let (lo, hi) = if c.scale_min <= c.scale_max {
            (c.scale_min, c.scale_max)
        } else {
            (c.scale_max, c.scale_min)
        };
        // holds for unvalidated configs too, where clamp would panic
        (c.scale_near - distance_m / c.scale_falloff_m).max(lo).min(hi)
    }

    /// Advances the navigation state by one frame.
    ///
    /// At most one waypoint is passed per call. When that happens the new
    /// target is measured straight away so the arrow never lags a frame.
    pub fn step(&mut self, position: Option<LatLon>, heading: Degrees) -> Guidance {
        let Some(position) = position else {
            return Guidance::WaitingForSignal;
        };
        if self.complete {
            return Guidance::Arrived { index: self.index };
        }

        let mut target = self.route[self.index];
        let mut distance = geodesy::haversine_distance_m(position, target);

        if distance < self.config.arrival_radius_m {
            if self.index < self.route.last_index() {
                self.index += 1;
                info!(
                    "Reached waypoint {}, heading to {} of {}",
                    self.index - 1,
                    self.index,
                    self.route.last_index()
                );
                target = self.route[self.index];
                distance = geodesy::haversine_distance_m(position, target);
            } else {
                info!("Reached destination {}", target);
                self.complete = true;
                return Guidance::Arrived { index: self.index };
            }
        }

        let bearing = geodesy::bearing(position, target);
        let heading = if heading.is_finite() { heading } else { 0.0 };
        let draw_angle = geodesy::normalize_degrees(bearing - heading);

        let smoothing = self.config.smoothing;
        self.smoothed_scale =
            smoothing * self.smoothed_scale + (1.0 - smoothing) * self.target_scale(distance);

        debug!(
            "target={} dist={:.1}m bearing={:.1} heading={:.1} draw={:.1} scale={:.3}",
            self.index, distance, bearing, heading, draw_angle, self.smoothed_scale
        );

        Guidance::Heading {
            target_index: self.index,
            bearing_deg: bearing,
            distance_m: distance,
            draw_angle_deg: draw_angle,
            scale: self.smoothed_scale,
        }
    }
}
