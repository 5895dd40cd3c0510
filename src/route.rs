//! Walking routes. A [`Route`] is the ordered waypoint sequence handed to a
//! navigation session; it is never empty and never changes once built.
//!
//! Routes come from an external routing service and reach us as small RON
//! files:
//!
//! ```text
//! (name:Some("Library"),waypoints:[(13.6217,123.1948),(13.622,123.195)])
//! ```

use crate::geodesy::{self, LatLon, Meters};
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{Read, Write},
    ops::Index,
    path::Path,
};

/// A non-empty, read-only sequence of waypoints in walking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteFile", into = "RouteFile")]
pub struct Route {
    name: Option<String>,
    waypoints: Vec<LatLon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteFile {
    #[serde(default)]
    name: Option<String>,
    waypoints: Vec<LatLon>,
}

/// Things that can go wrong while building, reading or writing a [`Route`].
#[derive(Debug)]
pub enum RouteError {
    /// A route needs at least one waypoint.
    Empty,

    /// A waypoint has a non-finite or out of range coordinate.
    InvalidWaypoint(usize, LatLon),

    /// Returned when io fails when reading or writing files.
    IoError(std::io::Error),

    /// Returned when serialization fails.
    RonError(ron::Error),

    /// Returned when deserialization fails.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            RouteError::Empty => Cow::from("route has no waypoints"),
            RouteError::InvalidWaypoint(i, p) => Cow::from(format!("waypoint {i} is invalid: {p}")),
            RouteError::IoError(error) => Cow::from(format!("io error: {}", error)),
            RouteError::RonError(error) => Cow::from(format!("ron error: {}", error)),
            RouteError::RonSpannedError(error) => Cow::from(format!("ron parse error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for RouteError {}

impl TryFrom<RouteFile> for Route {
    type Error = RouteError;

    fn try_from(file: RouteFile) -> Result<Self, Self::Error> {
        let mut route = Route::new(file.waypoints)?;
        route.name = file.name;
        Ok(route)
    }
}

impl From<Route> for RouteFile {
    fn from(route: Route) -> Self {
        RouteFile {
            name: route.name,
            waypoints: route.waypoints,
        }
    }
}

impl Route {
    /// Builds a route, rejecting an empty sequence or impossible coordinates.
    pub fn new(waypoints: Vec<LatLon>) -> Result<Self, RouteError> {
        if waypoints.is_empty() {
            return Err(RouteError::Empty);
        }
        if let Some((i, p)) = waypoints.iter().enumerate().find(|(_, p)| {
            !(p.lat.is_finite() && p.lon.is_finite() && p.lat.abs() <= 90.0 && p.lon.abs() <= 180.0)
        }) {
            return Err(RouteError::InvalidWaypoint(i, *p));
        }

        Ok(Self {
            name: None,
            waypoints,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn waypoints(&self) -> &[LatLon] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always false; kept so the type reads like the collection it is.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> LatLon {
        self.waypoints[0]
    }

    pub fn last(&self) -> LatLon {
        self.waypoints[self.waypoints.len() - 1]
    }

    pub fn last_index(&self) -> usize {
        self.waypoints.len() - 1
    }

    /// Total walking distance in meters.
    pub fn length_m(&self) -> Meters {
        geodesy::route_length_m(&self.waypoints)
    }

    /// Distance from the start to each waypoint, in meters.
    pub fn cumulative_m(&self) -> Vec<Meters> {
        geodesy::cumulative_distances_m(&self.waypoints)
    }

    /// Appends `destination` unless the route already ends within
    /// `tolerance_m` of it.
    pub fn ending_at(mut self, destination: LatLon, tolerance_m: Meters) -> Self {
        if geodesy::haversine_distance_m(self.last(), destination) > tolerance_m {
            self.waypoints.push(destination);
        }
        self
    }

    /// Ramer-Douglas-Peucker simplification. The first and last waypoints
    /// are always kept.
    ///
    /// `tolerance_m` is the largest perpendicular deviation, in meters, a
    /// dropped waypoint may have from the simplified line.
    /// A negative or NaN tolerance is treated as zero.
    pub fn simplify(&self, tolerance_m: Meters) -> Route {
        let tolerance_m = if tolerance_m > 0.0 { tolerance_m } else { 0.0 };
        Route {
            name: self.name.clone(),
            waypoints: rdp_simplify(&self.waypoints, tolerance_m),
        }
    }

    /// Read a [`Route`] from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RouteError> {
        let mut handle = File::open(path).map_err(RouteError::IoError)?;
        Self::from_file(&mut handle)
    }

    /// Read a [`Route`] from any [`Read`]able object.
    pub fn from_file(file: &mut impl Read) -> Result<Self, RouteError> {
        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(RouteError::IoError)?;
        Self::from_ron(&buf)
    }

    pub fn from_ron(s: &str) -> Result<Self, RouteError> {
        let file: RouteFile = ron::from_str(s).map_err(RouteError::RonSpannedError)?;
        Route::try_from(file)
    }

    /// Write out a [`Route`] to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), RouteError> {
        let mut handle = File::create(path).map_err(RouteError::IoError)?;
        self.to_file(&mut handle)
    }

    /// Write out a [`Route`] to the [`Write`]able object provided.
    pub fn to_file(&self, file: &mut impl Write) -> Result<(), RouteError> {
        let s = ron::ser::to_string(self).map_err(RouteError::RonError)?;
        file.write_all(s.as_bytes()).map_err(RouteError::IoError)
    }
}

impl Index<usize> for Route {
    type Output = LatLon;

    fn index(&self, index: usize) -> &Self::Output {
        &self.waypoints[index]
    }
}

fn rdp_simplify(points: &[LatLon], tolerance_m: Meters) -> Vec<LatLon> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let (max_idx, max_dist) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &p)| (i + 1, perpendicular_distance_m(p, first, last)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    // max_idx == 0 means every inner point sits on the chord
    if max_idx > 0 && max_dist > tolerance_m {
        let mut left = rdp_simplify(&points[..=max_idx], tolerance_m);
        let right = rdp_simplify(&points[max_idx..], tolerance_m);

        // junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Distance from `p` to the segment `a`-`b` on a local plane scaled by the
/// cosine of the mean latitude. Good for the short hops of a walking route.
fn perpendicular_distance_m(p: LatLon, a: LatLon, b: LatLon) -> Meters {
    let meters_per_deg = geodesy::EARTH_RADIUS_M.to_radians();
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();

    let to_xy = |q: LatLon| {
        (
            (q.lon - a.lon) * cos_lat * meters_per_deg,
            (q.lat - a.lat) * meters_per_deg,
        )
    };
    let (bx, by) = to_xy(b);
    let (px, py) = to_xy(p);

    let seg_len_sq = bx * bx + by * by;
    if seg_len_sq < 1e-12 {
        return (px * px + py * py).sqrt();
    }

    let t = ((px * bx + py * by) / seg_len_sq).clamp(0.0, 1.0);
    let (dx, dy) = (px - t * bx, py - t * by);
    (dx * dx + dy * dy).sqrt()
}
