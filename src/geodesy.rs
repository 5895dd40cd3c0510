//! Great-circle helpers on a spherical Earth. Every coordinate is WGS84
//! latitude/longitude in degrees and every angle returned is in degrees,
//! with 0 pointing north and 90 pointing east.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Mean Earth radius used by [`haversine_distance_m`], in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub type Degrees = f64;
pub type Meters = f64;

/// A single point on the Earth's surface. Serialized as a plain
/// `(lat, lon)` tuple so route files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct LatLon {
    pub lat: Degrees,
    pub lon: Degrees,
}

impl LatLon {
    pub const fn new(lat: Degrees, lon: Degrees) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<LatLon> for (f64, f64) {
    fn from(p: LatLon) -> Self {
        (p.lat, p.lon)
    }
}

impl Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Wraps any finite angle into `[0, 360)`.
pub fn normalize_degrees(angle: Degrees) -> Degrees {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)`.
///
/// Coincident points give `atan2(0, 0) == 0`, so the result is always
/// well defined.
pub fn bearing(from: LatLon, to: LatLon) -> Degrees {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Great-circle distance between two points using the haversine formula.
pub fn haversine_distance_m(from: LatLon, to: LatLon) -> Meters {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // floating point overshoot near antipodes would push asin out of domain
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Total length of a polyline in meters. Zero for fewer than two points.
pub fn route_length_m(points: &[LatLon]) -> Meters {
    points
        .windows(2)
        .map(|w| haversine_distance_m(w[0], w[1]))
        .sum()
}

/// Distance along the polyline from its first point to every point.
///
/// The result has one entry per input point and starts at `0.0`.
pub fn cumulative_distances_m(points: &[LatLon]) -> Vec<Meters> {
    let mut total = 0.0;
    points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if i > 0 {
                total += haversine_distance_m(points[i - 1], p);
            }
            total
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> LatLon {
        LatLon::new(lat, lon)
    }

    fn angle_diff(a: f64, b: f64) -> f64 {
        let d = normalize_degrees(a - b);
        d.min(360.0 - d)
    }

    #[test]
    fn coincident_points() {
        let p = pt(13.6217, 123.1948);
        assert_eq!(haversine_distance_m(p, p), 0.0);
        let b = bearing(p, p);
        assert!(b.is_finite());
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn bearing_due_east_and_north() {
        assert!((bearing(pt(0.0, 0.0), pt(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!(bearing(pt(0.0, 0.0), pt(1.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn bearing_west_is_in_range() {
        let b = bearing(pt(0.0, 0.0), pt(0.0, -1.0));
        assert!((b - 270.0).abs() < 1e-9, "got {b}");
    }

    #[test]
    fn bearing_invariant_under_longitude_shift() {
        let a = pt(13.6217, 123.1948);
        let b = pt(13.6220, 123.1950);
        let base = bearing(a, b);
        for shift in [-170.0, -45.5, 0.25, 30.0, 56.0] {
            let a2 = pt(a.lat, a.lon + shift);
            let b2 = pt(b.lat, b.lon + shift);
            assert!(angle_diff(bearing(a2, b2), base) < 1e-6);
        }
    }

    #[test]
    fn reverse_bearing_differs_by_half_turn() {
        // short hops so the great-circle convergence is negligible
        let pairs = [
            (pt(13.6217, 123.1948), pt(13.6220, 123.1950)),
            (pt(-33.86, 151.2), pt(-33.861, 151.201)),
            (pt(48.2082, 16.3738), pt(48.2082, 16.3748)),
        ];
        for (a, b) in pairs {
            let forward = bearing(a, b);
            let back = bearing(b, a);
            assert!(
                angle_diff(forward + 180.0, back) < 0.01,
                "{forward} vs {back}"
            );
        }
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_distance_m(pt(0.0, 0.0), pt(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 1_111.95, "got {d}");
    }

    #[test]
    fn antipodal_points_do_not_nan() {
        let d = haversine_distance_m(pt(0.0, 0.0), pt(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn normalize_handles_negatives() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(359.5), 359.5);
        assert!(normalize_degrees(-1e-20) < 360.0);
    }

    #[test]
    fn route_length_and_cumulative() {
        let track = vec![pt(0.0, 0.0), pt(0.0, 1.0), pt(0.0, 2.0)];
        let len = route_length_m(&track);
        assert!(len > 200_000.0 && len < 230_000.0, "got {len}");

        let cum = cumulative_distances_m(&track);
        assert_eq!(cum.len(), 3);
        assert_eq!(cum[0], 0.0);
        assert!((cum[2] - len).abs() < 1e-6);

        assert_eq!(route_length_m(&track[..1]), 0.0);
        assert_eq!(cumulative_distances_m(&track[..1]), vec![0.0]);
        assert!(cumulative_distances_m(&[]).is_empty());
    }
}
