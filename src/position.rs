//! Where the user is and which way the device faces.
//!
//! The navigation loop only sees the [`PositionSource`] trait. Whatever owns
//! the real sensors (a GPS receiver, a phone's location service, a test)
//! provides an implementation.

use crate::geodesy::{self, Degrees, LatLon, Meters};
use crate::route::Route;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};

/// Live position and heading, polled once per frame. Both calls must
/// return quickly.
pub trait PositionSource: Send {
    /// The latest fix, or `None` when there is none.
    fn current_position(&self) -> Option<LatLon>;

    /// Device heading in `[0, 360)`; `0.0` when unknown.
    fn current_heading(&self) -> Degrees;
}

impl<P: PositionSource + Sync + ?Sized> PositionSource for Arc<P> {
    fn current_position(&self) -> Option<LatLon> {
        (**self).current_position()
    }

    fn current_heading(&self) -> Degrees {
        (**self).current_heading()
    }
}

/// Always reports the same place and heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPosition {
    pub position: Option<LatLon>,
    pub heading: Degrees,
}

impl FixedPosition {
    pub fn new(position: LatLon, heading: Degrees) -> Self {
        Self {
            position: Some(position),
            heading,
        }
    }

    pub fn no_fix() -> Self {
        Self {
            position: None,
            heading: 0.0,
        }
    }
}

impl PositionSource for FixedPosition {
    fn current_position(&self) -> Option<LatLon> {
        self.position
    }

    fn current_heading(&self) -> Degrees {
        sanitize_heading(self.heading)
    }
}

#[derive(Debug, Default)]
struct Shared {
    position: Option<LatLon>,
    heading: Option<Degrees>,
}

/// A thread-safe slot that one side writes sensor readings into and the
/// navigation loop reads from. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SharedPosition {
    inner: Arc<Mutex<Shared>>,
}

impl SharedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // a panicked writer cannot leave a half-written Copy value behind
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_position(&self, position: LatLon) {
        self.lock().position = Some(position);
    }

    /// Forget the last fix, e.g. when the receiver reports it lost lock.
    pub fn clear_position(&self) {
        self.lock().position = None;
    }

    pub fn set_heading(&self, heading: Degrees) {
        if heading.is_finite() {
            self.lock().heading = Some(geodesy::normalize_degrees(heading));
        }
    }
}

impl PositionSource for SharedPosition {
    fn current_position(&self) -> Option<LatLon> {
        self.lock().position
    }

    fn current_heading(&self) -> Degrees {
        self.lock().heading.unwrap_or(0.0)
    }
}

fn sanitize_heading(heading: Degrees) -> Degrees {
    if heading.is_finite() {
        geodesy::normalize_degrees(heading)
    } else {
        0.0
    }
}

struct Walk {
    position: LatLon,
    /// Index of the waypoint the walker is currently heading to.
    next: usize,
    heading: Degrees,
    polls: u64,
    rng: StdRng,
}

/// A pretend user walking the route at a steady pace, one step per
/// position poll, with optional GPS jitter and periodic signal loss.
pub struct SimulatedWalker {
    route: Arc<Route>,
    step_m: Meters,
    jitter_m: Meters,
    heading_jitter_deg: Degrees,
    signal_loss_every: Option<u64>,
    walk: Mutex<Walk>,
}

/// Builds a [`SimulatedWalker`].
pub struct SimulatedWalkerBuilder {
    route: Arc<Route>,
    step_m: Meters,
    jitter_m: Meters,
    heading_jitter_deg: Degrees,
    signal_loss_every: Option<u64>,
    seed: u64,
}

impl SimulatedWalkerBuilder {
    /// Meters walked per poll.
    pub fn step(mut self, step_m: Meters) -> Self {
        self.step_m = step_m.max(0.0);
        self
    }

    /// Uniform noise, in meters, added to each reported position.
    pub fn jitter(mut self, jitter_m: Meters) -> Self {
        self.jitter_m = jitter_m.max(0.0);
        self
    }

    pub fn heading_jitter(mut self, degrees: Degrees) -> Self {
        self.heading_jitter_deg = degrees.max(0.0);
        self
    }

    /// Report no fix on every `n`th poll.
    pub fn signal_loss_every(mut self, n: u64) -> Self {
        self.signal_loss_every = (n > 0).then_some(n);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> SimulatedWalker {
        let start = self.route.first();
        let next = usize::from(self.route.len() > 1);
        let heading = geodesy::bearing(start, self.route[next]);
        SimulatedWalker {
            step_m: self.step_m,
            jitter_m: self.jitter_m,
            heading_jitter_deg: self.heading_jitter_deg,
            signal_loss_every: self.signal_loss_every,
            walk: Mutex::new(Walk {
                position: start,
                next,
                heading,
                polls: 0,
                rng: StdRng::seed_from_u64(self.seed),
            }),
            route: self.route,
        }
    }
}

impl SimulatedWalker {
    pub fn builder(route: Arc<Route>) -> SimulatedWalkerBuilder {
        SimulatedWalkerBuilder {
            route,
            step_m: 1.4,
            jitter_m: 0.0,
            heading_jitter_deg: 0.0,
            signal_loss_every: None,
            seed: 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Walk> {
        self.walk.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The walker's true position, without jitter.
    pub fn true_position(&self) -> LatLon {
        self.lock().position
    }
}

/// Moves `walk` `remaining` meters along the route.
fn advance(route: &Route, walk: &mut Walk, mut remaining: Meters) {
    while remaining > 0.0 && walk.next < route.len() {
        let target = route[walk.next];
        let d = geodesy::haversine_distance_m(walk.position, target);
        if d <= remaining {
            walk.position = target;
            remaining -= d;
            if walk.next == route.last_index() {
                break;
            }
            walk.next += 1;
        } else {
            let f = remaining / d;
            walk.position = LatLon::new(
                walk.position.lat + (target.lat - walk.position.lat) * f,
                walk.position.lon + (target.lon - walk.position.lon) * f,
            );
            remaining = 0.0;
        }
        if walk.position != route[walk.next] {
            walk.heading = geodesy::bearing(walk.position, route[walk.next]);
        }
    }
}

fn offset_m(p: LatLon, north_m: Meters, east_m: Meters) -> LatLon {
    let meters_per_deg = geodesy::EARTH_RADIUS_M.to_radians();
    let cos_lat = p.lat.to_radians().cos().max(1e-6);
    LatLon::new(
        p.lat + north_m / meters_per_deg,
        p.lon + east_m / (meters_per_deg * cos_lat),
    )
}

impl PositionSource for SimulatedWalker {
    fn current_position(&self) -> Option<LatLon> {
        let mut walk = self.lock();
        walk.polls += 1;
        advance(&self.route, &mut walk, self.step_m);

        if let Some(n) = self.signal_loss_every {
            if walk.polls % n == 0 {
                return None;
            }
        }

        let position = walk.position;
        if self.jitter_m > 0.0 {
            let j = self.jitter_m;
            let north = walk.rng.gen_range(-j..j);
            let east = walk.rng.gen_range(-j..j);
            Some(offset_m(position, north, east))
        } else {
            Some(position)
        }
    }

    fn current_heading(&self) -> Degrees {
        let mut walk = self.lock();
        let heading = walk.heading;
        if self.heading_jitter_deg > 0.0 {
            let j = self.heading_jitter_deg;
            let noise = walk.rng.gen_range(-j..j);
            geodesy::normalize_degrees(heading + noise)
        } else {
            heading
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn route() -> Arc<Route> {
        Arc::new(
            Route::new(vec![
                LatLon::new(13.6217, 123.1948),
                LatLon::new(13.6220, 123.1950),
                LatLon::new(13.6225, 123.1950),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn fixed_position_normalizes_heading() {
        let p = FixedPosition::new(LatLon::new(1.0, 2.0), -90.0);
        assert_eq!(p.current_heading(), 270.0);
        assert_eq!(FixedPosition::no_fix().current_position(), None);
        let p = FixedPosition {
            position: None,
            heading: f64::NAN,
        };
        assert_eq!(p.current_heading(), 0.0);
    }

    #[test]
    fn shared_position_crosses_threads() {
        let shared = SharedPosition::new();
        assert_eq!(shared.current_position(), None);
        assert_eq!(shared.current_heading(), 0.0);

        let writer = shared.clone();
        thread::spawn(move || {
            writer.set_position(LatLon::new(13.6, 123.2));
            writer.set_heading(370.0);
        })
        .join()
        .unwrap();

        assert_eq!(shared.current_position(), Some(LatLon::new(13.6, 123.2)));
        assert!((shared.current_heading() - 10.0).abs() < 1e-9);

        shared.clear_position();
        assert_eq!(shared.current_position(), None);
    }

    #[test]
    fn walker_reaches_the_end_and_stays() {
        let route = route();
        let walker = SimulatedWalker::builder(route.clone()).step(10.0).build();
        let total = route.length_m();
        let polls = (total / 10.0).ceil() as usize + 3;
        let mut last = None;
        for _ in 0..polls {
            last = walker.current_position();
        }
        assert_eq!(last, Some(route.last()));
        assert_eq!(walker.current_position(), Some(route.last()));
    }

    #[test]
    fn walker_heads_toward_next_waypoint() {
        let route = route();
        let walker = SimulatedWalker::builder(route.clone()).step(1.0).build();
        let p = walker.current_position().unwrap();
        let expected = geodesy::bearing(p, route[1]);
        assert!((walker.current_heading() - expected).abs() < 1e-6);
        let moved = geodesy::haversine_distance_m(route.first(), p);
        assert!((moved - 1.0).abs() < 0.01, "{moved}");
    }

    #[test]
    fn walker_jitter_and_dropouts() {
        let walker = SimulatedWalker::builder(route())
            .step(0.0)
            .jitter(3.0)
            .signal_loss_every(4)
            .seed(7)
            .build();
        let start = walker.true_position();
        let samples: Vec<Option<LatLon>> = (0..8).map(|_| walker.current_position()).collect();
        assert_eq!(samples[3], None);
        assert_eq!(samples[7], None);
        for p in samples.iter().flatten() {
            let d = geodesy::haversine_distance_m(start, *p);
            assert!(d < 3.0 * 2f64.sqrt() + 0.01, "{d}");
        }
    }
}
