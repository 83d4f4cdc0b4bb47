//! Takeoff and landing detection.
//!
//! The aircraft is "moving" while its speed exceeds the takeoff speed.
//! Movement has to persist before a takeoff is declared and standstill has
//! to persist before a landing is declared, so a gust or a taxi run does
//! not toggle the flight state.
//!
//! ```text
//!            moving ≥ 10 s
//!   ┌────────┐ ─────────────► ┌────────┐
//!   │ GROUND │                │ FLYING │
//!   └────────┘ ◄───────────── └────────┘
//!            stationary ≥ 30 s
//! ```

use tracing::info;

use crate::geo::GeoPoint;
use crate::sample::RawSample;
use crate::state::FlightState;
use crate::time::{DeltaTime, TimeStep};

/// Seconds of continuous movement before takeoff is declared.
pub const TAKEOFF_DELAY: f64 = 10.0;

/// Seconds of standstill before landing is declared.
pub const LANDING_DELAY: f64 = 30.0;

/// Detects takeoff and landing from speed.
#[derive(Debug, Clone, Default)]
pub struct FlyingComputer {
    delta: DeltaTime,
    moving_since: Option<f64>,
    stationary_since: Option<f64>,
    takeoff_candidate: Option<(f64, Option<GeoPoint>, Option<f64>)>,
}

impl FlyingComputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Updates `flight` from this tick's normalized sample.
    ///
    /// `nav_altitude` is recorded as takeoff altitude.
    pub fn update(
        &mut self,
        basic: &RawSample,
        nav_altitude: Option<f64>,
        takeoff_speed: f64,
        flight: &mut FlightState,
    ) {
        let Some(time) = basic.time() else {
            return;
        };

        match self.delta.update(time, 0.0, 0.0) {
            TimeStep::Warped => {
                self.reset();
                self.delta.update(time, 0.0, 0.0);
                *flight = FlightState::default();
            }
            TimeStep::Elapsed(dt) if flight.flying => flight.flight_time += dt,
            _ => {}
        }

        let speed = basic
            .real_true_airspeed()
            .or_else(|| basic.ground_speed.get())
            .unwrap_or(0.0);

        if speed > takeoff_speed {
            self.moving(time, basic, nav_altitude, flight);
        } else {
            self.stationary(time, flight);
        }
    }

    fn moving(
        &mut self,
        time: f64,
        basic: &RawSample,
        nav_altitude: Option<f64>,
        flight: &mut FlightState,
    ) {
        self.stationary_since = None;
        if flight.flying {
            return;
        }

        let since = *self.moving_since.get_or_insert(time);
        let candidate = *self
            .takeoff_candidate
            .get_or_insert((time, basic.location.get(), nav_altitude));

        if time - since >= TAKEOFF_DELAY {
            let (takeoff_time, location, altitude) = candidate;
            flight.flying = true;
            flight.takeoff_time = Some(takeoff_time);
            flight.takeoff_location = location;
            flight.takeoff_altitude = altitude;
            flight.landing_time = None;
            flight.flight_time = time - takeoff_time;
            self.takeoff_candidate = None;
            info!(
                time = takeoff_time,
                altitude = ?altitude,
                "Takeoff detected"
            );
        }
    }

    fn stationary(&mut self, time: f64, flight: &mut FlightState) {
        self.moving_since = None;
        self.takeoff_candidate = None;
        if !flight.flying {
            return;
        }

        let since = *self.stationary_since.get_or_insert(time);
        if time - since >= LANDING_DELAY {
            flight.flying = false;
            flight.landing_time = Some(since);
            self.stationary_since = None;
            info!(
                time = since,
                flight_time = flight.flight_time,
                "Landing detected"
            );
        }
    }
}
