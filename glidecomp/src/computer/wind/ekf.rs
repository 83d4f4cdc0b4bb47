//! Wind from airspeed and GPS velocity during straight flight.
//!
//! An extended Kalman filter with state `[wx, wy, k]` tracks the wind-from
//! vector and an airspeed calibration factor. Each measurement is the
//! squared true airspeed:
//!
//! ```text
//! air = ground + wind
//! z   = k * |air|²
//! ```
//!
//! Heading changes during straight flight make the wind observable; the
//! filter needs no circling.

use tracing::{debug, trace};

use super::WindEstimate;
use crate::freshness::Freshness;
use crate::sample::RawSample;
use crate::state::DerivedState;
use crate::units::SpeedVector;

/// Process noise per update.
const PROCESS_NOISE: [f64; 3] = [1.0e-4, 1.0e-4, 1.0e-8];

/// Measurement noise of TAS², (m/s)⁴.
const MEASUREMENT_NOISE: f64 = 625.0;

/// Initial state covariance.
const INITIAL_COVARIANCE: [f64; 3] = [10.0, 10.0, 1.0e-5];

/// The filter state.
#[derive(Debug, Clone, PartialEq)]
pub struct WindEkf {
    x: [f64; 3],
    p: [[f64; 3]; 3],
}

impl Default for WindEkf {
    fn default() -> Self {
        let mut p = [[0.0; 3]; 3];
        for (i, row) in p.iter_mut().enumerate() {
            row[i] = INITIAL_COVARIANCE[i];
        }
        Self { x: [0.0, 0.0, 1.0], p }
    }
}

impl WindEkf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current wind-from estimate.
    pub fn wind(&self) -> SpeedVector {
        SpeedVector::from_xy(self.x[0], self.x[1])
    }

    /// Airspeed calibration factor (TAS² scale).
    pub fn scale(&self) -> f64 {
        self.x[2]
    }

    /// One predict/update step with the measured true airspeed and the
    /// GPS velocity as (east, north).
    pub fn update(&mut self, true_airspeed: f64, ground: (f64, f64)) {
        for (i, q) in PROCESS_NOISE.iter().enumerate() {
            self.p[i][i] += q;
        }

        let [wx, wy, k] = self.x;
        let ax = ground.0 + wx;
        let ay = ground.1 + wy;
        let magnitude = ax * ax + ay * ay;

        let h = [2.0 * k * ax, 2.0 * k * ay, magnitude];
        let ph: [f64; 3] = std::array::from_fn(|i| (0..3).map(|j| self.p[i][j] * h[j]).sum());
        let s: f64 = (0..3).map(|i| h[i] * ph[i]).sum::<f64>() + MEASUREMENT_NOISE;
        if s <= 0.0 || !s.is_finite() {
            return;
        }

        let gain: [f64; 3] = std::array::from_fn(|i| ph[i] / s);
        let innovation = true_airspeed * true_airspeed - k * magnitude;

        for i in 0..3 {
            self.x[i] += gain[i] * innovation;
        }
        for i in 0..3 {
            for j in 0..3 {
                self.p[i][j] -= gain[i] * ph[j];
            }
        }
    }
}

/// Turn rates above this (deg/s) interrupt the filter.
const MAX_TURN_RATE: f64 = 20.0;

/// Minimum ground speed for a usable GPS velocity (m/s).
const MIN_GROUND_SPEED: f64 = 2.5;

/// Maximum load factor deviation from 1 g.
const MAX_LOAD_DEVIATION: f64 = 0.3;

/// Seconds the filter ignores samples after a manoeuvre.
const BLACKOUT: f64 = 3.0;

/// A result is emitted every this many accepted samples.
const EMIT_INTERVAL: u32 = 10;

/// Gates samples into [`WindEkf`] and grades its output.
#[derive(Debug, Clone, Default)]
pub struct EkfWind {
    ekf: WindEkf,
    samples: u32,
    blackout_until: Option<f64>,
    last_time: Option<f64>,
    last_ground_speed: Freshness,
}

impl EkfWind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn filter(&self) -> &WindEkf {
        &self.ekf
    }

    /// Feeds one tick; returns an estimate every [`EMIT_INTERVAL`] accepted
    /// samples once the filter has settled.
    pub fn update(
        &mut self,
        basic: &RawSample,
        derived: &DerivedState,
        takeoff_speed: f64,
    ) -> Option<WindEstimate> {
        if !derived.flight.flying {
            if self.samples > 0 {
                self.reset();
            }
            return None;
        }

        let time = basic.time()?;
        if self.last_time.is_some_and(|last| time < last) {
            debug!(time, "Time warp, restarting wind filter");
            self.reset();
        }
        self.last_time = Some(time);

        let tas = basic.real_true_airspeed().filter(|tas| *tas > takeoff_speed)?;
        let (Some(track), Some(ground_speed)) = (basic.track.get(), basic.ground_speed.get()) else {
            return None;
        };
        if !basic.ground_speed.freshness().modified(self.last_ground_speed) {
            return None;
        }
        self.last_ground_speed = basic.ground_speed.freshness();

        let turning = derived.circling.turn_rate.abs() > MAX_TURN_RATE;
        let loaded = (derived.dynamics.g_load - 1.0).abs() > MAX_LOAD_DEVIATION;
        if turning || loaded || derived.circling.circling {
            trace!(time, turning, loaded, "Manoeuvring, wind filter blacked out");
            self.blackout_until = Some(time + BLACKOUT);
            return None;
        }
        if ground_speed < MIN_GROUND_SPEED {
            return None;
        }
        if self.blackout_until.is_some_and(|until| time < until) {
            return None;
        }

        self.ekf.update(tas, SpeedVector::new(track, ground_speed).to_xy());
        self.samples += 1;

        if self.samples % EMIT_INTERVAL != 0 {
            return None;
        }
        let quality = match self.samples {
            0..=9 => 0,
            10..=119 => 1,
            120..=599 => 2,
            _ => 3,
        };
        if quality == 0 {
            return None;
        }

        let wind = self.ekf.wind();
        trace!(
            bearing = wind.bearing,
            speed = wind.norm,
            quality,
            samples = self.samples,
            "Filter wind"
        );
        Some(WindEstimate { wind, quality })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Airspeed;
    use crate::units::angle_delta;
    use std::f64::consts::PI;

    // ─────────────────────────────────────────────────────────────────────────
    // Test Helpers
    // ─────────────────────────────────────────────────────────────────────────

    const TAS: f64 = 25.0;

    /// Straight flight weaving ±30° about 10°, wind `speed` from `bearing`.
    fn weave_sample(t: u32, bearing: f64, speed: f64) -> RawSample {
        let time = t as f64;
        let heading = 30.0 * (2.0 * PI * time / 40.0).sin() + 10.0;
        let air = SpeedVector::new(heading, TAS).to_xy();
        let wind = SpeedVector::new(bearing, speed).to_xy();
        let ground = SpeedVector::from_xy(air.0 - wind.0, air.1 - wind.1);

        let mut basic = RawSample::at(time);
        basic.track.set(ground.bearing, basic.clock);
        basic.ground_speed.set(ground.norm, basic.clock);
        basic.set_measured_airspeed(Airspeed::new(TAS, TAS), basic.clock);
        basic
    }

    fn flying() -> DerivedState {
        let mut derived = DerivedState::new();
        derived.flight.flying = true;
        derived
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Filter
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_filter_converges() {
        for (bearing, speed) in [(270.0, 8.0), (45.0, 5.0), (180.0, 12.0)] {
            let mut ekf = WindEkf::new();
            for t in 0..300 {
                let basic = weave_sample(t, bearing, speed);
                let ground = SpeedVector::new(
                    basic.track.get().unwrap(),
                    basic.ground_speed.get().unwrap(),
                );
                ekf.update(TAS, ground.to_xy());
            }
            let wind = ekf.wind();
            assert!(angle_delta(wind.bearing - bearing).abs() < 3.0, "bearing {}", wind.bearing);
            assert!((wind.norm - speed).abs() < speed * 0.1, "speed {}", wind.norm);
            assert!((ekf.scale() - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_filter_still_without_wind() {
        let mut ekf = WindEkf::new();
        for t in 0..100 {
            let basic = weave_sample(t, 0.0, 0.0);
            let ground = SpeedVector::new(basic.track.get().unwrap(), basic.ground_speed.get().unwrap());
            ekf.update(TAS, ground.to_xy());
        }
        assert!(ekf.wind().norm < 0.1);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gating
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_emits_graded_estimates() {
        let mut glue = EkfWind::new();
        let derived = flying();
        let estimates: Vec<(u32, WindEstimate)> = (0..300)
            .filter_map(|t| glue.update(&weave_sample(t, 270.0, 8.0), &derived, 10.0).map(|e| (t, e)))
            .collect();

        assert_eq!(estimates.len(), 30);
        assert_eq!(estimates[0].0, 9);
        assert_eq!(estimates[0].1.quality, 1);

        let (_, last) = estimates[estimates.len() - 1];
        assert_eq!(last.quality, 2);
        assert!(angle_delta(last.wind.bearing - 270.0).abs() < 3.0);
        assert!((last.wind.norm - 8.0).abs() < 0.8);
    }

    #[test]
    fn test_not_flying() {
        let mut glue = EkfWind::new();
        let derived = DerivedState::new();
        for t in 0..50 {
            assert_eq!(glue.update(&weave_sample(t, 270.0, 8.0), &derived, 10.0), None);
        }
        assert_eq!(glue.samples, 0);
    }

    #[test]
    fn test_requires_measured_airspeed() {
        let mut glue = EkfWind::new();
        let derived = flying();
        for t in 0..50 {
            let mut basic = weave_sample(t, 270.0, 8.0);
            basic.airspeed_real = false;
            glue.update(&basic, &derived, 10.0);
        }
        assert_eq!(glue.samples, 0);
    }

    #[test]
    fn test_circling_blacks_out() {
        let mut glue = EkfWind::new();
        let mut derived = flying();
        for t in 0..5 {
            glue.update(&weave_sample(t, 270.0, 8.0), &derived, 10.0);
        }
        assert_eq!(glue.samples, 5);

        derived.circling.circling = true;
        glue.update(&weave_sample(5, 270.0, 8.0), &derived, 10.0);
        derived.circling.circling = false;

        // Blacked out until 8 s.
        for t in 6..8 {
            glue.update(&weave_sample(t, 270.0, 8.0), &derived, 10.0);
        }
        assert_eq!(glue.samples, 5);
        glue.update(&weave_sample(8, 270.0, 8.0), &derived, 10.0);
        assert_eq!(glue.samples, 6);
    }

    #[test]
    fn test_high_load_blacks_out() {
        let mut glue = EkfWind::new();
        let mut derived = flying();
        derived.dynamics.g_load = 1.5;
        glue.update(&weave_sample(0, 270.0, 8.0), &derived, 10.0);
        derived.dynamics.g_load = 1.0;
        glue.update(&weave_sample(1, 270.0, 8.0), &derived, 10.0);
        assert_eq!(glue.samples, 0);
        glue.update(&weave_sample(3, 270.0, 8.0), &derived, 10.0);
        assert_eq!(glue.samples, 1);
    }

    #[test]
    fn test_time_warp_restarts() {
        let mut glue = EkfWind::new();
        let derived = flying();
        for t in 100..120 {
            glue.update(&weave_sample(t, 270.0, 8.0), &derived, 10.0);
        }
        assert_eq!(glue.samples, 20);
        glue.update(&weave_sample(10, 270.0, 8.0), &derived, 10.0);
        assert_eq!(glue.samples, 1);
    }

    #[test]
    fn test_repeated_fix_ignored() {
        let mut glue = EkfWind::new();
        let derived = flying();
        let basic = weave_sample(0, 270.0, 8.0);
        glue.update(&basic, &derived, 10.0);
        glue.update(&basic, &derived, 10.0);
        assert_eq!(glue.samples, 1);
    }
}
