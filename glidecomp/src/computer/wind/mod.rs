//! Wind estimation and selection.
//!
//! Two independent estimators feed a quality-weighted [`WindStore`]:
//!
//! - [`CirclingWind`] fits a cosine to the ground speed variation over
//!   one full circle.
//! - [`EkfWind`] runs an extended Kalman filter on airspeed and GPS
//!   velocity during straight flight.
//!
//! The store's weighted mean becomes the estimated ("auto") wind.
//! [`select_wind`] then picks the effective wind from auto, external and
//! manual sources.

mod circling;
mod ekf;
mod store;

pub use circling::CirclingWind;
pub use ekf::{EkfWind, WindEkf};
pub use store::{WindMeasurement, WindMeasurementList, WindRecalculation, WindStore, MAX_MEASUREMENTS};

use std::time::Duration;

use tracing::debug;

use crate::config::{ComputerSettings, WindSettings};
use crate::freshness::Stamped;
use crate::sample::RawSample;
use crate::state::{DerivedState, WindSource};
use crate::units::SpeedVector;

/// Best quality an estimator can report.
pub const MAX_QUALITY: u32 = 5;

/// The estimated wind expires when not refreshed for this long.
pub const MAX_ESTIMATE_AGE: Duration = Duration::from_secs(3600);

/// One estimator result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindEstimate {
    /// Direction the wind blows from, and its speed.
    pub wind: SpeedVector,
    /// 1 (poor) to [`MAX_QUALITY`].
    pub quality: u32,
}

/// Runs both estimators and maintains the estimated wind.
#[derive(Debug, Clone, Default)]
pub struct WindComputer {
    circling: CirclingWind,
    ekf: EkfWind,
    store: WindStore,
}

impl WindComputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.circling.reset();
        self.ekf.reset();
        self.store.reset();
    }

    pub fn store(&self) -> &WindStore {
        &self.store
    }

    pub fn filter(&self) -> &WindEkf {
        self.ekf.filter()
    }

    /// Feeds this tick to the enabled estimators and refreshes
    /// `derived.wind.estimated`.
    ///
    /// A filter result is published as is on the tick it arrives, on top of
    /// the store's weighted mean. The estimate is cleared once the store has
    /// nothing close enough in age and altitude.
    pub fn compute(&mut self, basic: &RawSample, derived: &mut DerivedState, settings: &ComputerSettings) {
        if !settings.wind.auto_wind() {
            self.reset();
            derived.wind.estimated.clear();
            return;
        }

        if derived.wind.estimated.expire(basic.clock, MAX_ESTIMATE_AGE) {
            debug!("Estimated wind expired");
        }

        let Some(time) = basic.time() else {
            return;
        };
        let altitude = derived.altitude.nav_altitude.get().unwrap_or(0.0);

        if settings.wind.circling_wind {
            if let Some(estimate) = self.circling.new_sample(basic, derived.circling.circling) {
                self.store.slot_measurement(time, estimate, altitude);
            }
        }

        let mut filter_wind = None;
        if settings.wind.zig_zag_wind {
            if let Some(estimate) = self.ekf.update(basic, derived, settings.polar.takeoff_speed) {
                self.store.slot_measurement(time, estimate, altitude);
                filter_wind = Some(estimate.wind);
            }
        }

        match self.store.slot_altitude(time, altitude) {
            WindRecalculation::Unchanged => {}
            WindRecalculation::Wind(wind) => derived.wind.estimated.set(wind, basic.clock),
            WindRecalculation::Unavailable => {
                if derived.wind.estimated.is_available() {
                    debug!(time, altitude, "No usable wind measurements, estimate cleared");
                }
                derived.wind.estimated.clear();
            }
        }

        if let Some(wind) = filter_wind {
            derived.wind.estimated.set(wind, basic.clock);
        }
    }
}

/// Picks the effective wind and derives the head wind component.
///
/// Priority: the auto estimate if newer than the last manual edit, then an
/// external wind if enabled and newer than the manual edit, then the
/// manual wind.
pub fn select_wind(basic: &RawSample, derived: &mut DerivedState, settings: &WindSettings) {
    let manual = settings.manual_wind;
    let estimated = derived.wind.estimated;

    let (wind, source) = if settings.auto_wind() && estimated.freshness().modified(manual.freshness()) {
        (estimated, WindSource::Auto)
    } else if settings.external_wind && basic.external_wind.freshness().modified(manual.freshness()) {
        (basic.external_wind, WindSource::External)
    } else if manual.is_available() {
        (manual, WindSource::Manual)
    } else {
        (Stamped::default(), WindSource::None)
    };

    if source != derived.wind.source {
        debug!(from = %derived.wind.source, to = %source, "Wind source changed");
    }

    derived.wind.wind = wind;
    derived.wind.source = source;
    derived.wind.head_wind = wind
        .get()
        .zip(derived.heading.get())
        .map(|(wind, heading)| wind.norm * (wind.bearing - heading).to_radians().cos());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Airspeed;
    use std::f64::consts::PI;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn estimate(bearing: f64, speed: f64, quality: u32) -> WindEstimate {
        WindEstimate {
            wind: SpeedVector::new(bearing, speed),
            quality,
        }
    }

    /// Straight flight weaving ±30° about 10° at 25 m/s, 5 m/s wind from 90°.
    fn weave_sample(t: u32) -> RawSample {
        let time = t as f64;
        let heading = 30.0 * (2.0 * PI * time / 40.0).sin() + 10.0;
        let air = SpeedVector::new(heading, 25.0).to_xy();
        let wind = SpeedVector::new(90.0, 5.0).to_xy();
        let ground = SpeedVector::from_xy(air.0 - wind.0, air.1 - wind.1);

        let mut basic = RawSample::at(time);
        basic.track.set(ground.bearing, basic.clock);
        basic.ground_speed.set(ground.norm, basic.clock);
        basic.set_measured_airspeed(Airspeed::new(25.0, 25.0), basic.clock);
        basic
    }

    #[test]
    fn test_select_none() {
        let mut derived = DerivedState::new();
        select_wind(&RawSample::at(10.0), &mut derived, &WindSettings::default());
        assert_eq!(derived.wind.source, WindSource::None);
        assert_eq!(derived.wind.wind.get(), None);
        assert_eq!(derived.wind.head_wind, None);
    }

    #[test]
    fn test_select_manual() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(5));

        select_wind(&RawSample::at(10.0), &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Manual);
        assert_eq!(derived.wind.wind.get(), Some(SpeedVector::new(270.0, 5.0)));
    }

    #[test]
    fn test_select_auto_newer_than_manual() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(5));
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(20));

        select_wind(&RawSample::at(30.0), &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Auto);
        assert_eq!(derived.wind.wind.get(), Some(SpeedVector::new(200.0, 8.0)));
    }

    #[test]
    fn test_manual_edit_overrides_older_auto() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(20));
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(25));

        select_wind(&RawSample::at(30.0), &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Manual);
    }

    #[test]
    fn test_auto_ignored_when_disabled() {
        let mut derived = DerivedState::new();
        let settings = WindSettings {
            circling_wind: false,
            zig_zag_wind: false,
            ..WindSettings::default()
        };
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(20));

        select_wind(&RawSample::at(30.0), &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::None);
    }

    #[test]
    fn test_select_external() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(5));
        let mut basic = RawSample::at(30.0);
        basic.external_wind.set(SpeedVector::new(90.0, 3.0), secs(29));

        select_wind(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::External);
        assert_eq!(derived.wind.wind.freshness(), basic.external_wind.freshness());

        settings.external_wind = false;
        select_wind(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Manual);
    }

    #[test]
    fn test_auto_preferred_over_external() {
        let mut derived = DerivedState::new();
        let settings = WindSettings::default();
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(20));
        let mut basic = RawSample::at(30.0);
        basic.external_wind.set(SpeedVector::new(90.0, 3.0), secs(29));

        select_wind(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Auto);
    }

    #[test]
    fn test_head_wind_component() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        settings.manual_wind.set(SpeedVector::new(0.0, 10.0), secs(1));

        derived.heading.set(0.0, secs(2));
        select_wind(&RawSample::at(2.0), &mut derived, &settings);
        assert!((derived.wind.head_wind.unwrap() - 10.0).abs() < 1e-9);

        derived.heading.set(180.0, secs(3));
        select_wind(&RawSample::at(3.0), &mut derived, &settings);
        assert!((derived.wind.head_wind.unwrap() + 10.0).abs() < 1e-9);

        derived.heading.set(90.0, secs(4));
        select_wind(&RawSample::at(4.0), &mut derived, &settings);
        assert!(derived.wind.head_wind.unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_auto_preferred_over_external_after_older_manual_edit() {
        let mut derived = DerivedState::new();
        let mut settings = WindSettings::default();
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(5));
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(20));
        let mut basic = RawSample::at(30.0);
        basic.external_wind.set(SpeedVector::new(90.0, 3.0), secs(29));

        select_wind(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::Auto);
        assert_eq!(derived.wind.wind.get(), Some(SpeedVector::new(200.0, 8.0)));

        // A manual edit between the two lets the newer external wind through.
        settings.manual_wind.set(SpeedVector::new(270.0, 5.0), secs(25));
        select_wind(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.source, WindSource::External);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Estimated wind
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_filter_wind_published_over_store_mean() {
        let mut computer = WindComputer::new();
        let mut derived = DerivedState::new();
        derived.flight.flying = true;
        let settings = ComputerSettings::default();

        computer.store.slot_measurement(0.0, estimate(270.0, 10.0, 3), 0.0);

        let mut t = 1;
        while computer.store.len() < 2 {
            assert!(t < 100, "no filter wind by {t} s");
            computer.compute(&weave_sample(t), &mut derived, &settings);
            t += 1;
        }

        let filter_wind = computer.filter().wind();
        assert_eq!(derived.wind.estimated.get(), Some(filter_wind));
        assert_eq!(derived.wind.estimated.freshness(), weave_sample(t - 1).time.freshness());

        let mean = computer.store.measurements().get_wind((t - 1) as f64, 0.0).unwrap();
        assert_ne!(mean, filter_wind);

        // Nothing new on the next tick keeps the filter wind.
        computer.compute(&weave_sample(t), &mut derived, &settings);
        assert_eq!(derived.wind.estimated.get(), Some(filter_wind));

        select_wind(&weave_sample(t), &mut derived, &settings.wind);
        assert_eq!(derived.wind.source, WindSource::Auto);
        assert_eq!(derived.wind.wind.get(), Some(filter_wind));
    }

    #[test]
    fn test_estimate_cleared_when_measurements_out_of_range() {
        let mut computer = WindComputer::new();
        let mut derived = DerivedState::new();
        let settings = ComputerSettings::default();

        computer.store.slot_measurement(0.0, estimate(270.0, 10.0, 3), 1000.0);
        derived.altitude.nav_altitude.set(1000.0, secs(0));
        computer.compute(&RawSample::at(0.0), &mut derived, &settings);
        assert!(derived.wind.estimated.is_available());

        // 1200 m higher ten minutes later: nothing in range.
        let mut basic = RawSample::at(600.0);
        basic.external_wind.set(SpeedVector::new(90.0, 3.0), basic.clock);
        derived.altitude.nav_altitude.set(2200.0, basic.clock);
        computer.compute(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.estimated.get(), None);

        select_wind(&basic, &mut derived, &settings.wind);
        assert_eq!(derived.wind.source, WindSource::External);
        assert_eq!(derived.wind.wind.get(), Some(SpeedVector::new(90.0, 3.0)));
    }

    #[test]
    fn test_aged_estimate_falls_back_to_manual() {
        let mut computer = WindComputer::new();
        let mut derived = DerivedState::new();
        let settings = ComputerSettings::default().with_manual_wind(SpeedVector::new(0.0, 4.0), secs(1));

        computer.store.slot_measurement(10.0, estimate(270.0, 10.0, 3), 1000.0);
        derived.altitude.nav_altitude.set(1000.0, secs(10));
        computer.compute(&RawSample::at(10.0), &mut derived, &settings);
        select_wind(&RawSample::at(10.0), &mut derived, &settings.wind);
        assert_eq!(derived.wind.source, WindSource::Auto);

        // An hour later and 150 m higher.
        let basic = RawSample::at(3611.0);
        derived.altitude.nav_altitude.set(1150.0, basic.clock);
        computer.compute(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.estimated.get(), None);

        select_wind(&basic, &mut derived, &settings.wind);
        assert_eq!(derived.wind.source, WindSource::Manual);
        assert_eq!(derived.wind.wind.get(), Some(SpeedVector::new(0.0, 4.0)));
    }

    #[test]
    fn test_estimate_expires_without_fix_time() {
        let mut computer = WindComputer::new();
        let mut derived = DerivedState::new();
        let settings = ComputerSettings::default();
        derived.wind.estimated.set(SpeedVector::new(270.0, 10.0), secs(10));

        let mut basic = RawSample {
            clock: secs(600),
            ..RawSample::default()
        };
        computer.compute(&basic, &mut derived, &settings);
        assert!(derived.wind.estimated.is_available());

        basic.clock = secs(3611);
        computer.compute(&basic, &mut derived, &settings);
        assert_eq!(derived.wind.estimated.get(), None);
    }

    #[test]
    fn test_compute_disabled_clears_estimate() {
        let mut computer = WindComputer::new();
        let mut derived = DerivedState::new();
        derived.wind.estimated.set(SpeedVector::new(200.0, 8.0), secs(1));
        let settings = ComputerSettings::default().with_auto_wind(false, false);

        computer.compute(&RawSample::at(2.0), &mut derived, &settings);
        assert_eq!(derived.wind.estimated.get(), None);
    }
}
