//! The per-tick computation pipeline.
//!
//! [`FlightComputer`] owns the derived state and every stage's internal
//! state. Each call to [`FlightComputer::tick`] runs the stages in a fixed
//! order; a stage may read what earlier stages wrote on the same tick,
//! never the reverse.
//!
//! ```text
//! RawSample(t)
//!     │
//!     ▼
//! basic::fill ─► basic::compute ─► flying ─► circling ─► wind ─► select_wind
//!                                                                    │
//!                         ┌──────────────────┬───────────────────────┤
//!                         ▼                  ▼                       ▼
//!                    glide_ratio       average_vario               sonde
//!                                                                    │
//!                                                                    ▼
//!                                                           DerivedState(t)
//! ```
//!
//! # Time warps
//!
//! A fix time earlier than the previous tick's (log replay restarted, GPS
//! week rollover, simulator reset) resets the whole pipeline and the
//! derived state before the tick is processed. Each stage additionally
//! guards its own delta timers.

pub mod average_vario;
pub mod basic;
pub mod circling;
pub mod flying;
pub mod glide_ratio;
pub mod sonde;
pub mod wind;

use tracing::{trace, warn};

use crate::config::ComputerSettings;
use crate::sample::RawSample;
use crate::shared::SharedDerivedState;
use crate::state::{DerivedState, TickEdges};

use average_vario::AverageVarioFilter;
use circling::CirclingComputer;
use flying::FlyingComputer;
use glide_ratio::GlideRatioComputer;
use sonde::ThermalSonde;
use wind::WindComputer;

/// Runs the derived-state pipeline over a stream of raw samples.
#[derive(Debug)]
pub struct FlightComputer {
    settings: ComputerSettings,
    derived: DerivedState,
    /// Normalized sample of the previous tick.
    last_basic: RawSample,
    /// Most recent normalized sample that carried a new GPS fix.
    last_gps: RawSample,
    flying: FlyingComputer,
    circling: CirclingComputer,
    wind: WindComputer,
    glide: GlideRatioComputer,
    average_vario: AverageVarioFilter,
    sonde: ThermalSonde,
    shared: Option<SharedDerivedState>,
}

impl FlightComputer {
    pub fn new(settings: ComputerSettings) -> Self {
        Self {
            glide: GlideRatioComputer::new(&settings.glide),
            sonde: ThermalSonde::new(settings.sonde.forecast_temperature),
            settings,
            derived: DerivedState::new(),
            last_basic: RawSample::default(),
            last_gps: RawSample::default(),
            flying: FlyingComputer::new(),
            circling: CirclingComputer::new(),
            wind: WindComputer::new(),
            average_vario: AverageVarioFilter::new(),
            shared: None,
        }
    }

    /// Publishes the derived state to `shared` at the end of every tick.
    pub fn publish_to(&mut self, shared: SharedDerivedState) {
        shared.publish(&self.derived);
        self.shared = Some(shared);
    }

    pub fn settings(&self) -> &ComputerSettings {
        &self.settings
    }

    /// Settings take effect on the next tick.
    pub fn settings_mut(&mut self) -> &mut ComputerSettings {
        &mut self.settings
    }

    pub fn set_settings(&mut self, settings: ComputerSettings) {
        self.settings = settings;
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    /// The normalized sample of the last tick.
    pub fn basic(&self) -> &RawSample {
        &self.last_basic
    }

    pub fn wind(&self) -> &WindComputer {
        &self.wind
    }

    pub fn glide_ratio(&self) -> &GlideRatioComputer {
        &self.glide
    }

    pub fn sonde(&self) -> &ThermalSonde {
        &self.sonde
    }

    /// Discards all derived and internal state, e.g. for a new flight.
    pub fn reset(&mut self) {
        self.derived.reset();
        self.last_basic = RawSample::default();
        self.last_gps = RawSample::default();
        self.flying.reset();
        self.circling.reset();
        self.wind.reset();
        self.glide.reset();
        self.average_vario.reset();
        self.sonde.reset();
    }

    /// Processes one raw sample and returns the transition edges of this
    /// tick.
    pub fn tick(&mut self, raw: &RawSample) -> TickEdges {
        let mut basic = raw.clone();
        basic.expire();

        if let (Some(now), Some(last)) = (basic.time(), self.last_basic.time()) {
            if now < last {
                warn!(now, last, "Time warp detected, resetting flight computer");
                self.reset();
            }
        }

        let previous_mode = self.derived.circling.mode;
        let was_flying = self.derived.flight.flying;

        let settings = &self.settings;
        let derived = &mut self.derived;

        basic::fill(&mut basic, derived, settings);

        let advanced = match (basic.time(), self.last_basic.time()) {
            (Some(now), Some(last)) => now > last,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if advanced {
            basic::compute(&mut basic, &self.last_basic, &self.last_gps, derived, settings);
        }

        self.flying.update(
            &basic,
            derived.altitude.nav_altitude.get(),
            settings.polar.takeoff_speed,
            &mut derived.flight,
        );

        let thermal_finished = self.circling.update(&basic, derived, &settings.circling);

        self.wind.compute(&basic, derived, settings);
        wind::select_wind(&basic, derived, &settings.wind);

        let location_modified = basic
            .location
            .freshness()
            .modified(self.last_basic.location.freshness());

        self.glide.update(&basic, location_modified, derived, &settings.glide);

        if let Some(time) = basic.time() {
            let averages = self.average_vario.update(
                time,
                derived.circling.circling,
                derived.vario.brutto_vario,
                derived.vario.netto_vario,
            );
            if let Some((brutto, netto)) = averages {
                derived.vario.average = brutto;
                derived.vario.netto_average = netto;
            }
        }

        self.sonde.update(&basic, derived, &settings.sonde);

        trace!(
            time = ?basic.time(),
            nav_altitude = ?derived.altitude.nav_altitude.get(),
            mode = %derived.circling.mode,
            brutto = derived.vario.brutto_vario,
            wind_source = %derived.wind.source,
            "Tick"
        );

        let edges = TickEdges {
            previous_mode,
            mode: derived.circling.mode,
            was_flying,
            flying: derived.flight.flying,
            thermal_finished,
        };

        if basic
            .location
            .freshness()
            .modified(self.last_gps.location.freshness())
        {
            self.last_gps = basic.clone();
        }
        self.last_basic = basic;

        if let Some(shared) = &self.shared {
            shared.publish(&self.derived);
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Airspeed;
    use crate::state::CirclingMode;

    // ─────────────────────────────────────────────────────────────────────────
    // Test Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Straight flight at 30 m/s with airspeed and a reported track.
    fn cruise_sample(time: f64) -> RawSample {
        let mut sample = RawSample::at(time);
        sample.track.set(90.0, sample.clock);
        sample.ground_speed.set(30.0, sample.clock);
        sample.set_measured_airspeed(Airspeed::new(30.0, 28.0), sample.clock);
        sample.gps_altitude.set(1000.0, sample.clock);
        sample
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_first_tick_fills_altitude() {
        let mut computer = FlightComputer::new(ComputerSettings::default());
        computer.tick(&cruise_sample(0.0));

        assert_eq!(computer.derived().altitude.nav_altitude.get(), Some(1000.0));
        assert!(computer.derived().altitude.energy_height > 0.0);
    }

    #[test]
    fn test_takeoff_edge() {
        let mut computer = FlightComputer::new(ComputerSettings::default());
        let edges: Vec<TickEdges> = (0..=12).map(|t| computer.tick(&cruise_sample(t as f64))).collect();

        assert!(edges[..10].iter().all(|e| !e.took_off()));
        assert!(edges[10].took_off());
        assert!(!edges[11].took_off());
        assert!(computer.derived().flight.flying);
    }

    #[test]
    fn test_repeated_sample_is_stable() {
        let mut computer = FlightComputer::new(ComputerSettings::default());
        for t in 0..15 {
            computer.tick(&cruise_sample(t as f64));
        }
        let before = computer.derived().clone();
        computer.tick(&cruise_sample(14.0));
        assert_eq!(computer.derived().altitude, before.altitude);
        assert_eq!(computer.derived().circling.mode, CirclingMode::Cruise);
    }

    #[test]
    fn test_time_warp_resets_state() {
        let mut computer = FlightComputer::new(ComputerSettings::default());
        for t in 100..120 {
            computer.tick(&cruise_sample(t as f64));
        }
        assert!(computer.derived().flight.flying);

        let edges = computer.tick(&cruise_sample(5.0));
        assert!(!computer.derived().flight.flying);
        assert!(!edges.landed());
        assert_eq!(computer.basic().time(), Some(5.0));
    }

    #[test]
    fn test_publishes_each_tick() {
        let shared = SharedDerivedState::new();
        let mut computer = FlightComputer::new(ComputerSettings::default());
        computer.publish_to(shared.clone());

        computer.tick(&cruise_sample(0.0));
        assert_eq!(shared.read().altitude.nav_altitude.get(), Some(1000.0));
    }
}
