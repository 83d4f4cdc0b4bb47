//! Cruise/circling classification.
//!
//! Turn rate is differentiated from track (and heading), clamped and
//! low-pass filtered. A four-state machine with debounce turns that into
//! the flight regime:
//!
//! ```text
//!              turning                      turning ≥ cruise_climb_switch
//!   ┌────────┐ ──────► ┌────────────────┐ ───────────────────────────► ┌───────┐
//!   │ CRUISE │         │ POSSIBLE_CLIMB │                              │ CLIMB │
//!   └────────┘ ◄────── └────────────────┘                              └───────┘
//!       ▲     not turning                                           │     ▲
//!       │                                              not turning  │     │ turning
//!       │  not turning ≥ climb_cruise_switch   ┌─────────────────┐  │     │
//!       └───────────────────────────────────── │ POSSIBLE_CRUISE │ ◄┘     │
//!                                              └─────────────────┘ ───────┘
//! ```
//!
//! An enabled device flight-mode switch forces CLIMB or CRUISE on the same
//! tick, still passing through the intermediate state.
//!
//! The stage also accumulates circling/cruise time percentages and tracks
//! the current and last thermal.

use tracing::{debug, info};

use crate::config::CirclingSettings;
use crate::sample::{FlightModeSwitch, RawSample};
use crate::state::{
    CirclingInfo, CirclingMode, ClimbStats, DerivedState, LegStart, ThermalInfo,
    INVALID_PERCENTAGE,
};
use crate::time::{DeltaTime, TimeStep};
use crate::units::{angle_delta, low_pass};

/// Turn rates beyond this are clamped before smoothing (deg/s).
pub const MAX_TURN_RATE: f64 = 50.0;

/// Low-pass factor of the smoothed turn rates.
pub const TURN_RATE_FILTER: f64 = 0.3;

/// Thermals shorter than this are not recorded as "last thermal".
pub const THERMAL_TIME_MIN: f64 = 45.0;

/// Low-pass factor of the last-thermal average.
const THERMAL_AVERAGE_FILTER: f64 = 0.3;

/// Turn-rate, mode and statistics state.
#[derive(Debug, Clone, Default)]
pub struct CirclingComputer {
    turn_delta: DeltaTime,
    stats_delta: DeltaTime,
    last_track: Option<f64>,
    last_heading: Option<f64>,
}

impl CirclingComputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Runs turn rate, mode machine, statistics and thermal tracking for one
    /// tick. Returns `true` if a thermal was finalised.
    pub fn update(
        &mut self,
        basic: &RawSample,
        derived: &mut DerivedState,
        settings: &CirclingSettings,
    ) -> bool {
        let Some(time) = basic.time() else {
            return false;
        };
        let flying = derived.flight.flying;
        let heading = derived.heading.get();

        self.turn_rate(time, basic.track.get(), heading, flying, &mut derived.circling);

        let snapshot = LegStart {
            time,
            location: basic.location.get(),
            nav_altitude: derived.altitude.nav_altitude.get().unwrap_or(0.0),
            energy_height: derived.altitude.energy_height,
        };
        let switch = basic
            .switch_state
            .get()
            .filter(|_| settings.external_trigger);

        let finished = if flying {
            turning(&mut derived.circling, snapshot, switch, settings)
        } else {
            None
        };

        let brutto = derived.vario.brutto_vario;
        self.percent_circling(time, flying, brutto, &mut derived.circling);

        update_thermals(
            &derived.circling,
            time,
            derived.altitude.te_altitude,
            finished,
            &mut derived.thermal,
        );

        finished.is_some()
    }

    fn turn_rate(
        &mut self,
        time: f64,
        track: Option<f64>,
        heading: Option<f64>,
        flying: bool,
        info: &mut CirclingInfo,
    ) {
        if !flying {
            info.turn_rate = 0.0;
            info.turn_rate_heading = 0.0;
            self.last_track = track;
            self.last_heading = heading;
            return;
        }

        match self.turn_delta.update(time, 0.0, 0.0) {
            TimeStep::Warped => {
                debug!(time, "Time warp, resetting turn rate");
                reset_turn_rates(info);
                self.last_track = track;
                self.last_heading = heading;
                return;
            }
            TimeStep::Elapsed(dt) => {
                info.turn_rate = match (track, self.last_track) {
                    (Some(now), Some(then)) => angle_delta(now - then) / dt,
                    _ => 0.0,
                };
                info.turn_rate_heading = match (heading, self.last_heading) {
                    (Some(now), Some(then)) => angle_delta(now - then) / dt,
                    _ => 0.0,
                };
                self.last_track = track;
                self.last_heading = heading;
            }
            TimeStep::First => {
                self.last_track = track;
                self.last_heading = heading;
                return;
            }
            TimeStep::TooShort => return,
        }

        info.turn_rate_smoothed = low_pass(
            info.turn_rate_smoothed,
            info.turn_rate.clamp(-MAX_TURN_RATE, MAX_TURN_RATE),
            TURN_RATE_FILTER,
        );
        info.turn_rate_heading_smoothed = low_pass(
            info.turn_rate_heading_smoothed,
            info.turn_rate_heading.clamp(-MAX_TURN_RATE, MAX_TURN_RATE),
            TURN_RATE_FILTER,
        );
    }

    fn percent_circling(&mut self, time: f64, flying: bool, brutto: f64, info: &mut CirclingInfo) {
        if !flying {
            self.stats_delta.reset();
            return;
        }

        let Some(dt) = self.stats_delta.update(time, 0.0, 0.0).elapsed() else {
            return;
        };

        if info.circling {
            info.time_circling += dt;
            if brutto > 0.0 {
                info.time_climb_circling += dt;
                info.total_height_gain += brutto * dt;
            }
        } else {
            info.time_cruise += dt;
            if brutto > 0.0 {
                info.time_climb_cruise += dt;
            }
        }

        let total = info.time_circling + info.time_cruise;
        if total > 0.0 {
            info.circling_percentage = 100.0 * info.time_circling / total;
            info.circling_climb_percentage = if info.time_circling > 0.0 {
                100.0 * info.time_climb_circling / info.time_circling
            } else {
                INVALID_PERCENTAGE
            };
            info.noncircling_climb_percentage = if info.time_cruise > 0.0 {
                100.0 * info.time_climb_cruise / info.time_cruise
            } else {
                INVALID_PERCENTAGE
            };
        }
    }
}

fn reset_turn_rates(info: &mut CirclingInfo) {
    info.turn_rate = 0.0;
    info.turn_rate_smoothed = 0.0;
    info.turn_rate_heading = 0.0;
    info.turn_rate_heading_smoothed = 0.0;
    info.turning = false;
    info.mode = CirclingMode::Cruise;
    info.circling = false;
    info.turn_start = None;
    info.climb_start = None;
}

/// Advances the mode machine. Returns the finished thermal, if this tick
/// settled back into cruise.
fn turning(
    info: &mut CirclingInfo,
    snapshot: LegStart,
    switch: Option<FlightModeSwitch>,
    settings: &CirclingSettings,
) -> Option<ClimbStats> {
    info.turning = info.turn_rate_smoothed.abs() >= settings.min_turn_rate;
    let turning = info.turning;
    let force_circling = switch == Some(FlightModeSwitch::Circling);
    let force_cruise = switch == Some(FlightModeSwitch::Cruise);
    let time = snapshot.time;
    let mut finished = None;

    match info.mode {
        CirclingMode::Cruise | CirclingMode::PossibleClimb => {
            if info.mode == CirclingMode::Cruise && (turning || force_circling) {
                info.turn_start = Some(snapshot);
                info.mode = CirclingMode::PossibleClimb;
                debug!(time, "Possible climb");
            }

            if info.mode == CirclingMode::PossibleClimb {
                if force_cruise {
                    info.mode = CirclingMode::Cruise;
                } else if turning || force_circling {
                    let start = info.turn_start.unwrap_or(snapshot);
                    if force_circling || time - start.time >= settings.cruise_climb_switch {
                        info.climb_start = Some(start);
                        info.mode = CirclingMode::Climb;
                        info!(
                            time,
                            altitude = start.te_altitude(),
                            forced = force_circling,
                            "Circling started"
                        );
                    }
                } else {
                    info.mode = CirclingMode::Cruise;
                    debug!(time, "Possible climb abandoned");
                }
            }
        }
        CirclingMode::Climb | CirclingMode::PossibleCruise => {
            if info.mode == CirclingMode::Climb && (!turning || force_cruise) {
                info.turn_start = Some(snapshot);
                info.mode = CirclingMode::PossibleCruise;
                debug!(time, "Possible cruise");
            }

            if info.mode == CirclingMode::PossibleCruise {
                if force_circling {
                    info.mode = CirclingMode::Climb;
                } else if !turning || force_cruise {
                    let start = info.turn_start.unwrap_or(snapshot);
                    if force_cruise || time - start.time >= settings.climb_cruise_switch {
                        info.cruise_start = Some(start);
                        info.mode = CirclingMode::Cruise;
                        finished = info.climb_start.map(|climb| ClimbStats {
                            start_time: climb.time,
                            end_time: start.time,
                            start_altitude: climb.te_altitude(),
                            gain: start.te_altitude() - climb.te_altitude(),
                            lift_rate: 0.0,
                        });
                        info!(
                            time,
                            altitude = start.te_altitude(),
                            forced = force_cruise,
                            "Circling ended"
                        );
                    }
                } else {
                    info.mode = CirclingMode::Climb;
                    debug!(time, "Possible cruise abandoned");
                }
            }
        }
    }

    info.circling = info.mode.is_circling();
    finished.map(|mut stats| {
        let duration = stats.duration();
        stats.lift_rate = if duration > 0.0 { stats.gain / duration } else { 0.0 };
        stats
    })
}

fn update_thermals(
    circling: &CirclingInfo,
    time: f64,
    te_altitude: f64,
    finished: Option<ClimbStats>,
    thermal: &mut ThermalInfo,
) {
    thermal.current = match circling.climb_start {
        Some(climb) if circling.circling => {
            let duration = time - climb.time;
            let gain = te_altitude - climb.te_altitude();
            Some(ClimbStats {
                start_time: climb.time,
                end_time: time,
                start_altitude: climb.te_altitude(),
                gain,
                lift_rate: if duration > 0.0 { gain / duration } else { 0.0 },
            })
        }
        _ => None,
    };

    let Some(stats) = finished else {
        return;
    };
    if stats.duration() < THERMAL_TIME_MIN || stats.gain <= 0.0 {
        debug!(
            duration = stats.duration(),
            gain = stats.gain,
            "Climb too short or without gain, not recorded"
        );
        return;
    }

    thermal.last_lift_rate_smoothed = if thermal.thermal_count == 0 {
        stats.lift_rate
    } else {
        low_pass(
            thermal.last_lift_rate_smoothed,
            stats.lift_rate,
            THERMAL_AVERAGE_FILTER,
        )
    };
    thermal.thermal_count += 1;
    thermal.last = Some(stats);
    info!(
        duration = stats.duration(),
        gain = stats.gain,
        lift_rate = stats.lift_rate,
        "Thermal finished"
    );
}
