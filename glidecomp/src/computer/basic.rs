//! Basic quantity fill-in.
//!
//! Makes the basic quantities of a tick consistent with each other no
//! matter which sensors are present. Values reported by a device are
//! never overwritten; derived values carry the stamp of the measurement
//! they were derived from.
//!
//! The stage runs in two halves:
//!
//! - [`fill`] runs every tick: pressure cross-conversion and navigation
//!   altitude.
//! - [`compute`] runs only when the fix time advanced: track, ground
//!   speed, airspeed, heading, energy height, varios and dynamics.

use crate::atmosphere::{self, AtmosphericPressure};
use crate::config::ComputerSettings;
use crate::sample::{Airspeed, RawSample};
use crate::state::{AltitudeSource, DerivedState};
use crate::units::{SpeedVector, GRAVITY};

/// Minimum displacement in metres for a position-derived track.
const MIN_TRACK_DISTANCE: f64 = 1.0;

/// Fills pressure-derived and navigation altitudes.
pub fn fill(basic: &mut RawSample, derived: &mut DerivedState, settings: &ComputerSettings) {
    compute_pressure(basic, derived, settings.altitude.qnh);
    compute_nav_altitude(basic, derived, settings.altitude.nav_baro_altitude);
}

/// Derives the delta-based quantities of a tick whose time advanced past
/// `last`.
///
/// `last_gps` is the most recent earlier sample that carried a new GPS fix.
pub fn compute(
    basic: &mut RawSample,
    last: &RawSample,
    last_gps: &RawSample,
    derived: &mut DerivedState,
    settings: &ComputerSettings,
) {
    compute_track(basic, last);
    compute_ground_speed(basic, last);
    compute_airspeed(basic, derived);
    compute_heading(basic, derived);

    let previous_energy_height = derived.altitude.energy_height;
    compute_energy_height(basic, derived);
    compute_gps_vario(basic, last, last_gps, derived);
    compute_gps_vario_te(basic, last, derived, previous_energy_height);
    compute_brutto_netto(basic, derived, settings);
    compute_dynamics(basic, derived);
}

/// Cross-fills static pressure, pressure altitude and baro altitude.
///
/// With a reference pressure, baro altitude is always recomputed from the
/// best pressure source; a device's own baro altitude may use a different
/// reference.
fn compute_pressure(
    basic: &mut RawSample,
    derived: &mut DerivedState,
    qnh: Option<AtmosphericPressure>,
) {
    if !basic.static_pressure.is_available() {
        if let Some(pa) = basic.pressure_altitude.get() {
            let stamp = basic.pressure_altitude.freshness();
            basic.static_pressure.set_with(
                AtmosphericPressure::pressure_altitude_to_static_pressure(pa),
                stamp,
            );
        } else if let (Some(baro), Some(qnh)) = (basic.baro_altitude.get(), qnh) {
            let stamp = basic.baro_altitude.freshness();
            basic
                .static_pressure
                .set_with(qnh.qnh_altitude_to_static_pressure(baro), stamp);
        }
    }

    if !basic.pressure_altitude.is_available() {
        if let Some(ps) = basic.static_pressure.get() {
            let stamp = basic.static_pressure.freshness();
            basic.pressure_altitude.set_with(
                AtmosphericPressure::static_pressure_to_pressure_altitude(ps),
                stamp,
            );
        }
    }

    let published = &mut derived.altitude;
    if let Some(qnh) = qnh {
        if let Some(ps) = basic.static_pressure.get() {
            let stamp = basic.static_pressure.freshness();
            basic
                .baro_altitude
                .set_with(qnh.static_pressure_to_qnh_altitude(ps), stamp);
        } else if let Some(pa) = basic.pressure_altitude.get() {
            let stamp = basic.pressure_altitude.freshness();
            basic
                .baro_altitude
                .set_with(qnh.pressure_altitude_to_qnh_altitude(pa), stamp);
        }
        published.baro_altitude = basic.baro_altitude;
        published.baro_altitude_source = if basic.baro_altitude.is_available() {
            AltitudeSource::QnhCorrected
        } else {
            AltitudeSource::Unavailable
        };
    } else if basic.baro_altitude.is_available() {
        published.baro_altitude = basic.baro_altitude;
        published.baro_altitude_source = AltitudeSource::Device;
    } else if basic.pressure_altitude.is_available() {
        published.baro_altitude = basic.pressure_altitude;
        published.baro_altitude_source = AltitudeSource::PressureFallback;
    } else {
        published.baro_altitude.clear();
        published.baro_altitude_source = AltitudeSource::Unavailable;
    }
}

fn compute_nav_altitude(basic: &RawSample, derived: &mut DerivedState, nav_baro: bool) {
    let nav = &mut derived.altitude.nav_altitude;
    if nav_baro && basic.baro_altitude.is_available() {
        *nav = basic.baro_altitude;
    } else if basic.gps_altitude.is_available() {
        *nav = basic.gps_altitude;
    } else {
        nav.clear();
    }
}

fn compute_track(basic: &mut RawSample, last: &RawSample) {
    if basic.track.is_available() {
        return;
    }
    let (Some(here), Some(there)) = (basic.location.get(), last.location.get()) else {
        return;
    };
    if there.distance(&here) >= MIN_TRACK_DISTANCE {
        let stamp = basic.location.freshness();
        basic.track.set_with(there.bearing(&here), stamp);
    }
}

fn compute_ground_speed(basic: &mut RawSample, last: &RawSample) {
    if basic.ground_speed.is_available() {
        return;
    }
    let (Some(here), Some(there)) = (basic.location.get(), last.location.get()) else {
        return;
    };
    let (Some(now), Some(then)) = (basic.time(), last.time()) else {
        return;
    };
    let dt = now - then;
    if dt <= 0.0 {
        return;
    }
    let stamp = basic.location.freshness();
    basic.ground_speed.set_with(there.distance(&here) / dt, stamp);
}

/// Altitude for density correction: pressure altitude is what the
/// density model expects, other altitudes are close enough.
fn density_altitude(basic: &RawSample, derived: &DerivedState) -> f64 {
    basic
        .pressure_altitude
        .get()
        .or_else(|| derived.altitude.nav_altitude.get())
        .unwrap_or(0.0)
}

/// Airspeed preference: direct report, pitot dynamic pressure, then
/// ground speed plus the previous tick's wind while airborne.
fn compute_airspeed(basic: &mut RawSample, derived: &DerivedState) {
    if basic.airspeed.is_available() {
        return;
    }

    if let Some(q) = basic.dynamic_pressure.get() {
        let ias = atmosphere::indicated_airspeed_from_dynamic_pressure(q);
        let tas = ias * atmosphere::air_density_ratio(density_altitude(basic, derived));
        let stamp = basic.dynamic_pressure.freshness();
        basic.airspeed.set_with(Airspeed::new(tas, ias), stamp);
        basic.airspeed_real = true;
        return;
    }

    basic.airspeed_real = false;

    let wind = derived.wind.wind.get();
    match (basic.ground_speed.get(), basic.track.get(), wind) {
        (Some(gs), Some(track), Some(wind)) if derived.flight.flying => {
            let air = air_vector(gs, track, wind);
            let tas = air.norm;
            let ias = tas / atmosphere::air_density_ratio(density_altitude(basic, derived));
            let stamp = basic.ground_speed.freshness();
            basic.airspeed.set_with(Airspeed::new(tas, ias), stamp);
        }
        _ => basic.airspeed.clear(),
    }
}

/// Velocity through the air: ground vector plus the wind-from vector.
fn air_vector(ground_speed: f64, track: f64, wind: SpeedVector) -> SpeedVector {
    let ground = SpeedVector::new(track, ground_speed);
    let (gx, gy) = ground.to_xy();
    let (wx, wy) = wind.to_xy();
    SpeedVector::from_xy(gx + wx, gy + wy)
}

fn compute_heading(basic: &RawSample, derived: &mut DerivedState) {
    if basic.attitude.heading.is_available() {
        derived.heading = basic.attitude.heading;
        return;
    }

    let Some(track) = basic.track.get() else {
        derived.heading.clear();
        return;
    };
    let stamp = basic.track.freshness();

    let wind = derived.wind.wind.get().filter(|_| derived.flight.flying);
    let gs = basic.ground_speed.get().unwrap_or(0.0);
    match wind {
        Some(wind) if gs > 0.0 || !wind.is_zero() => {
            derived
                .heading
                .set_with(air_vector(gs, track, wind).bearing, stamp);
        }
        _ => derived.heading.set_with(track, stamp),
    }
}

fn compute_energy_height(basic: &RawSample, derived: &mut DerivedState) {
    let altitude = &mut derived.altitude;
    altitude.energy_height = basic
        .true_airspeed()
        .map(|tas| tas * tas / (2.0 * GRAVITY))
        .unwrap_or(0.0);
    altitude.te_altitude = altitude.nav_altitude.get().unwrap_or(0.0) + altitude.energy_height;
}

/// Vertical speed from the best source, each differenced against its own
/// previous valid sample.
fn compute_gps_vario(
    basic: &RawSample,
    last: &RawSample,
    last_gps: &RawSample,
    derived: &mut DerivedState,
) {
    let vario = &mut derived.vario.gps_vario;

    if basic.noncomp_vario.is_available() {
        *vario = basic.noncomp_vario;
        return;
    }

    for (current, previous) in [
        (&basic.pressure_altitude, &last.pressure_altitude),
        (&basic.baro_altitude, &last.baro_altitude),
    ] {
        if let (Some(h), Some(h0)) = (current.get(), previous.get()) {
            match current.freshness().time_difference(previous.freshness()) {
                Some(dt) if dt > 0.0 => vario.set_with((h - h0) / dt, current.freshness()),
                // No new altitude since last tick: keep the previous value.
                _ => {}
            }
            return;
        }
    }

    if let (Some(h), Some(h0), Some(now), Some(then)) = (
        basic.gps_altitude.get(),
        last_gps.gps_altitude.get(),
        basic.time(),
        last_gps.time(),
    ) {
        let dt = now - then;
        if dt > 0.0 {
            vario.set_with((h - h0) / dt, basic.gps_altitude.freshness());
        }
        return;
    }

    vario.clear();
}

fn compute_gps_vario_te(
    basic: &RawSample,
    last: &RawSample,
    derived: &mut DerivedState,
    previous_energy_height: f64,
) {
    let gps_vario = derived.vario.gps_vario.get().unwrap_or(0.0);
    let dt = match (basic.time(), last.time()) {
        (Some(now), Some(then)) => now - then,
        _ => 0.0,
    };

    derived.vario.gps_vario_te =
        if dt > 0.0 && basic.airspeed.is_available() && last.airspeed.is_available() {
            gps_vario + (derived.altitude.energy_height - previous_energy_height) / dt
        } else {
            gps_vario
        };
}

fn compute_brutto_netto(basic: &RawSample, derived: &mut DerivedState, settings: &ComputerSettings) {
    let vario = &mut derived.vario;

    vario.brutto_vario = basic
        .total_energy_vario
        .get()
        .unwrap_or(vario.gps_vario_te);

    vario.sink_rate = match basic.indicated_airspeed() {
        Some(ias) if derived.flight.flying => settings.polar.polar.sink_rate(ias),
        _ => 0.0,
    };

    vario.netto_vario = basic
        .netto_vario
        .get()
        .unwrap_or(vario.brutto_vario + vario.sink_rate);
}

/// Bank, load factor and pitch, measured where reported.
fn compute_dynamics(basic: &RawSample, derived: &mut DerivedState) {
    let tas = basic.true_airspeed().unwrap_or(0.0);
    let turn_rate = derived.circling.turn_rate_heading_smoothed;
    let flying = derived.flight.flying;
    let dynamics = &mut derived.dynamics;

    dynamics.bank_angle = match basic.attitude.bank_angle.get() {
        Some(bank) => bank,
        None if flying && tas > 0.0 => (turn_rate.to_radians() * tas / GRAVITY).atan().to_degrees(),
        None => 0.0,
    };

    dynamics.g_load = match basic.g_load.get() {
        Some(g) => g,
        None => 1.0 / dynamics.bank_angle.to_radians().cos().abs().max(0.001),
    };

    dynamics.pitch_angle = match (basic.attitude.pitch_angle.get(), basic.total_energy_vario.get()) {
        (Some(pitch), _) => pitch,
        (None, Some(te)) if tas > 0.0 => {
            let gps_vario = derived.vario.gps_vario.get().unwrap_or(te);
            (gps_vario - te).atan2(tas).to_degrees()
        }
        _ => 0.0,
    };
}
