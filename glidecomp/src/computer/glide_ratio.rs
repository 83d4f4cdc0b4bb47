//! Glide ratio estimation.
//!
//! The ratio itself explodes near zero sink, so every variant filters the
//! inverse glide angle (height loss over distance) and only inverts the
//! filtered value back into a ratio. Results above the configured ceiling
//! become [`INVALID_GLIDE_RATIO`].

use tracing::{debug, trace};

use crate::config::GlideSettings;
use crate::geo::GeoPoint;
use crate::sample::RawSample;
use crate::state::{DerivedState, INVALID_GLIDE_RATIO};
use crate::units::low_pass;

/// Low-pass factor of the instantaneous glide ratio.
pub const LD_FILTER: f64 = 0.1;

/// Low-pass factor of the airspeed/vario glide ratio.
pub const LD_VARIO_FILTER: f64 = 0.3;

/// Low-pass factor of the cruise glide ratio.
pub const CRUISE_LD_FILTER: f64 = 0.5;

/// Rotary records with less distance than this are treated as noise (m).
pub const MIN_RECORD_DISTANCE: f64 = 3.0;

/// Seconds between rotary records.
const RECORD_INTERVAL: f64 = 1.0;

/// Consecutive noisy records tolerated before the rotary buffer resets.
const MAX_RECORD_ERRORS: u32 = 2;

/// Whether `gr` holds a usable ratio.
pub fn is_valid_glide_ratio(gr: f64) -> bool {
    gr.is_finite() && gr != 0.0 && gr != INVALID_GLIDE_RATIO
}

/// Clamps a raw ratio: above `ceiling` is invalid, within ±1 snaps to ±1.
pub fn limit_glide_ratio(gr: f64, ceiling: f64) -> f64 {
    if !gr.is_finite() || gr.abs() > ceiling {
        INVALID_GLIDE_RATIO
    } else if gr.abs() < 1.0 {
        if gr < 0.0 {
            -1.0
        } else {
            1.0
        }
    } else {
        gr
    }
}

/// Folds one leg of `distance` metres with `height_loss` metres into `gr`.
///
/// The inverse angle is filtered, never the ratio. Starting from
/// [`INVALID_GLIDE_RATIO`] the first leg is taken as is. Degenerate legs
/// (no forward distance, non-finite input) leave `gr` untouched.
pub fn update_glide_ratio(gr: f64, distance: f64, height_loss: f64, factor: f64, ceiling: f64) -> f64 {
    if !(distance > 0.0) || !distance.is_finite() || !height_loss.is_finite() {
        return gr;
    }

    let leg_angle = height_loss / distance;
    let angle = if is_valid_glide_ratio(gr) {
        low_pass(1.0 / gr, leg_angle, factor)
    } else {
        leg_angle
    };

    if angle.abs() < 1.0 / INVALID_GLIDE_RATIO {
        INVALID_GLIDE_RATIO
    } else {
        limit_glide_ratio(1.0 / angle, ceiling)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Record {
    distance: f64,
    altitude: f64,
}

/// Fixed-capacity rotary buffer of per-second (distance, altitude) records.
///
/// The average ratio is the distance covered by the buffer over the
/// altitude lost between its oldest and newest record, and becomes
/// available once the buffer has wrapped.
#[derive(Debug, Clone)]
pub struct GlideRatioTracker {
    records: Vec<Record>,
    next: usize,
    filled: bool,
    total_distance: f64,
    errors: u32,
}

impl GlideRatioTracker {
    /// Creates a buffer holding `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            records: vec![Record::default(); capacity.max(1)],
            next: 0,
            filled: false,
            total_distance: 0.0,
            errors: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    pub fn reset(&mut self) {
        let capacity = self.capacity();
        *self = Self::new(capacity);
    }

    /// Adds a record covering `distance` metres ending at `altitude`.
    pub fn add(&mut self, distance: f64, altitude: f64) {
        if !(distance >= MIN_RECORD_DISTANCE) || !altitude.is_finite() {
            self.errors += 1;
            if self.errors > MAX_RECORD_ERRORS {
                trace!("Too many short glide records, resetting");
                self.reset();
            }
            return;
        }
        self.errors = 0;

        let slot = &mut self.records[self.next];
        self.total_distance += distance - slot.distance;
        *slot = Record { distance, altitude };

        self.next += 1;
        if self.next >= self.records.len() {
            self.next = 0;
            self.filled = true;
        }
    }

    /// Average ratio over the buffer, or [`INVALID_GLIDE_RATIO`].
    pub fn calculate(&self, ceiling: f64) -> f64 {
        if !self.filled {
            return INVALID_GLIDE_RATIO;
        }

        let len = self.records.len();
        let newest = self.records[(self.next + len - 1) % len];
        let oldest = self.records[self.next];
        let height_loss = oldest.altitude - newest.altitude;
        if height_loss == 0.0 {
            return INVALID_GLIDE_RATIO;
        }

        let gr = self.total_distance / height_loss;
        if !gr.is_finite() || gr.abs() > ceiling {
            INVALID_GLIDE_RATIO
        } else {
            gr
        }
    }
}

/// Updates every glide ratio variant once per tick.
#[derive(Debug, Clone)]
pub struct GlideRatioComputer {
    tracker: GlideRatioTracker,
    /// Time and position of the last rotary record.
    record_origin: Option<(f64, GeoPoint)>,
    last_location: Option<GeoPoint>,
    last_altitude: Option<f64>,
    last_circling: bool,
}

impl GlideRatioComputer {
    pub fn new(settings: &GlideSettings) -> Self {
        Self {
            tracker: GlideRatioTracker::new(settings.average_period),
            record_origin: None,
            last_location: None,
            last_altitude: None,
            last_circling: false,
        }
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.record_origin = None;
        self.last_location = None;
        self.last_altitude = None;
        self.last_circling = false;
    }

    pub fn tracker(&self) -> &GlideRatioTracker {
        &self.tracker
    }

    /// Updates `derived.glide` from this tick.
    ///
    /// `location_modified` tells whether this tick carries a new GPS fix.
    pub fn update(
        &mut self,
        basic: &RawSample,
        location_modified: bool,
        derived: &mut DerivedState,
        settings: &GlideSettings,
    ) {
        if self.tracker.capacity() != settings.average_period.max(1) {
            debug!(
                period = settings.average_period,
                "Average glide period changed, resizing"
            );
            self.tracker = GlideRatioTracker::new(settings.average_period);
            self.record_origin = None;
        }

        let ceiling = settings.max_glide_ratio;
        let flying = derived.flight.flying;
        let circling = derived.circling.circling;

        if circling != self.last_circling {
            self.tracker.reset();
            self.record_origin = None;
            self.last_circling = circling;
        }

        let location = basic.location.get();
        let altitude = derived.altitude.nav_altitude.get();

        if flying && location_modified {
            if let (Some(now), Some(then), Some(alt), Some(last_alt)) =
                (location, self.last_location, altitude, self.last_altitude)
            {
                let glide = &mut derived.glide;
                glide.ld = update_glide_ratio(glide.ld, then.distance(&now), last_alt - alt, LD_FILTER, ceiling);
            }
        }

        if flying {
            if let (Some(ias), Some(te)) = (basic.indicated_airspeed(), basic.total_energy_vario.get()) {
                let glide = &mut derived.glide;
                glide.ld_vario = update_glide_ratio(glide.ld_vario, ias, -te, LD_VARIO_FILTER, ceiling);
            }
        }

        if flying && !circling {
            let start = derived
                .circling
                .cruise_start
                .map(|leg| (leg.location, Some(leg.nav_altitude)))
                .unwrap_or((derived.flight.takeoff_location, derived.flight.takeoff_altitude));
            if let (Some(now), (Some(from), Some(start_alt)), Some(alt)) = (location, start, altitude) {
                let glide = &mut derived.glide;
                glide.cruise_ld = update_glide_ratio(
                    glide.cruise_ld,
                    from.distance(&now),
                    start_alt - alt,
                    CRUISE_LD_FILTER,
                    ceiling,
                );
            }
        }

        if flying && !circling {
            self.record(basic, location, altitude);
        }
        derived.glide.average_ld = self.tracker.calculate(ceiling);

        if location_modified {
            self.last_location = location;
            self.last_altitude = altitude;
        }
    }

    /// Adds one rotary record per elapsed second.
    fn record(&mut self, basic: &RawSample, location: Option<GeoPoint>, altitude: Option<f64>) {
        let (Some(time), Some(location), Some(altitude)) = (basic.time(), location, altitude) else {
            return;
        };

        match self.record_origin {
            Some((since, from)) if time >= since => {
                if time - since >= RECORD_INTERVAL {
                    self.tracker.add(from.distance(&location), altitude);
                    self.record_origin = Some((time, location));
                }
            }
            Some(_) => {
                debug!(time, "Time warp, restarting glide records");
                self.record_origin = Some((time, location));
            }
            None => self.record_origin = Some((time, location)),
        }
    }
}
