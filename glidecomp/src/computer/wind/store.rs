//! Quality, age and altitude weighted store of wind measurements.

use tracing::debug;

use super::{WindEstimate, MAX_QUALITY};
use crate::units::SpeedVector;

/// Capacity of [`WindMeasurementList`].
pub const MAX_MEASUREMENTS: usize = 200;

/// Altitude change (m) that triggers a recalculation.
const RECALC_ALTITUDE_CHANGE: f64 = 100.0;

/// One stored estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindMeasurement {
    pub vector: SpeedVector,
    pub quality: u32,
    /// Fix time, seconds.
    pub time: f64,
    /// Metres.
    pub altitude: f64,
}

impl WindMeasurement {
    /// Replacement priority when the list is full; low quality and old
    /// entries score highest.
    fn score(&self, now: f64) -> f64 {
        (6.0 - self.quality as f64) * 600.0 + (now - self.time)
    }
}

/// Bounded list of measurements with a weighted mean lookup.
#[derive(Debug, Clone, Default)]
pub struct WindMeasurementList {
    measurements: Vec<WindMeasurement>,
}

impl WindMeasurementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn clear(&mut self) {
        self.measurements.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindMeasurement> {
        self.measurements.iter()
    }

    /// Adds a measurement. A full list replaces its highest scoring entry.
    pub fn add(&mut self, time: f64, vector: SpeedVector, quality: u32, altitude: f64) {
        let measurement = WindMeasurement {
            vector,
            quality,
            time,
            altitude,
        };

        if self.measurements.len() < MAX_MEASUREMENTS {
            self.measurements.push(measurement);
            return;
        }

        let worst = self
            .measurements
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.score(time).total_cmp(&b.score(time)))
            .map(|(index, _)| index);
        if let Some(index) = worst {
            self.measurements[index] = measurement;
        }
    }

    /// Weighted mean of the measurements relevant at `time` and `altitude`.
    ///
    /// Only entries within 1000 m of altitude and younger than one hour
    /// contribute. Weights fall off with altitude difference and age and
    /// grow with quality.
    pub fn get_wind(&self, time: f64, altitude: f64) -> Option<SpeedVector> {
        let mut total = (0.0, 0.0);
        let mut total_weight = 0.0;

        for m in &self.measurements {
            let altitude_diff = (altitude - m.altitude) / 1000.0;
            let time_diff = (time - m.time) / 3600.0;
            if altitude_diff.abs() >= 1.0 || !(0.0..1.0).contains(&time_diff) {
                continue;
            }

            let quality_weight = m.quality.min(MAX_QUALITY) as f64 * 100.0 / MAX_QUALITY as f64;
            let altitude_weight = (2.0 / (altitude_diff * altitude_diff + 1.0) - 1.0) * 100.0;
            let time_weight = 0.0025 * (1.0 - time_diff) / (time_diff * time_diff + 0.0025) * 100.0;
            let weight = quality_weight * altitude_weight * time_weight;

            let (x, y) = m.vector.to_xy();
            total.0 += x * weight;
            total.1 += y * weight;
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return None;
        }
        Some(SpeedVector::from_xy(total.0 / total_weight, total.1 / total_weight))
    }
}

/// Outcome of [`WindStore::slot_altitude`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindRecalculation {
    /// Nothing new and no significant altitude change.
    Unchanged,
    /// Fresh weighted mean.
    Wind(SpeedVector),
    /// Recalculated, but no measurement is close enough in age and altitude.
    Unavailable,
}

/// Measurement list plus the recalculation policy.
#[derive(Debug, Clone, Default)]
pub struct WindStore {
    list: WindMeasurementList,
    updated: bool,
    last_altitude: Option<f64>,
}

impl WindStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.list.clear();
        self.updated = false;
        self.last_altitude = None;
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn measurements(&self) -> &WindMeasurementList {
        &self.list
    }

    /// Stores an estimator result.
    pub fn slot_measurement(&mut self, time: f64, estimate: WindEstimate, altitude: f64) {
        self.list.add(time, estimate.wind, estimate.quality, altitude);
        self.updated = true;
    }

    /// Recalculates the weighted wind after new measurements or a climb or
    /// descent of more than 100 m.
    pub fn slot_altitude(&mut self, time: f64, altitude: f64) -> WindRecalculation {
        let moved = self
            .last_altitude
            .map_or(true, |last| (altitude - last).abs() > RECALC_ALTITUDE_CHANGE);
        if !self.updated && !moved {
            return WindRecalculation::Unchanged;
        }

        self.last_altitude = Some(altitude);
        self.updated = false;

        match self.list.get_wind(time, altitude) {
            Some(wind) => {
                debug!(
                    bearing = wind.bearing,
                    speed = wind.norm,
                    altitude,
                    measurements = self.list.len(),
                    "Wind recalculated"
                );
                WindRecalculation::Wind(wind)
            }
            None => WindRecalculation::Unavailable,
        }
    }
}
