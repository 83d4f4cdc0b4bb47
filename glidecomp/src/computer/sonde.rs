//! Thermal sounding.
//!
//! Outside air temperature and humidity are collected in 100 m altitude
//! bands while flying. Each band compares its measured temperature with a
//! dry parcel lifted from the ground at the forecast maximum temperature:
//!
//! ```text
//! dry temperature  = forecast + DALR * (band altitude - ground)
//! thermal index    = dry temperature - measured temperature
//! ```
//!
//! Thermals are expected to stop where the thermal index drops below
//! [`THERMAL_INDEX_THRESHOLD`], and cumulus to form where the dry parcel
//! reaches its dew point. Both heights are interpolated between adjacent
//! bands.

use tracing::debug;

use crate::config::SondeSettings;
use crate::sample::RawSample;
use crate::state::DerivedState;

/// Number of altitude bands.
pub const NUM_LEVELS: usize = 100;

/// Height of one band in metres.
pub const HEIGHT_STEP: f64 = 100.0;

/// Dry adiabatic lapse rate, °C per metre.
pub const DALR: f64 = -0.00974;

/// Thermal index below which lift is considered exhausted, °C.
pub const THERMAL_INDEX_THRESHOLD: f64 = -1.6;

/// Slopes flatter than this are not extrapolated.
const MIN_SLOPE: f64 = 1.0e-3;

/// Dew point from temperature (°C) and relative humidity (%).
pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
    let log_ex = 0.66077 + 7.5 * temperature / (237.3 + temperature) + (humidity.log10() - 2.0);
    (log_ex - 0.66077) * 237.3 / (0.66077 + 7.5 - log_ex)
}

/// Statistics of one altitude band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SondeLevel {
    pub samples: u32,
    /// Mean measured temperature, °C.
    pub air_temperature: f64,
    /// Mean dew point, °C.
    pub dew_point: f64,
    /// Dry parcel temperature at this band, °C.
    pub dry_temperature: f64,
    pub thermal_index: f64,
    /// Thermal top interpolated from this band and the next.
    pub thermal_height: Option<f64>,
    /// Cloud base interpolated from this band and the next.
    pub cloud_base: Option<f64>,
}

impl SondeLevel {
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }

    fn add_measurement(&mut self, temperature: f64, humidity: f64) {
        let dew = dew_point(temperature, humidity);
        self.samples += 1;
        let n = f64::from(self.samples);
        self.air_temperature += (temperature - self.air_temperature) / n;
        self.dew_point += (dew - self.dew_point) / n;
    }

    fn update_thermal_index(&mut self, level: usize, ground: f64, forecast: f64) {
        let altitude = level as f64 * HEIGHT_STEP;
        self.dry_temperature = forecast + DALR * (altitude - ground);
        self.thermal_index = self.dry_temperature - self.air_temperature;
    }

    fn spread(&self) -> f64 {
        self.dry_temperature - self.dew_point
    }
}

/// The banded sounding and its current forecast.
#[derive(Debug, Clone)]
pub struct ThermalSonde {
    levels: Vec<SondeLevel>,
    last_level: Option<usize>,
    ground_altitude: f64,
    forecast_temperature: f64,
    thermal_height: Option<f64>,
    cloud_base: Option<f64>,
}

impl ThermalSonde {
    pub fn new(forecast_temperature: f64) -> Self {
        Self {
            levels: vec![SondeLevel::default(); NUM_LEVELS],
            last_level: None,
            ground_altitude: 0.0,
            forecast_temperature,
            thermal_height: None,
            cloud_base: None,
        }
    }

    /// Clears all bands, keeping the forecast temperature.
    pub fn reset(&mut self) {
        *self = Self::new(self.forecast_temperature);
    }

    pub fn levels(&self) -> &[SondeLevel] {
        &self.levels
    }

    pub fn forecast_temperature(&self) -> f64 {
        self.forecast_temperature
    }

    pub fn thermal_height(&self) -> Option<f64> {
        self.thermal_height
    }

    pub fn cloud_base(&self) -> Option<f64> {
        self.cloud_base
    }

    /// Changes the forecast and recomputes every band.
    pub fn set_forecast_temperature(&mut self, temperature: f64) {
        self.forecast_temperature = temperature;
        self.thermal_height = None;
        self.cloud_base = None;

        for (level, band) in self.levels.iter_mut().enumerate() {
            band.update_thermal_index(level, self.ground_altitude, temperature);
        }
        for level in 0..NUM_LEVELS - 1 {
            self.find_thermal_height(level);
            self.find_cloud_base(level);
        }

        debug!(
            forecast = temperature,
            thermal_height = ?self.thermal_height,
            cloud_base = ?self.cloud_base,
            "Sonde forecast recomputed"
        );
    }

    /// Records this tick's temperature and humidity and publishes the
    /// forecast into `derived.sonde`.
    pub fn update(&mut self, basic: &RawSample, derived: &mut DerivedState, settings: &SondeSettings) {
        if settings.forecast_temperature != self.forecast_temperature {
            self.set_forecast_temperature(settings.forecast_temperature);
        }

        if derived.flight.flying {
            let altitude = derived
                .altitude
                .baro_altitude
                .get()
                .or_else(|| derived.altitude.nav_altitude.get());
            if let (Some(altitude), Some(temperature), Some(humidity)) =
                (altitude, basic.temperature.get(), basic.humidity.get())
            {
                let ground = derived.flight.takeoff_altitude.unwrap_or(0.0);
                self.add_measurement(altitude, ground, temperature, humidity);
            }
        }

        derived.sonde.thermal_height = self.thermal_height;
        derived.sonde.cloud_base = self.cloud_base;
    }

    fn add_measurement(&mut self, altitude: f64, ground: f64, temperature: f64, humidity: f64) {
        if !temperature.is_finite() || humidity.is_nan() || humidity <= 0.0 || !altitude.is_finite() {
            return;
        }

        let level = (altitude.max(0.0) / HEIGHT_STEP) as usize;
        if level >= NUM_LEVELS {
            return;
        }

        let Some(last) = self.last_level else {
            self.last_level = Some(level);
            return;
        };
        if level.abs_diff(last) > 1 {
            // Skipped a band, wait for the next transition.
            self.last_level = Some(level);
            return;
        }
        if level == last {
            return;
        }

        self.ground_altitude = ground;
        let forecast = self.forecast_temperature;

        // Record against the band boundary just crossed.
        if level > last {
            let band = &mut self.levels[level];
            band.add_measurement(temperature, humidity);
            band.update_thermal_index(level, ground, forecast);
            self.find_thermal_height(level - 1);
            self.find_cloud_base(level - 1);
        } else {
            let band = &mut self.levels[level + 1];
            band.add_measurement(temperature, humidity);
            band.update_thermal_index(level + 1, ground, forecast);
            self.find_thermal_height(level);
            self.find_cloud_base(level);
        }

        self.last_level = Some(level);
    }

    fn find_thermal_height(&mut self, level: usize) {
        if let Some(height) = self.interpolate(level, |band| band.thermal_index, THERMAL_INDEX_THRESHOLD) {
            self.levels[level].thermal_height = height;
            if height.is_some() {
                self.thermal_height = height;
            }
        }
    }

    fn find_cloud_base(&mut self, level: usize) {
        if let Some(height) = self.interpolate(level, SondeLevel::spread, 0.0) {
            self.levels[level].cloud_base = height;
            if height.is_some() {
                self.cloud_base = height;
            }
        }
    }

    /// Altitude between `level` and `level + 1` where `value` crosses
    /// `threshold`.
    ///
    /// Returns `None` when either band has no data (band result untouched),
    /// `Some(None)` when the bands do not predict a crossing in the gap.
    fn interpolate(
        &self,
        level: usize,
        value: impl Fn(&SondeLevel) -> f64,
        threshold: f64,
    ) -> Option<Option<f64>> {
        let (lower, upper) = (self.levels.get(level)?, self.levels.get(level + 1)?);
        if !lower.has_data() || !upper.has_data() {
            return None;
        }

        let slope = value(upper) - value(lower);
        if slope.abs() < MIN_SLOPE {
            return Some(None);
        }

        let dlevel = (threshold - value(lower)) / slope;
        let next_has_data = self.levels.get(level + 2).is_some_and(SondeLevel::has_data);
        if dlevel > 1.0 && next_has_data {
            // The crossing belongs to a band that has its own data.
            return Some(None);
        }
        if dlevel > 0.0 {
            Some(Some((level as f64 + dlevel) * HEIGHT_STEP))
        } else {
            Some(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────────────────
    // Test Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Dry parcel temperature at `altitude` for a 25 °C forecast over
    /// sea-level ground.
    fn dry(altitude: f64) -> f64 {
        25.0 + DALR * altitude
    }

    /// Flies from `from` to `to` metres in 10 m steps, measuring
    /// `temperature(altitude)`.
    fn fly(sonde: &mut ThermalSonde, from: f64, to: f64, temperature: impl Fn(f64) -> f64) {
        let step: f64 = if to > from { 10.0 } else { -10.0 };
        let mut altitude = from;
        while (to - altitude) * step.signum() >= 0.0 {
            sonde.add_measurement(altitude, 0.0, temperature(altitude), 50.0);
            altitude += step;
        }
    }

    fn band_temperature(thermal_index: f64, level: usize) -> f64 {
        dry(level as f64 * HEIGHT_STEP) - thermal_index
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dew point
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_dew_point_saturated() {
        assert!((dew_point(15.0, 100.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_dew_point_dry_air() {
        // Magnus approximation, 20 °C at 50 % is about 9.3 °C.
        let dp = dew_point(20.0, 50.0);
        assert!((dp - 9.3).abs() < 0.2, "dew point {dp}");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bands
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_records_only_on_band_transition() {
        let mut sonde = ThermalSonde::new(25.0);
        fly(&mut sonde, 405.0, 495.0, |_| 20.0);
        assert!(sonde.levels().iter().all(|band| !band.has_data()));

        fly(&mut sonde, 495.0, 505.0, |_| 20.0);
        assert_eq!(sonde.levels()[5].samples, 1);
    }

    #[test]
    fn test_descent_records_band_above() {
        let mut sonde = ThermalSonde::new(25.0);
        fly(&mut sonde, 505.0, 495.0, |_| 20.0);
        assert_eq!(sonde.levels()[5].samples, 1);
        assert_eq!(sonde.levels()[4].samples, 0);
    }

    #[test]
    fn test_skipped_band_not_recorded() {
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(150.0, 0.0, 20.0, 50.0);
        sonde.add_measurement(450.0, 0.0, 20.0, 50.0);
        assert!(sonde.levels().iter().all(|band| !band.has_data()));
    }

    #[test]
    fn test_running_mean() {
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 20.0, 50.0);
        sonde.add_measurement(550.0, 0.0, 20.0, 50.0);
        sonde.add_measurement(450.0, 0.0, 22.0, 50.0);
        sonde.add_measurement(550.0, 0.0, 24.0, 50.0);
        let band = sonde.levels()[5];
        assert_eq!(band.samples, 3);
        assert!((band.air_temperature - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_invalid_humidity() {
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 20.0, 0.0);
        sonde.add_measurement(550.0, 0.0, 20.0, 0.0);
        assert!(!sonde.levels()[5].has_data());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Forecast
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_thermal_height_interpolated() {
        // Thermal index -0.6 at 500 m and -2.6 at 600 m crosses -1.6 half way.
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 0.0, 50.0);
        sonde.add_measurement(550.0, 0.0, band_temperature(-0.6, 5), 50.0);
        sonde.add_measurement(650.0, 0.0, band_temperature(-2.6, 6), 50.0);

        assert!((sonde.levels()[5].thermal_index + 0.6).abs() < 1e-9);
        assert!((sonde.levels()[6].thermal_index + 2.6).abs() < 1e-9);
        let height = sonde.thermal_height().unwrap();
        assert!((height - 550.0).abs() < 1e-6, "thermal height {height}");
    }

    #[test]
    fn test_flat_index_not_extrapolated() {
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 0.0, 50.0);
        sonde.add_measurement(550.0, 0.0, band_temperature(-0.6, 5), 50.0);
        sonde.add_measurement(650.0, 0.0, band_temperature(-0.6, 6), 50.0);
        assert_eq!(sonde.thermal_height(), None);
    }

    #[test]
    fn test_crossing_beyond_measured_band_rejected() {
        // Index falls 0.2 per band from -0.6 at 500 m. From band 5 the
        // crossing lies five bands up, past band 7 which has its own data.
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 0.0, 50.0);
        for level in 5..=7 {
            let index = -0.6 - 0.2 * (level - 5) as f64;
            sonde.add_measurement(level as f64 * 100.0 + 50.0, 0.0, band_temperature(index, level), 50.0);
        }
        sonde.set_forecast_temperature(25.0);

        assert_eq!(sonde.levels()[5].thermal_height, None);
        // The top pair may extrapolate into unmeasured air.
        let top = sonde.levels()[6].thermal_height.unwrap();
        assert!((top - 1000.0).abs() < 1e-6, "top {top}");
        assert_eq!(sonde.thermal_height(), Some(top));
    }

    #[test]
    fn test_cloud_base_where_spread_vanishes() {
        let mut sonde = ThermalSonde::new(25.0);
        // Saturated air makes dew point equal temperature, so the spread
        // equals the thermal index: 0.5 at 500 m, -0.5 at 600 m.
        sonde.add_measurement(450.0, 0.0, 0.0, 100.0);
        sonde.add_measurement(550.0, 0.0, band_temperature(0.5, 5), 100.0);
        sonde.add_measurement(650.0, 0.0, band_temperature(-0.5, 6), 100.0);
        let base = sonde.cloud_base().unwrap();
        assert!((base - 550.0).abs() < 1e-6, "cloud base {base}");
    }

    #[test]
    fn test_forecast_change_recomputes() {
        let mut sonde = ThermalSonde::new(25.0);
        sonde.add_measurement(450.0, 0.0, 0.0, 50.0);
        sonde.add_measurement(550.0, 0.0, band_temperature(-0.6, 5), 50.0);
        sonde.add_measurement(650.0, 0.0, band_temperature(-2.6, 6), 50.0);

        // One degree warmer shifts every index by +1, so -1.6 is now
        // reached exactly at band 6.
        sonde.set_forecast_temperature(26.0);
        assert!((sonde.levels()[5].thermal_index - 0.4).abs() < 1e-9);
        let height = sonde.thermal_height().unwrap();
        assert!((height - 600.0).abs() < 1e-6, "thermal height {height}");
    }

    #[test]
    fn test_update_publishes_only_when_flying() {
        let mut sonde = ThermalSonde::new(25.0);
        let settings = SondeSettings::default();
        let mut derived = DerivedState::new();

        for (i, altitude) in [450.0, 550.0, 650.0].into_iter().enumerate() {
            let mut basic = RawSample::at(i as f64);
            basic.temperature.set(15.0, basic.clock);
            basic.humidity.set(60.0, basic.clock);
            derived.altitude.nav_altitude.set(altitude, basic.clock);
            sonde.update(&basic, &mut derived, &settings);
        }
        assert!(sonde.levels().iter().all(|band| !band.has_data()));

        derived.flight.flying = true;
        for (i, level) in [4usize, 5, 6].into_iter().enumerate() {
            let mut basic = RawSample::at(10.0 + i as f64);
            let index = if level == 6 { -2.6 } else { -0.6 };
            basic.temperature.set(band_temperature(index, level), basic.clock);
            basic.humidity.set(60.0, basic.clock);
            derived
                .altitude
                .nav_altitude
                .set(level as f64 * 100.0 + 50.0, basic.clock);
            sonde.update(&basic, &mut derived, &settings);
        }
        let height = derived.sonde.thermal_height.unwrap();
        assert!((height - 550.0).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_setting_applied_on_update() {
        let mut sonde = ThermalSonde::new(25.0);
        let settings = SondeSettings {
            forecast_temperature: 30.0,
        };
        let mut derived = DerivedState::new();
        sonde.update(&RawSample::at(0.0), &mut derived, &settings);
        assert_eq!(sonde.forecast_temperature(), 30.0);
    }
}
