//! Settings structs for every configuration group.
//!
//! Each struct maps to one `[section]` of the settings file. These are
//! pure data types; parsing lives in [`super::parser`].

use std::time::Duration;

use crate::atmosphere::AtmosphericPressure;
use crate::freshness::Stamped;
use crate::polar::GlidePolar;
use crate::units::SpeedVector;

/// Complete configuration read by every tick.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use glidecomp::atmosphere::AtmosphericPressure;
/// use glidecomp::config::ComputerSettings;
/// use glidecomp::units::SpeedVector;
///
/// let settings = ComputerSettings::new()
///     .with_qnh(AtmosphericPressure::from_hectopascal(1020.0))
///     .with_forecast_temperature(28.0)
///     .with_manual_wind(SpeedVector::new(270.0, 5.0), Duration::from_secs(1));
///
/// assert_eq!(settings.sonde.forecast_temperature, 28.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputerSettings {
    pub altitude: AltitudeSettings,
    pub circling: CirclingSettings,
    pub wind: WindSettings,
    pub sonde: SondeSettings,
    pub glide: GlideSettings,
    pub polar: PolarSettings,
}

/// `[altitude]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeSettings {
    /// Prefer baro over GPS altitude for navigation.
    pub nav_baro_altitude: bool,
    /// Local reference pressure, if set.
    pub qnh: Option<AtmosphericPressure>,
}

/// `[circling]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclingSettings {
    /// deg/s
    pub min_turn_rate: f64,
    /// Seconds of turning before entering climb.
    pub cruise_climb_switch: f64,
    /// Seconds of straight flight before entering cruise.
    pub climb_cruise_switch: f64,
    /// Let the device flight-mode switch force the mode.
    pub external_trigger: bool,
}

/// `[wind]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSettings {
    /// Estimate wind from circling ground speed variation.
    pub circling_wind: bool,
    /// Estimate wind with the EKF during straight flight.
    pub zig_zag_wind: bool,
    /// Accept wind reported by the device.
    pub external_wind: bool,
    /// Pilot-entered wind; the stamp is the time of the edit.
    pub manual_wind: Stamped<SpeedVector>,
}

impl WindSettings {
    /// Whether any automatic estimator is enabled.
    pub fn auto_wind(&self) -> bool {
        self.circling_wind || self.zig_zag_wind
    }
}

/// `[sonde]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SondeSettings {
    /// Forecast maximum ground temperature in °C.
    pub forecast_temperature: f64,
}

/// `[glide]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlideSettings {
    /// Ratios above this are reported as invalid.
    pub max_glide_ratio: f64,
    /// Seconds covered by the average glide ratio.
    pub average_period: usize,
}

/// `[polar]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarSettings {
    pub polar: GlidePolar,
    /// m/s
    pub takeoff_speed: f64,
}

impl ComputerSettings {
    /// Settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local reference pressure.
    pub fn with_qnh(mut self, qnh: AtmosphericPressure) -> Self {
        self.altitude.qnh = Some(qnh);
        self
    }

    /// Choose between baro and GPS altitude for navigation.
    pub fn with_nav_baro_altitude(mut self, enabled: bool) -> Self {
        self.altitude.nav_baro_altitude = enabled;
        self
    }

    /// Set the turning threshold in deg/s.
    pub fn with_min_turn_rate(mut self, rate: f64) -> Self {
        self.circling.min_turn_rate = rate;
        self
    }

    /// Set both debounce periods in seconds.
    pub fn with_circling_switch_times(mut self, cruise_to_climb: f64, climb_to_cruise: f64) -> Self {
        self.circling.cruise_climb_switch = cruise_to_climb;
        self.circling.climb_cruise_switch = climb_to_cruise;
        self
    }

    /// Follow the device flight-mode switch.
    pub fn with_external_trigger(mut self, enabled: bool) -> Self {
        self.circling.external_trigger = enabled;
        self
    }

    /// Enable or disable the automatic estimators.
    pub fn with_auto_wind(mut self, circling: bool, zig_zag: bool) -> Self {
        self.wind.circling_wind = circling;
        self.wind.zig_zag_wind = zig_zag;
        self
    }

    /// Accept or ignore wind reported by the device.
    pub fn with_external_wind(mut self, enabled: bool) -> Self {
        self.wind.external_wind = enabled;
        self
    }

    /// Record a pilot wind edit made at `clock`.
    pub fn with_manual_wind(mut self, wind: SpeedVector, clock: Duration) -> Self {
        self.wind.manual_wind.set(wind, clock);
        self
    }

    pub fn with_forecast_temperature(mut self, celsius: f64) -> Self {
        self.sonde.forecast_temperature = celsius;
        self
    }

    pub fn with_max_glide_ratio(mut self, ceiling: f64) -> Self {
        self.glide.max_glide_ratio = ceiling;
        self
    }

    /// Set the average glide ratio window, clamped to its valid range.
    pub fn with_average_glide_period(mut self, seconds: usize) -> Self {
        self.glide.average_period = super::defaults::clamp_average_period(seconds);
        self
    }

    pub fn with_polar(mut self, polar: GlidePolar) -> Self {
        self.polar.polar = polar;
        self
    }

    pub fn with_takeoff_speed(mut self, speed: f64) -> Self {
        self.polar.takeoff_speed = speed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    #[test]
    fn test_default_settings() {
        let settings = ComputerSettings::default();
        assert!(settings.altitude.nav_baro_altitude);
        assert!(settings.altitude.qnh.is_none());
        assert_eq!(settings.circling.min_turn_rate, DEFAULT_MIN_TURN_RATE);
        assert_eq!(settings.circling.cruise_climb_switch, 15.0);
        assert_eq!(settings.circling.climb_cruise_switch, 10.0);
        assert!(settings.wind.auto_wind());
        assert!(!settings.wind.manual_wind.is_available());
        assert_eq!(settings.sonde.forecast_temperature, 25.0);
        assert_eq!(settings.glide.average_period, 120);
        assert_eq!(settings.polar.takeoff_speed, 10.0);
    }

    #[test]
    fn test_new_equals_default() {
        assert_eq!(ComputerSettings::new(), ComputerSettings::default());
    }

    #[test]
    fn test_builder_chain() {
        let settings = ComputerSettings::new()
            .with_qnh(AtmosphericPressure::from_hectopascal(1000.0))
            .with_nav_baro_altitude(false)
            .with_min_turn_rate(6.0)
            .with_circling_switch_times(8.0, 5.0)
            .with_external_trigger(true)
            .with_auto_wind(false, true)
            .with_external_wind(false)
            .with_forecast_temperature(30.0)
            .with_max_glide_ratio(150.0)
            .with_takeoff_speed(12.0);

        assert_eq!(
            settings.altitude.qnh,
            Some(AtmosphericPressure::from_hectopascal(1000.0))
        );
        assert!(!settings.altitude.nav_baro_altitude);
        assert_eq!(settings.circling.min_turn_rate, 6.0);
        assert_eq!(settings.circling.cruise_climb_switch, 8.0);
        assert_eq!(settings.circling.climb_cruise_switch, 5.0);
        assert!(settings.circling.external_trigger);
        assert!(!settings.wind.circling_wind);
        assert!(settings.wind.zig_zag_wind);
        assert!(!settings.wind.external_wind);
        assert_eq!(settings.sonde.forecast_temperature, 30.0);
        assert_eq!(settings.glide.max_glide_ratio, 150.0);
        assert_eq!(settings.polar.takeoff_speed, 12.0);
    }

    #[test]
    fn test_manual_wind_is_stamped() {
        let settings = ComputerSettings::new()
            .with_manual_wind(SpeedVector::new(90.0, 4.0), Duration::from_secs(30));
        assert_eq!(
            settings.wind.manual_wind.get(),
            Some(SpeedVector::new(90.0, 4.0))
        );
        assert_eq!(
            settings.wind.manual_wind.freshness().last(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_average_period_is_clamped() {
        let settings = ComputerSettings::new().with_average_glide_period(1000);
        assert_eq!(settings.glide.average_period, MAX_AVERAGE_GLIDE_PERIOD);
    }
}
