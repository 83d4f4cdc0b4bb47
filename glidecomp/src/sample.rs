//! The per-tick sensor snapshot.
//!
//! A [`RawSample`] is produced by the device layer once per tick. Every
//! measurement is a [`Stamped`] value so a missing sensor is simply an
//! invalid stamp. The engine works on a private copy of the sample; the
//! caller's snapshot is never modified.

use std::fmt;
use std::time::Duration;

use crate::atmosphere::AtmosphericPressure;
use crate::freshness::Stamped;
use crate::geo::GeoPoint;
use crate::units::SpeedVector;

/// Maximum age of a GPS fix (location, track, ground speed, GPS altitude).
pub const GPS_MAX_AGE: Duration = Duration::from_secs(10);

/// Maximum age of air data (airspeed, pressures, vario, temperature).
pub const AIR_DATA_MAX_AGE: Duration = Duration::from_secs(30);

/// Maximum age of attitude and acceleration readings.
pub const ATTITUDE_MAX_AGE: Duration = Duration::from_secs(5);

/// Maximum age of a device-reported wind.
pub const EXTERNAL_WIND_MAX_AGE: Duration = Duration::from_secs(600);

/// Reported airspeed pair in m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Airspeed {
    pub true_airspeed: f64,
    pub indicated_airspeed: f64,
}

impl Airspeed {
    pub fn new(true_airspeed: f64, indicated_airspeed: f64) -> Self {
        Self {
            true_airspeed,
            indicated_airspeed,
        }
    }
}

/// Position of a device flight-mode switch (vario "speed to fly" switch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlightModeSwitch {
    #[default]
    Cruise,
    Circling,
}

impl fmt::Display for FlightModeSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightModeSwitch::Cruise => write!(f, "Cruise"),
            FlightModeSwitch::Circling => write!(f, "Circling"),
        }
    }
}

/// Attitude as reported by an AHRS.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    /// True heading in degrees.
    pub heading: Stamped<f64>,
    /// Bank angle in degrees, positive right.
    pub bank_angle: Stamped<f64>,
    /// Pitch angle in degrees, positive nose up.
    pub pitch_angle: Stamped<f64>,
}

/// One snapshot of all sensor-derived quantities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    /// Monotonic clock the freshness stamps are taken from.
    pub clock: Duration,
    /// Fix time in seconds (time of day or since start).
    pub time: Stamped<f64>,

    pub location: Stamped<GeoPoint>,
    /// Track over ground, degrees true.
    pub track: Stamped<f64>,
    /// m/s
    pub ground_speed: Stamped<f64>,
    /// Metres above MSL from the GPS.
    pub gps_altitude: Stamped<f64>,

    /// Use [`RawSample::set_measured_airspeed`] for readings from a real
    /// sensor so `airspeed_real` is raised with the stamp.
    pub airspeed: Stamped<Airspeed>,
    /// Whether `airspeed` comes from a sensor. Defaults to `false`, which
    /// keeps the airspeed out of the wind estimators and the TAS
    /// compensation of the circling fit. Dynamic pressure readings raise it
    /// when the airspeed is derived from them.
    pub airspeed_real: bool,
    /// Pitot minus static pressure in Pa.
    pub dynamic_pressure: Stamped<f64>,

    pub static_pressure: Stamped<AtmosphericPressure>,
    /// Altitude over the 1013.25 hPa surface in metres.
    pub pressure_altitude: Stamped<f64>,
    /// Altitude over the local reference pressure in metres.
    pub baro_altitude: Stamped<f64>,

    /// Uncompensated vario in m/s.
    pub noncomp_vario: Stamped<f64>,
    /// Total-energy compensated vario in m/s.
    pub total_energy_vario: Stamped<f64>,
    pub netto_vario: Stamped<f64>,

    /// Outside air temperature in °C.
    pub temperature: Stamped<f64>,
    /// Relative humidity in percent.
    pub humidity: Stamped<f64>,

    pub attitude: Attitude,
    pub g_load: Stamped<f64>,

    pub external_wind: Stamped<SpeedVector>,
    pub switch_state: Stamped<FlightModeSwitch>,
}

impl RawSample {
    /// An otherwise empty sample whose clock and fix time are both `time`
    /// seconds.
    pub fn at(time: f64) -> Self {
        let clock = Duration::from_secs_f64(time.max(0.0));
        Self {
            clock,
            time: Stamped::new(time, clock),
            ..Self::default()
        }
    }

    /// Fix time, if available.
    pub fn time(&self) -> Option<f64> {
        self.time.get()
    }

    /// True airspeed, if available.
    pub fn true_airspeed(&self) -> Option<f64> {
        self.airspeed.get().map(|a| a.true_airspeed)
    }

    /// Indicated airspeed, if available.
    pub fn indicated_airspeed(&self) -> Option<f64> {
        self.airspeed.get().map(|a| a.indicated_airspeed)
    }

    /// Stores an airspeed reported by a sensor and marks it as measured.
    pub fn set_measured_airspeed(&mut self, airspeed: Airspeed, clock: Duration) {
        self.airspeed.set(airspeed, clock);
        self.airspeed_real = true;
    }

    /// Airspeed that was actually measured, not reconstructed.
    pub fn real_true_airspeed(&self) -> Option<f64> {
        self.true_airspeed().filter(|_| self.airspeed_real)
    }

    /// Clears every measurement older than its maximum age at `self.clock`.
    pub fn expire(&mut self) {
        let now = self.clock;

        self.location.expire(now, GPS_MAX_AGE);
        self.track.expire(now, GPS_MAX_AGE);
        self.ground_speed.expire(now, GPS_MAX_AGE);
        self.gps_altitude.expire(now, GPS_MAX_AGE);

        self.airspeed.expire(now, AIR_DATA_MAX_AGE);
        self.dynamic_pressure.expire(now, AIR_DATA_MAX_AGE);
        self.static_pressure.expire(now, AIR_DATA_MAX_AGE);
        self.pressure_altitude.expire(now, AIR_DATA_MAX_AGE);
        self.baro_altitude.expire(now, AIR_DATA_MAX_AGE);
        self.noncomp_vario.expire(now, AIR_DATA_MAX_AGE);
        self.total_energy_vario.expire(now, AIR_DATA_MAX_AGE);
        self.netto_vario.expire(now, AIR_DATA_MAX_AGE);
        self.temperature.expire(now, AIR_DATA_MAX_AGE);
        self.humidity.expire(now, AIR_DATA_MAX_AGE);
        self.switch_state.expire(now, AIR_DATA_MAX_AGE);

        self.attitude.heading.expire(now, ATTITUDE_MAX_AGE);
        self.attitude.bank_angle.expire(now, ATTITUDE_MAX_AGE);
        self.attitude.pitch_angle.expire(now, ATTITUDE_MAX_AGE);
        self.g_load.expire(now, ATTITUDE_MAX_AGE);

        self.external_wind.expire(now, EXTERNAL_WIND_MAX_AGE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_sets_clock_and_time() {
        let sample = RawSample::at(12.5);
        assert_eq!(sample.clock, Duration::from_secs_f64(12.5));
        assert_eq!(sample.time(), Some(12.5));
        assert!(!sample.location.is_available());
    }

    #[test]
    fn test_real_airspeed_requires_flag() {
        let mut sample = RawSample::at(1.0);
        sample.airspeed.set(Airspeed::new(30.0, 28.0), sample.clock);
        assert_eq!(sample.true_airspeed(), Some(30.0));
        assert_eq!(sample.indicated_airspeed(), Some(28.0));
        assert_eq!(sample.real_true_airspeed(), None);

        sample.airspeed_real = true;
        assert_eq!(sample.real_true_airspeed(), Some(30.0));
    }

    #[test]
    fn test_set_measured_airspeed_marks_real() {
        let mut sample = RawSample::at(3.0);
        sample.set_measured_airspeed(Airspeed::new(27.0, 25.0), sample.clock);

        assert!(sample.airspeed_real);
        assert_eq!(sample.real_true_airspeed(), Some(27.0));
        assert_eq!(sample.airspeed.freshness(), sample.time.freshness());
    }

    #[test]
    fn test_expire_drops_stale_measurements() {
        let mut sample = RawSample::at(0.0);
        sample.location.set(GeoPoint::default(), Duration::ZERO);
        sample.temperature.set(20.0, Duration::ZERO);
        sample.attitude.heading.set(90.0, Duration::ZERO);

        sample.clock = Duration::from_secs(8);
        sample.expire();
        assert!(sample.location.is_available());
        assert!(sample.temperature.is_available());
        assert!(!sample.attitude.heading.is_available());

        sample.clock = Duration::from_secs(15);
        sample.expire();
        assert!(!sample.location.is_available());
        assert!(sample.temperature.is_available());
    }

    #[test]
    fn test_switch_display() {
        assert_eq!(FlightModeSwitch::Circling.to_string(), "Circling");
        assert_eq!(FlightModeSwitch::Cruise.to_string(), "Cruise");
    }
}
