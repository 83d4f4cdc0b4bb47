//! Default values and constants for all settings.
//!
//! Contains all `DEFAULT_*` constants, range clamps, and the `Default`
//! implementations of the settings structs.

use crate::freshness::Stamped;
use crate::polar::GlidePolar;

use super::settings::*;

// =============================================================================
// Altitude
// =============================================================================

/// Navigate on baro altitude when available.
pub const DEFAULT_NAV_BARO_ALTITUDE: bool = true;

// =============================================================================
// Circling
// =============================================================================

/// Turn rate in deg/s above which the aircraft counts as turning.
pub const DEFAULT_MIN_TURN_RATE: f64 = 4.0;

/// Seconds of turning before cruise becomes climb.
pub const DEFAULT_CRUISE_CLIMB_SWITCH: f64 = 15.0;

/// Seconds of straight flight before climb becomes cruise.
pub const DEFAULT_CLIMB_CRUISE_SWITCH: f64 = 10.0;

/// Follow the device flight-mode switch.
pub const DEFAULT_EXTERNAL_TRIGGER: bool = false;

// =============================================================================
// Wind
// =============================================================================

pub const DEFAULT_CIRCLING_WIND: bool = true;
pub const DEFAULT_ZIG_ZAG_WIND: bool = true;
pub const DEFAULT_EXTERNAL_WIND: bool = true;

// =============================================================================
// Sonde
// =============================================================================

/// Forecast maximum ground temperature in °C.
pub const DEFAULT_FORECAST_TEMPERATURE: f64 = 25.0;

// =============================================================================
// Glide ratio
// =============================================================================

/// Glide ratios above this are reported as invalid.
pub const DEFAULT_MAX_GLIDE_RATIO: f64 = 200.0;

/// Seconds of flight covered by the average glide ratio.
pub const DEFAULT_AVERAGE_GLIDE_PERIOD: usize = 120;

/// Upper bound of the average glide ratio window.
pub const MAX_AVERAGE_GLIDE_PERIOD: usize = 180;

// =============================================================================
// Polar / flight detection
// =============================================================================

/// Speed in m/s above which the aircraft is considered moving.
pub const DEFAULT_TAKEOFF_SPEED: f64 = 10.0;

// =============================================================================
// Settings file
// =============================================================================

/// Directory under the home directory holding the settings file.
pub const DEFAULT_SETTINGS_DIR: &str = ".glidecomp";

/// Settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.ini";

/// Clamps the average glide ratio window to `1..=MAX_AVERAGE_GLIDE_PERIOD`
/// and logs a warning if clamped.
pub(crate) fn clamp_average_period(value: usize) -> usize {
    if value == 0 {
        tracing::warn!(requested = value, "average glide period of zero, using 1");
        1
    } else if value > MAX_AVERAGE_GLIDE_PERIOD {
        tracing::warn!(
            requested = value,
            max = MAX_AVERAGE_GLIDE_PERIOD,
            "average glide period above maximum, clamping to {}",
            MAX_AVERAGE_GLIDE_PERIOD
        );
        MAX_AVERAGE_GLIDE_PERIOD
    } else {
        value
    }
}

impl Default for AltitudeSettings {
    fn default() -> Self {
        Self {
            nav_baro_altitude: DEFAULT_NAV_BARO_ALTITUDE,
            qnh: None,
        }
    }
}

impl Default for CirclingSettings {
    fn default() -> Self {
        Self {
            min_turn_rate: DEFAULT_MIN_TURN_RATE,
            cruise_climb_switch: DEFAULT_CRUISE_CLIMB_SWITCH,
            climb_cruise_switch: DEFAULT_CLIMB_CRUISE_SWITCH,
            external_trigger: DEFAULT_EXTERNAL_TRIGGER,
        }
    }
}

impl Default for WindSettings {
    fn default() -> Self {
        Self {
            circling_wind: DEFAULT_CIRCLING_WIND,
            zig_zag_wind: DEFAULT_ZIG_ZAG_WIND,
            external_wind: DEFAULT_EXTERNAL_WIND,
            manual_wind: Stamped::default(),
        }
    }
}

impl Default for SondeSettings {
    fn default() -> Self {
        Self {
            forecast_temperature: DEFAULT_FORECAST_TEMPERATURE,
        }
    }
}

impl Default for GlideSettings {
    fn default() -> Self {
        Self {
            max_glide_ratio: DEFAULT_MAX_GLIDE_RATIO,
            average_period: DEFAULT_AVERAGE_GLIDE_PERIOD,
        }
    }
}

impl Default for PolarSettings {
    fn default() -> Self {
        Self {
            polar: GlidePolar::default(),
            takeoff_speed: DEFAULT_TAKEOFF_SPEED,
        }
    }
}
