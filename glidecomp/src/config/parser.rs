//! INI parsing logic for converting `Ini` → `ComputerSettings`.
//!
//! This is the single place where INI key names are mapped to struct
//! fields.

use std::time::Duration;

use ini::Ini;

use super::defaults::clamp_average_period;
use super::file::ConfigFileError;
use super::settings::ComputerSettings;
use crate::atmosphere::AtmosphericPressure;
use crate::polar::GlidePolar;
use crate::units::SpeedVector;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(section, key, value, "must be a number"))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Parses `"80 0.62, 120 0.85, 180 2.0"` (km/h and m/s pairs).
fn parse_polar(value: &str) -> Result<GlidePolar, ConfigFileError> {
    let err = || {
        invalid(
            "polar",
            "points",
            value,
            "expected three 'speed sink' pairs like '80 0.62, 120 0.85, 180 2.0'",
        )
    };

    let points = value
        .split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace().map(str::parse::<f64>);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(speed)), Some(Ok(sink)), None) if speed > 0.0 && sink > 0.0 => {
                    Ok((speed, sink))
                }
                _ => Err(err()),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    match points.as_slice() {
        [p1, p2, p3] => Ok(GlidePolar::from_points(*p1, *p2, *p3)),
        _ => Err(err()),
    }
}

/// Parse an `Ini` object into `ComputerSettings`.
///
/// Starts from `ComputerSettings::default()` and overlays any values found
/// in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ComputerSettings, ConfigFileError> {
    let mut settings = ComputerSettings::default();

    // [altitude] section
    if let Some(section) = ini.section(Some("altitude")) {
        if let Some(v) = section.get("nav_baro_altitude") {
            settings.altitude.nav_baro_altitude = parse_bool("altitude", "nav_baro_altitude", v)?;
        }
        if let Some(v) = section.get("qnh") {
            if !v.trim().is_empty() {
                let qnh = AtmosphericPressure::from_hectopascal(parse_number("altitude", "qnh", v)?);
                if !qnh.is_plausible() {
                    return Err(invalid(
                        "altitude",
                        "qnh",
                        v,
                        "must be between 850 and 1100 hPa",
                    ));
                }
                settings.altitude.qnh = Some(qnh);
            }
        }
    }

    // [circling] section
    if let Some(section) = ini.section(Some("circling")) {
        if let Some(v) = section.get("min_turn_rate") {
            let rate = parse_number("circling", "min_turn_rate", v)?;
            if rate <= 0.0 {
                return Err(invalid("circling", "min_turn_rate", v, "must be positive"));
            }
            settings.circling.min_turn_rate = rate;
        }
        if let Some(v) = section.get("cruise_climb_switch") {
            let secs = parse_number("circling", "cruise_climb_switch", v)?;
            if secs < 0.0 {
                return Err(invalid("circling", "cruise_climb_switch", v, "must not be negative"));
            }
            settings.circling.cruise_climb_switch = secs;
        }
        if let Some(v) = section.get("climb_cruise_switch") {
            let secs = parse_number("circling", "climb_cruise_switch", v)?;
            if secs < 0.0 {
                return Err(invalid("circling", "climb_cruise_switch", v, "must not be negative"));
            }
            settings.circling.climb_cruise_switch = secs;
        }
        if let Some(v) = section.get("external_trigger") {
            settings.circling.external_trigger = parse_bool("circling", "external_trigger", v)?;
        }
    }

    // [wind] section
    if let Some(section) = ini.section(Some("wind")) {
        if let Some(v) = section.get("circling_wind") {
            settings.wind.circling_wind = parse_bool("wind", "circling_wind", v)?;
        }
        if let Some(v) = section.get("zig_zag_wind") {
            settings.wind.zig_zag_wind = parse_bool("wind", "zig_zag_wind", v)?;
        }
        if let Some(v) = section.get("external_wind") {
            settings.wind.external_wind = parse_bool("wind", "external_wind", v)?;
        }
        let bearing = section.get("manual_bearing");
        let speed = section.get("manual_speed");
        match (bearing, speed) {
            (Some(b), Some(s)) => {
                let bearing = parse_number("wind", "manual_bearing", b)?;
                let speed = parse_number("wind", "manual_speed", s)?;
                if speed < 0.0 {
                    return Err(invalid("wind", "manual_speed", s, "must not be negative"));
                }
                // A wind from the settings file counts as edited at startup.
                settings
                    .wind
                    .manual_wind
                    .set(SpeedVector::new(bearing, speed), Duration::ZERO);
            }
            (Some(b), None) => {
                return Err(invalid("wind", "manual_bearing", b, "requires manual_speed"));
            }
            (None, Some(s)) => {
                return Err(invalid("wind", "manual_speed", s, "requires manual_bearing"));
            }
            (None, None) => {}
        }
    }

    // [sonde] section
    if let Some(section) = ini.section(Some("sonde")) {
        if let Some(v) = section.get("forecast_temperature") {
            settings.sonde.forecast_temperature = parse_number("sonde", "forecast_temperature", v)?;
        }
    }

    // [glide] section
    if let Some(section) = ini.section(Some("glide")) {
        if let Some(v) = section.get("max_glide_ratio") {
            let ceiling = parse_number("glide", "max_glide_ratio", v)?;
            if ceiling <= 1.0 {
                return Err(invalid("glide", "max_glide_ratio", v, "must be greater than 1"));
            }
            settings.glide.max_glide_ratio = ceiling;
        }
        if let Some(v) = section.get("average_period") {
            let period: usize = v
                .trim()
                .parse()
                .map_err(|_| invalid("glide", "average_period", v, "must be a positive integer (seconds)"))?;
            settings.glide.average_period = clamp_average_period(period);
        }
    }

    // [polar] section
    if let Some(section) = ini.section(Some("polar")) {
        if let Some(v) = section.get("points") {
            settings.polar.polar = parse_polar(v)?;
        }
        if let Some(v) = section.get("takeoff_speed") {
            let speed = parse_number("polar", "takeoff_speed", v)?;
            if speed <= 0.0 {
                return Err(invalid("polar", "takeoff_speed", v, "must be positive"));
            }
            settings.polar.takeoff_speed = speed;
        }
    }

    Ok(settings)
}
