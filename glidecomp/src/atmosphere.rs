//! ISA pressure/altitude conversions and air density.
//!
//! Pressures are held as [`AtmosphericPressure`] in hectopascal. Altitude
//! conversions use the standard-atmosphere approximation
//!
//! ```text
//! p = (qnh^k1 - k2 * h)^(1 / k1)
//! ```
//!
//! with `k1 = 0.190263` and `k2 = 8.417286e-5`, which is exact enough
//! for the troposphere gliders fly in.

const K1: f64 = 0.190263;
const INV_K1: f64 = 1.0 / K1;
const K2: f64 = 8.417286e-5;

/// ISA sea-level air density in kg/m³.
pub const ISA_SEA_LEVEL_DENSITY: f64 = 1.225;

/// A static or reference pressure.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct AtmosphericPressure(f64);

impl Default for AtmosphericPressure {
    fn default() -> Self {
        Self::standard()
    }
}

impl AtmosphericPressure {
    /// ISA sea-level pressure, 1013.25 hPa.
    pub const fn standard() -> Self {
        Self(1013.25)
    }

    pub const fn from_hectopascal(hpa: f64) -> Self {
        Self(hpa)
    }

    pub fn from_pascal(pa: f64) -> Self {
        Self(pa / 100.0)
    }

    pub fn hectopascal(&self) -> f64 {
        self.0
    }

    pub fn pascal(&self) -> f64 {
        self.0 * 100.0
    }

    /// Whether the value is a plausible sea-level reference.
    pub fn is_plausible(&self) -> bool {
        (850.0..=1100.0).contains(&self.0)
    }

    /// Static pressure at an altitude above this reference.
    pub fn qnh_altitude_to_static_pressure(&self, altitude: f64) -> AtmosphericPressure {
        Self((self.0.powf(K1) - K2 * altitude).powf(INV_K1))
    }

    /// Altitude above this reference at which `static_pressure` is found.
    pub fn static_pressure_to_qnh_altitude(&self, static_pressure: AtmosphericPressure) -> f64 {
        (self.0.powf(K1) - static_pressure.0.powf(K1)) / K2
    }

    /// Converts a pressure altitude (1013.25 reference) to an altitude
    /// referenced to this pressure.
    pub fn pressure_altitude_to_qnh_altitude(&self, pressure_altitude: f64) -> f64 {
        self.static_pressure_to_qnh_altitude(Self::pressure_altitude_to_static_pressure(
            pressure_altitude,
        ))
    }

    /// Converts an altitude referenced to this pressure to pressure altitude.
    pub fn qnh_altitude_to_pressure_altitude(&self, altitude: f64) -> f64 {
        Self::static_pressure_to_pressure_altitude(self.qnh_altitude_to_static_pressure(altitude))
    }

    pub fn pressure_altitude_to_static_pressure(pressure_altitude: f64) -> AtmosphericPressure {
        Self::standard().qnh_altitude_to_static_pressure(pressure_altitude)
    }

    pub fn static_pressure_to_pressure_altitude(static_pressure: AtmosphericPressure) -> f64 {
        Self::standard().static_pressure_to_qnh_altitude(static_pressure)
    }
}

/// Highest altitude (m) the density model is evaluated at. The model
/// reaches zero density at 44330.8 m.
pub const MAX_DENSITY_ALTITUDE: f64 = 40_000.0;

/// ISA air density in kg/m³ at an altitude in metres.
///
/// Altitudes above [`MAX_DENSITY_ALTITUDE`] are evaluated there.
pub fn air_density(altitude: f64) -> f64 {
    let altitude = altitude.min(MAX_DENSITY_ALTITUDE);
    ((44330.8 - altitude) / 42266.5).powf(1.0 / 0.234969)
}

/// Ratio of true to indicated airspeed at an altitude in metres.
pub fn air_density_ratio(altitude: f64) -> f64 {
    (ISA_SEA_LEVEL_DENSITY / air_density(altitude)).sqrt()
}

/// Indicated airspeed in m/s from a pitot-static pressure difference in Pa.
pub fn indicated_airspeed_from_dynamic_pressure(dynamic_pressure: f64) -> f64 {
    if dynamic_pressure <= 0.0 {
        return 0.0;
    }
    (2.0 * dynamic_pressure / ISA_SEA_LEVEL_DENSITY).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_pressure_at_sea_level() {
        let p = AtmosphericPressure::pressure_altitude_to_static_pressure(0.0);
        assert!((p.hectopascal() - 1013.25).abs() < 1e-9);
    }

    #[test]
    fn test_static_pressure_at_altitude() {
        // ISA: ~899 hPa at 1000 m, ~795 hPa at 2000 m
        let p1000 = AtmosphericPressure::pressure_altitude_to_static_pressure(1000.0);
        let p2000 = AtmosphericPressure::pressure_altitude_to_static_pressure(2000.0);
        assert!((p1000.hectopascal() - 898.75).abs() < 0.5);
        assert!((p2000.hectopascal() - 795.0).abs() < 0.5);
    }

    #[test]
    fn test_qnh_shifts_altitude() {
        // A higher QNH puts the same static pressure higher above sea level.
        let ps = AtmosphericPressure::from_hectopascal(900.0);
        let std_alt = AtmosphericPressure::standard().static_pressure_to_qnh_altitude(ps);
        let high_alt = AtmosphericPressure::from_hectopascal(1023.25).static_pressure_to_qnh_altitude(ps);
        assert!(high_alt > std_alt);
        // Roughly 8 m per hPa near the ground.
        assert!((high_alt - std_alt - 80.0).abs() < 10.0);
    }

    #[test]
    fn test_pascal_conversion() {
        let p = AtmosphericPressure::from_pascal(101_325.0);
        assert_eq!(p.hectopascal(), 1013.25);
        assert_eq!(p.pascal(), 101_325.0);
    }

    #[test]
    fn test_air_density() {
        assert!((air_density(0.0) - 1.225).abs() < 0.001);
        assert!((air_density_ratio(0.0) - 1.0).abs() < 0.001);
        // ~1.05 at 1000 m
        assert!((air_density_ratio(1000.0) - 1.05).abs() < 0.01);
    }

    #[test]
    fn test_air_density_above_model_ceiling() {
        let top = air_density(MAX_DENSITY_ALTITUDE);
        assert!(top.is_finite() && top > 0.0);

        for altitude in [44_330.8, 50_000.0, f64::INFINITY] {
            assert_eq!(air_density(altitude), top, "altitude {altitude}");
            assert!(air_density_ratio(altitude).is_finite());
        }
    }

    #[test]
    fn test_indicated_airspeed_from_dynamic_pressure() {
        // q = 0.5 * rho * v²
        let q = 0.5 * ISA_SEA_LEVEL_DENSITY * 30.0 * 30.0;
        assert!((indicated_airspeed_from_dynamic_pressure(q) - 30.0).abs() < 1e-9);
        assert_eq!(indicated_airspeed_from_dynamic_pressure(-5.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_qnh_altitude_round_trip(
            altitude in -500.0f64..10_000.0,
            qnh in 950.0f64..1050.0,
        ) {
            let reference = AtmosphericPressure::from_hectopascal(qnh);
            let ps = reference.qnh_altitude_to_static_pressure(altitude);
            let back = reference.static_pressure_to_qnh_altitude(ps);
            prop_assert!((back - altitude).abs() < 1e-6);
        }

        #[test]
        fn prop_pressure_altitude_round_trip(
            altitude in -500.0f64..10_000.0,
            qnh in 950.0f64..1050.0,
        ) {
            let reference = AtmosphericPressure::from_hectopascal(qnh);
            let qnh_alt = reference.pressure_altitude_to_qnh_altitude(altitude);
            let back = reference.qnh_altitude_to_pressure_altitude(qnh_alt);
            prop_assert!((back - altitude).abs() < 1e-6);
        }

        #[test]
        fn prop_air_density_positive(altitude in -1_000.0f64..100_000.0) {
            let density = air_density(altitude);
            prop_assert!(density.is_finite() && density > 0.0);
        }
    }
}
