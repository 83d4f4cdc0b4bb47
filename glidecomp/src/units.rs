//! Angle helpers, speed vectors and the first-order low-pass filter.
//!
//! # Conventions
//!
//! - Angles are degrees true, 0 = north, 90 = east.
//! - Wind bearings give the direction the wind blows FROM.
//! - Cartesian components are (east, north) in m/s.

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.81;

/// Normalizes a bearing to `[0, 360)`.
pub fn normalize_bearing(degrees: f64) -> f64 {
    let b = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if b >= 360.0 {
        0.0
    } else {
        b
    }
}

/// Normalizes an angle difference to `(-180, 180]`.
pub fn angle_delta(degrees: f64) -> f64 {
    let d = normalize_bearing(degrees);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// First-order low-pass: `(1 - factor) * previous + factor * input`.
pub fn low_pass(previous: f64, input: f64, factor: f64) -> f64 {
    (1.0 - factor) * previous + factor * input
}

/// A polar speed vector: bearing in degrees and magnitude in m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedVector {
    pub bearing: f64,
    pub norm: f64,
}

impl SpeedVector {
    pub fn new(bearing: f64, norm: f64) -> Self {
        Self {
            bearing: normalize_bearing(bearing),
            norm,
        }
    }

    /// Builds a vector from (east, north) components.
    pub fn from_xy(east: f64, north: f64) -> Self {
        let norm = east.hypot(north);
        if norm == 0.0 {
            return Self::zero();
        }
        Self::new(east.atan2(north).to_degrees(), norm)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    /// (east, north) components.
    pub fn to_xy(&self) -> (f64, f64) {
        let rad = self.bearing.to_radians();
        (self.norm * rad.sin(), self.norm * rad.cos())
    }

    /// The same magnitude pointing the opposite way.
    pub fn reciprocal(&self) -> Self {
        Self::new(self.bearing + 180.0, self.norm)
    }
}
