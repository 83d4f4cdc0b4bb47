//! Quadratic glide polar used to derive netto vario.
//!
//! The polar is `sink(v) = a·v² + b·v + c` with speeds in m/s and sink
//! rate positive downwards.

/// Quadratic sink polar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlidePolar {
    a: f64,
    b: f64,
    c: f64,
}

impl Default for GlidePolar {
    /// A generic 15 m standard-class polar.
    fn default() -> Self {
        Self::from_points((80.0, 0.62), (120.0, 0.85), (180.0, 2.0))
    }
}

impl GlidePolar {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Fits the quadratic through three (speed km/h, sink m/s) points, the
    /// way polars are published in glider manuals.
    pub fn from_points(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> Self {
        let (v1, w1) = (p1.0 / 3.6, p1.1);
        let (v2, w2) = (p2.0 / 3.6, p2.1);
        let (v3, w3) = (p3.0 / 3.6, p3.1);

        let d = (v1 - v2) * (v1 - v3) * (v2 - v3);
        if d == 0.0 {
            return Self::new(0.0, 0.0, w1);
        }

        let a = (v3 * (w2 - w1) + v2 * (w1 - w3) + v1 * (w3 - w2)) / d;
        let b = (v3 * v3 * (w1 - w2) + v2 * v2 * (w3 - w1) + v1 * v1 * (w2 - w3)) / d;
        let c = (v2 * v3 * (v2 - v3) * w1 + v3 * v1 * (v3 - v1) * w2 + v1 * v2 * (v1 - v2) * w3)
            / d;

        Self::new(a, b, c)
    }

    /// Sink rate at an indicated airspeed, m/s positive down.
    pub fn sink_rate(&self, speed: f64) -> f64 {
        self.a * speed * speed + self.b * speed + self.c
    }

    /// Speed of minimum sink in m/s.
    pub fn min_sink_speed(&self) -> f64 {
        if self.a <= 0.0 {
            return 0.0;
        }
        -self.b / (2.0 * self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_passes_through_points() {
        let polar = GlidePolar::from_points((80.0, 0.62), (120.0, 0.85), (180.0, 2.0));
        assert!((polar.sink_rate(80.0 / 3.6) - 0.62).abs() < 1e-9);
        assert!((polar.sink_rate(120.0 / 3.6) - 0.85).abs() < 1e-9);
        assert!((polar.sink_rate(180.0 / 3.6) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_sink_is_the_minimum() {
        let polar = GlidePolar::default();
        let v = polar.min_sink_speed();
        assert!(v > 10.0 && v < 30.0);
        assert!(polar.sink_rate(v) <= polar.sink_rate(v - 1.0));
        assert!(polar.sink_rate(v) <= polar.sink_rate(v + 1.0));
    }

    #[test]
    fn test_degenerate_points() {
        let polar = GlidePolar::from_points((100.0, 1.0), (100.0, 1.0), (100.0, 1.0));
        assert_eq!(polar.sink_rate(30.0), 1.0);
    }
}
