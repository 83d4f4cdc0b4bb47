//! Wind from ground speed variation over a full circle.
//!
//! While circling in a steady wind, ground speed minus airspeed traces a
//! cosine over the track angle:
//!
//! ```text
//! gs - tas = offset - W * cos(track - wind bearing)
//! ```
//!
//! The wind speed follows from the curve's mean absolute deviation
//! (`amplitude * π/2`), the bearing from a coarse-to-fine search for the
//! phase with the smallest squared residual. Airspeed compensates for
//! speed changes during the circle and is left out when only a
//! reconstructed airspeed is available.

use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

use tracing::{debug, trace};

use super::{WindEstimate, MAX_QUALITY};
use crate::freshness::Freshness;
use crate::sample::RawSample;
use crate::units::{angle_delta, SpeedVector};

/// A circle needs more than this many samples.
const MIN_CIRCLE_SAMPLES: usize = 8;

/// Maximum turn-rate deviation relative to the mean turn rate.
const MAX_CIRCLE_QUALITY_METRIC: f64 = 0.8;

/// Maximum mean sample interval in seconds.
const MAX_SAMPLE_INTERVAL: f64 = 2.0;

/// Allowed deviation of each interval from the mean interval.
const MAX_INTERVAL_DEVIATION: f64 = 0.05;

/// Results at or above this speed (m/s) are rejected.
pub const MAX_WIND_SPEED: f64 = 30.0;

/// Starting residual of the bearing search.
const INITIAL_FIT_METRIC: f64 = 10_000.0;

const MAX_SEARCH_ITERATIONS: usize = 10;

/// The bearing search stops once its step is this fine (degrees).
const MIN_SEARCH_STEP: f64 = 2.0;

/// A stamp further than this in the future means the clock was rewound.
const TIME_WARP_PERIOD: Duration = Duration::from_secs(30);

/// Samples kept per circling episode.
const MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Sample {
    time: f64,
    track: f64,
    ground_speed: f64,
    true_airspeed: f64,
}

/// Circling wind estimator.
#[derive(Debug, Clone, Default)]
pub struct CirclingWind {
    active: bool,
    use_airspeed: bool,
    /// Newest first.
    samples: VecDeque<Sample>,
    last_track: Freshness,
    last_ground_speed: Freshness,
    suspend: usize,
}

impl CirclingWind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.active = false;
    }

    /// Adds this tick's GPS fix and tries to evaluate the last circle.
    pub fn new_sample(&mut self, basic: &RawSample, circling: bool) -> Option<WindEstimate> {
        if !circling {
            self.reset();
            return None;
        }

        if !self.active {
            self.active = true;
            self.use_airspeed = basic.real_true_airspeed().is_some();
            if !self.use_airspeed {
                debug!("No measured airspeed, circling wind without airspeed compensation");
            }
            self.samples.clear();
            self.last_track.clear();
            self.last_ground_speed.clear();
            self.suspend = 0;
        }

        let warped = self.last_track.fix_time_warp(basic.clock, TIME_WARP_PERIOD)
            | self.last_ground_speed.fix_time_warp(basic.clock, TIME_WARP_PERIOD);
        if warped {
            debug!("Time warp, restarting circling wind");
            self.reset();
            return None;
        }

        let (Some(track), Some(ground_speed)) = (basic.track.get(), basic.ground_speed.get()) else {
            return None;
        };
        if !basic.track.freshness().modified(self.last_track)
            || !basic.ground_speed.freshness().modified(self.last_ground_speed)
        {
            return None;
        }
        self.last_track = basic.track.freshness();
        self.last_ground_speed = basic.ground_speed.freshness();

        let true_airspeed = if self.use_airspeed {
            basic.true_airspeed().unwrap_or(0.0)
        } else {
            0.0
        };
        self.samples.push_front(Sample {
            time: basic.clock.as_secs_f64(),
            track,
            ground_speed,
            true_airspeed,
        });
        self.samples.truncate(MAX_SAMPLES);

        if self.suspend > 0 {
            self.suspend -= 1;
            return None;
        }

        let (circle, n) = self.full_circle()?;

        let mean_rate = circle / n as f64;
        let max_deviation = (1..n)
            .map(|i| (self.track_change(i) - mean_rate).abs())
            .fold(0.0, f64::max);
        let quality_metric = (max_deviation / mean_rate).abs();
        if quality_metric >= MAX_CIRCLE_QUALITY_METRIC {
            trace!(quality_metric, "Circle too irregular");
            return None;
        }

        let result = self.calc_wind(quality_metric, n, circle);
        // Wait a quarter circle before the next evaluation.
        self.suspend = if result.is_some() { n / 4 } else { 0 };
        result
    }

    /// Track change from sample `i` to the newer sample `i - 1`.
    fn track_change(&self, i: usize) -> f64 {
        angle_delta(self.samples[i - 1].track - self.samples[i].track)
    }

    /// Accumulated turn and sample count of the latest full circle.
    fn full_circle(&self) -> Option<(f64, usize)> {
        let mut circle: f64 = 0.0;
        for i in 1..self.samples.len() {
            circle += self.track_change(i);
            if circle.abs() > 360.0 {
                let n = i + 1;
                return (n > MIN_CIRCLE_SAMPLES).then_some((circle, n));
            }
        }
        None
    }

    fn calc_wind(&self, quality_metric: f64, n: usize, circle: f64) -> Option<WindEstimate> {
        let samples = &self.samples;

        let step = (samples[0].time - samples[n - 1].time) / (n - 1) as f64;
        if step > MAX_SAMPLE_INTERVAL {
            trace!(step, "Circle samples too sparse");
            return None;
        }
        let uneven = (1..n).any(|i| {
            let interval = samples[i - 1].time - samples[i].time;
            (interval - step).abs() > step * MAX_INTERVAL_DEVIATION
        });
        if uneven {
            debug!("Circle sample spacing not uniform");
            return None;
        }

        // Part of the oldest step that overlaps the previous circle.
        let last_change = self.track_change(n - 1);
        let excess = angle_delta(circle - 360.0);
        let excess_fraction = if last_change != 0.0 {
            (1.0 - (last_change - excess) / last_change).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let circle_mean = |value: &dyn Fn(&Sample) -> f64| {
            let sum: f64 = samples.iter().take(n).map(value).sum();
            let oldest = value(&samples[n - 1]);
            (sum - oldest * excess_fraction) / (n as f64 - excess_fraction)
        };

        let offset = circle_mean(&|s: &Sample| s.ground_speed - s.true_airspeed);
        let wind_speed = circle_mean(&|s: &Sample| (s.ground_speed - s.true_airspeed - offset).abs()) * FRAC_PI_2;
        if wind_speed >= MAX_WIND_SPEED {
            debug!(wind_speed, "Circling wind too strong, rejected");
            return None;
        }

        let mut midpoint = 180.0;
        let mut steps = 7usize;
        let mut width = circle.abs() / 6.0;
        let mut min_fit = INITIAL_FIT_METRIC;
        for _ in 0..MAX_SEARCH_ITERATIONS {
            let mut candidate = midpoint - width * steps as f64 / 2.0;
            for _ in 0..=steps {
                let fit = self.fit_cosine(n, wind_speed, offset, candidate);
                if fit < min_fit {
                    min_fit = fit;
                    midpoint = candidate;
                }
                candidate += width;
            }
            steps = 3;
            width /= 2.0;
            if width <= MIN_SEARCH_STEP {
                break;
            }
        }

        if min_fit > INITIAL_FIT_METRIC - 1.0 {
            debug!("Circling wind fit does not converge");
            return None;
        }

        let quality = estimate_quality(quality_metric, min_fit, wind_speed);
        if quality == 0 {
            return None;
        }

        let wind = SpeedVector::new(midpoint, wind_speed);
        debug!(
            bearing = wind.bearing,
            speed = wind.norm,
            quality,
            quality_metric,
            fit = min_fit,
            "Circling wind"
        );
        Some(WindEstimate { wind, quality })
    }

    /// Sum of squared residuals against `-cos(track - phase)`.
    fn fit_cosine(&self, n: usize, amplitude: f64, offset: f64, phase: f64) -> f64 {
        self.samples
            .iter()
            .take(n)
            .map(|s| {
                let mut diff = s.ground_speed - s.true_airspeed - offset;
                // Winds below 1 m/s are not worth normalising.
                if amplitude > 1.0 {
                    diff /= amplitude;
                }
                let model = -(s.track - phase).to_radians().cos();
                (model - diff).powi(2)
            })
            .sum()
    }
}

/// Combines circle roundness and fit residual into 0..=5.
fn estimate_quality(circle_quality: f64, fit: f64, wind_speed: f64) -> u32 {
    // Strong wind skews the track-based roundness of a perfect circle.
    let skew = if wind_speed > 10.0 { 0.1 } else { 0.0 };

    let mut quality: i32 = if circle_quality > 0.7 + skew {
        return 0;
    } else if circle_quality > 0.5 + skew {
        1
    } else if circle_quality > 0.4 + skew {
        2
    } else if circle_quality > 0.3 + skew {
        3
    } else if circle_quality > 0.2 + skew {
        4
    } else {
        5
    };

    if fit > 10.0 {
        quality -= 1;
    }
    if fit < 5.0 {
        quality += 1;
    }
    if fit < 1.0 {
        quality += 1;
    }
    quality.clamp(0, MAX_QUALITY as i32) as u32
}
