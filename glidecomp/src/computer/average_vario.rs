//! 30 second average of brutto and netto vario.

use std::collections::VecDeque;

use tracing::trace;

/// One-second buckets in the averaging window.
pub const AVERAGE_WINDOW: usize = 30;

/// Fixed-size moving average over the last `capacity` values.
#[derive(Debug, Clone)]
pub struct WindowFilter {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl WindowFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(oldest) = self.values.pop_front() {
                self.sum -= oldest;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Mean of the buffered values, `None` while empty.
    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }
}

/// Averages brutto and netto vario over [`AVERAGE_WINDOW`] seconds.
///
/// The window restarts whenever circling starts or stops, so a climb
/// average never includes cruise sink. Each whole elapsed second pushes
/// the latest sample; skipped seconds repeat it.
#[derive(Debug, Clone)]
pub struct AverageVarioFilter {
    brutto: WindowFilter,
    netto: WindowFilter,
    last_time: Option<f64>,
    remainder: f64,
    circling: bool,
}

impl Default for AverageVarioFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AverageVarioFilter {
    pub fn new() -> Self {
        Self {
            brutto: WindowFilter::new(AVERAGE_WINDOW),
            netto: WindowFilter::new(AVERAGE_WINDOW),
            last_time: None,
            remainder: 0.0,
            circling: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feeds one tick. Returns the (brutto, netto) averages once the
    /// window holds at least one second.
    pub fn update(&mut self, time: f64, circling: bool, brutto: f64, netto: f64) -> Option<(f64, f64)> {
        let restart = match self.last_time {
            None => true,
            Some(last) => time < last || circling != self.circling,
        };
        if restart {
            trace!(time, circling, "Restarting vario average");
            self.brutto.reset();
            self.netto.reset();
            self.last_time = Some(time);
            self.remainder = 0.0;
            self.circling = circling;
            return None;
        }

        let last = self.last_time.unwrap_or(time);
        let elapsed = time - last + self.remainder;
        let seconds = elapsed.floor();
        self.remainder = elapsed - seconds;
        self.last_time = Some(time);

        // Pushing more than a full window is equivalent to a full window.
        let copies = (seconds as usize).min(AVERAGE_WINDOW);
        for _ in 0..copies {
            self.brutto.push(brutto);
            self.netto.push(netto);
        }

        self.brutto.average().zip(self.netto.average())
    }
}
