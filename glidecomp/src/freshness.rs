//! Freshness stamps for optional measurements.
//!
//! Every optional quantity flowing through the engine is paired with a
//! [`Freshness`] recording when it was last updated on the monotonic sensor
//! clock. A stamp that was never set (or has been cleared) is invalid, and
//! the paired value must not be used.
//!
//! # Quantization
//!
//! Stamps are stored as 1/64 second ticks. Two updates inside the same
//! tick compare equal, which keeps [`Freshness::modified`] stable against
//! sub-millisecond jitter from the device layer.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use glidecomp::freshness::Stamped;
//!
//! let mut altitude = Stamped::<f64>::default();
//! assert_eq!(altitude.get(), None);
//!
//! altitude.set(512.0, Duration::from_secs(10));
//! assert_eq!(altitude.get(), Some(512.0));
//!
//! // Too old: cleared.
//! altitude.expire(Duration::from_secs(20), Duration::from_secs(5));
//! assert_eq!(altitude.get(), None);
//! ```

use std::time::Duration;

/// Number of stamp ticks per second of clock time.
pub const TICKS_PER_SECOND: u64 = 64;

fn to_ticks(clock: Duration) -> u64 {
    // Round down: a stamp never claims to be newer than the clock reading.
    (clock.as_secs_f64() * TICKS_PER_SECOND as f64) as u64
}

/// Monotonic, quantized "last updated" marker.
///
/// `None` means the value was never set or has been invalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Freshness(Option<u64>);

impl Freshness {
    /// A stamp that was never set.
    pub const fn never() -> Self {
        Self(None)
    }

    /// A stamp set at the given clock reading.
    pub fn at(clock: Duration) -> Self {
        Self(Some(to_ticks(clock)))
    }

    /// Whether the paired value may be used.
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Marks the paired value as updated at `clock`.
    pub fn update(&mut self, clock: Duration) {
        self.0 = Some(to_ticks(clock));
    }

    /// Invalidates the stamp.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Clears the stamp if it is older than `max_age` or lies in the future
    /// of `clock` (clock rewound).
    ///
    /// Returns `true` if the stamp was cleared by this call.
    pub fn expire(&mut self, clock: Duration, max_age: Duration) -> bool {
        let Some(last) = self.0 else {
            return false;
        };
        let now = to_ticks(clock);
        if now < last || now - last > to_ticks(max_age) {
            self.0 = None;
            return true;
        }
        false
    }

    /// True iff this stamp is valid and strictly newer than `other`.
    ///
    /// An invalid `other` counts as older than any valid stamp.
    pub fn modified(&self, other: Freshness) -> bool {
        match (self.0, other.0) {
            (Some(mine), Some(theirs)) => mine > theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Copies `other` into this stamp if this one is currently invalid.
    ///
    /// Returns `true` if the stamp was taken over.
    pub fn complement(&mut self, other: Freshness) -> bool {
        if self.is_valid() || !other.is_valid() {
            return false;
        }
        *self = other;
        true
    }

    /// Clears the stamp if it lies more than `max_period` in the future of
    /// `clock`, which happens after the sensor clock has been rewound.
    pub fn fix_time_warp(&mut self, clock: Duration, max_period: Duration) -> bool {
        let Some(last) = self.0 else {
            return false;
        };
        if last > to_ticks(clock) + to_ticks(max_period) {
            self.0 = None;
            return true;
        }
        false
    }

    /// Seconds elapsed from `earlier` to this stamp, if both are valid.
    pub fn time_difference(&self, earlier: Freshness) -> Option<f64> {
        match (self.0, earlier.0) {
            (Some(mine), Some(theirs)) => {
                Some((mine as f64 - theirs as f64) / TICKS_PER_SECOND as f64)
            }
            _ => None,
        }
    }

    /// Clock reading of the last update.
    pub fn last(&self) -> Option<Duration> {
        self.0
            .map(|ticks| Duration::from_secs_f64(ticks as f64 / TICKS_PER_SECOND as f64))
    }
}

/// A value paired 1:1 with its [`Freshness`].
///
/// The only way to read the value is through [`Stamped::get`], which yields
/// `None` while the stamp is invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stamped<T> {
    value: T,
    freshness: Freshness,
}

impl<T: Copy> Stamped<T> {
    /// A value stamped at `clock`.
    pub fn new(value: T, clock: Duration) -> Self {
        Self {
            value,
            freshness: Freshness::at(clock),
        }
    }

    /// A value carrying an existing stamp.
    pub fn with_freshness(value: T, freshness: Freshness) -> Self {
        Self { value, freshness }
    }

    /// The value, if its stamp is valid.
    pub fn get(&self) -> Option<T> {
        self.freshness.is_valid().then_some(self.value)
    }

    /// Stores `value` and stamps it at `clock`.
    pub fn set(&mut self, value: T, clock: Duration) {
        self.value = value;
        self.freshness.update(clock);
    }

    /// Stores `value` carrying the stamp of the measurement it was derived
    /// from.
    pub fn set_with(&mut self, value: T, freshness: Freshness) {
        self.value = value;
        self.freshness = freshness;
    }

    /// Stamp of the value.
    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Whether [`Stamped::get`] would return a value.
    pub fn is_available(&self) -> bool {
        self.freshness.is_valid()
    }

    /// Whether this value is newer than `other`'s.
    pub fn modified(&self, other: &Stamped<T>) -> bool {
        self.freshness.modified(other.freshness)
    }

    /// See [`Freshness::expire`].
    pub fn expire(&mut self, clock: Duration, max_age: Duration) -> bool {
        self.freshness.expire(clock, max_age)
    }

    /// Takes over `other` if this value is unavailable.
    pub fn complement(&mut self, other: &Stamped<T>) -> bool {
        if self.freshness.complement(other.freshness) {
            self.value = other.value;
            true
        } else {
            false
        }
    }
}

impl<T> Stamped<T> {
    /// Invalidates the value.
    pub fn clear(&mut self) {
        self.freshness.clear();
    }
}
