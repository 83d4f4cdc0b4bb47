//! Elapsed-time tracking with time-warp detection.
//!
//! Several stages integrate quantities over time (turn rate, circling
//! percentages, vario averaging, wind sampling). They all share the same
//! rule: a timestamp that goes backwards is a time warp, and the stage must
//! restart its accumulation from the new time rather than compute a
//! negative span.

/// Outcome of feeding a new timestamp to [`DeltaTime::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    /// No previous timestamp; accumulation starts now.
    First,
    /// Time went backwards; the caller must reset its state.
    Warped,
    /// Less than the minimum delta elapsed; the previous timestamp is kept.
    TooShort,
    /// Seconds elapsed since the previous accepted timestamp.
    Elapsed(f64),
}

impl TimeStep {
    /// The elapsed seconds, if any.
    pub fn elapsed(self) -> Option<f64> {
        match self {
            TimeStep::Elapsed(dt) => Some(dt),
            _ => None,
        }
    }
}

/// Remembers the last accepted timestamp of a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeltaTime {
    last: Option<f64>,
}

impl DeltaTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous timestamp.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn is_defined(&self) -> bool {
        self.last.is_some()
    }

    /// Advances to `now`.
    ///
    /// * `min_delta` - deltas shorter than this are reported as
    ///   [`TimeStep::TooShort`] without advancing
    /// * `warp_tolerance` - backwards steps up to this many seconds are
    ///   treated as too short instead of a warp
    pub fn update(&mut self, now: f64, min_delta: f64, warp_tolerance: f64) -> TimeStep {
        let Some(last) = self.last else {
            self.last = Some(now);
            return TimeStep::First;
        };

        if now < last {
            if last - now > warp_tolerance {
                self.last = Some(now);
                return TimeStep::Warped;
            }
            return TimeStep::TooShort;
        }

        let delta = now - last;
        if delta <= min_delta {
            return TimeStep::TooShort;
        }

        self.last = Some(now);
        TimeStep::Elapsed(delta)
    }
}
