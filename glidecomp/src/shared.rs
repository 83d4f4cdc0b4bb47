//! Publication of the derived state to readers on other threads.
//!
//! - [`DerivedStateProvider`] - Query API (pull)
//! - [`SharedDerivedState`] - Thread-safe single-writer, many-reader handle
//!
//! The [`FlightComputer`](crate::computer::FlightComputer) owns the working
//! copy of the derived state and publishes it once per tick. Readers either
//! take a snapshot or hold a short read lease; they never see a tick half
//! applied.
//!
//! # Usage
//!
//! ```
//! use glidecomp::computer::FlightComputer;
//! use glidecomp::config::ComputerSettings;
//! use glidecomp::shared::{DerivedStateProvider, SharedDerivedState};
//!
//! let shared = SharedDerivedState::new();
//! let mut computer = FlightComputer::new(ComputerSettings::default());
//! computer.publish_to(shared.clone());
//!
//! // On a reader thread:
//! assert!(!shared.is_flying());
//! let snapshot = shared.snapshot();
//! assert_eq!(snapshot.thermal.thermal_count, 0);
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::state::{CirclingMode, DerivedState, WindSource};
use crate::units::SpeedVector;

/// Trait for querying the derived state (pull API).
pub trait DerivedStateProvider: Send + Sync {
    /// Copy of the complete derived state.
    fn snapshot(&self) -> DerivedState;

    /// Current flight mode.
    fn circling_mode(&self) -> CirclingMode;

    /// Whether takeoff has been detected and no landing since.
    fn is_flying(&self) -> bool;

    /// Navigation altitude in metres, if available.
    fn nav_altitude(&self) -> Option<f64>;

    /// Effective wind and where it came from.
    fn wind(&self) -> Option<(SpeedVector, WindSource)>;
}

/// Shared derived state - thread-safe handle for readers.
///
/// Cloning the handle shares the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedDerivedState {
    inner: Arc<RwLock<DerivedState>>,
}

impl SharedDerivedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published state. Only the computation thread calls this.
    pub fn publish(&self, state: &DerivedState) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.clone_from(state);
    }

    /// Scoped read lease. Hold it briefly; the writer blocks until it is
    /// dropped.
    pub fn read(&self) -> RwLockReadGuard<'_, DerivedState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DerivedStateProvider for SharedDerivedState {
    fn snapshot(&self) -> DerivedState {
        self.read().clone()
    }

    fn circling_mode(&self) -> CirclingMode {
        self.read().circling.mode
    }

    fn is_flying(&self) -> bool {
        self.read().flight.flying
    }

    fn nav_altitude(&self) -> Option<f64> {
        self.read().altitude.nav_altitude.get()
    }

    fn wind(&self) -> Option<(SpeedVector, WindSource)> {
        let state = self.read();
        state.wind.wind.get().map(|wind| (wind, state.wind.source))
    }
}

// Allow Arc<SharedDerivedState> to be used as provider
impl DerivedStateProvider for Arc<SharedDerivedState> {
    fn snapshot(&self) -> DerivedState {
        (**self).snapshot()
    }

    fn circling_mode(&self) -> CirclingMode {
        (**self).circling_mode()
    }

    fn is_flying(&self) -> bool {
        (**self).is_flying()
    }

    fn nav_altitude(&self) -> Option<f64> {
        (**self).nav_altitude()
    }

    fn wind(&self) -> Option<(SpeedVector, WindSource)> {
        (**self).wind()
    }
}
