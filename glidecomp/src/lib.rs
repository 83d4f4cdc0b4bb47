//! Glidecomp - derived flight state engine for glider instruments
//!
//! This library turns a stream of raw sensor snapshots (GPS fix, pressure,
//! airspeed, attitude, vario, temperature) into the derived flight state a
//! navigation instrument displays: navigation altitude, fused varios,
//! circling/cruise mode with thermal statistics, wind, glide ratios and a
//! thermal-top/cloud-base forecast.
//!
//! # High-Level API
//!
//! ```
//! use glidecomp::computer::FlightComputer;
//! use glidecomp::config::ComputerSettings;
//! use glidecomp::sample::RawSample;
//!
//! let mut computer = FlightComputer::new(ComputerSettings::default());
//!
//! let mut sample = RawSample::at(0.0);
//! sample.gps_altitude.set(850.0, sample.clock);
//!
//! let edges = computer.tick(&sample);
//! assert!(!edges.took_off());
//! assert_eq!(computer.derived().altitude.nav_altitude.get(), Some(850.0));
//! ```
//!
//! Readers on other threads use [`shared::SharedDerivedState`].

pub mod atmosphere;
pub mod computer;
pub mod config;
pub mod freshness;
pub mod geo;
pub mod logging;
pub mod polar;
pub mod sample;
pub mod shared;
pub mod state;
pub mod time;
pub mod units;

pub use computer::FlightComputer;
pub use config::ComputerSettings;
pub use sample::RawSample;
pub use state::{DerivedState, TickEdges};

/// Version of the glidecomp library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
