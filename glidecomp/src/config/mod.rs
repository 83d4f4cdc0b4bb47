//! Configuration for the flight computer.
//!
//! [`ComputerSettings`] groups every tunable the pipeline reads: altitude
//! source preference, circling thresholds, wind estimator switches and
//! overrides, the sonde forecast, glide-ratio limits and the polar.
//!
//! Settings can be built in code with the `with_*` builder methods or
//! loaded from an INI file with [`ComputerSettings::load_from`]; any value
//! missing from the file keeps its default.
//!
//! # Example
//!
//! ```
//! use glidecomp::config::ComputerSettings;
//!
//! let settings = ComputerSettings::new().with_min_turn_rate(5.0);
//! assert_eq!(settings.circling.min_turn_rate, 5.0);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;

pub use defaults::*;
pub use file::{default_settings_path, ConfigFileError};
pub use settings::{
    AltitudeSettings, CirclingSettings, ComputerSettings, GlideSettings, PolarSettings,
    SondeSettings, WindSettings,
};
