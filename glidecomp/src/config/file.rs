//! Settings file handling for `~/.glidecomp/settings.ini`.
//!
//! Settings structs live in [`super::settings`], constants in
//! [`super::defaults`], and parsing in [`super::parser`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::defaults::{DEFAULT_SETTINGS_DIR, DEFAULT_SETTINGS_FILE};
use super::settings::ComputerSettings;

/// Settings file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read settings file
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ComputerSettings {
    /// Load settings from the default path (`~/.glidecomp/settings.ini`).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        let settings = super::parser::parse_ini(&ini)?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse settings from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }
}

/// Get the path to the settings file (`~/.glidecomp/settings.ini`).
pub fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SETTINGS_DIR)
        .join(DEFAULT_SETTINGS_FILE)
}
