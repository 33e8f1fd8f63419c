//! Settings loading from `finuch.toml`.
//!
//! The file is optional: every section has defaults, so a missing file yields the
//! default settings while a malformed one is an error.

use crate::{
    core::policy::ConfirmationPolicy,
    errors::{Error, Result},
};
use serde::Deserialize;
use std::path::Path;

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "finuch.toml";

/// Configuration structure representing the entire settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Companies to process; empty means every company that owns a template
    pub companies: Vec<String>,
    /// First-occurrence confirmation policy
    pub policy: ConfirmationPolicy,
    /// Generation defaults
    pub generation: GenerationSettings,
}

/// Defaults for the `generate` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Days past today the generation window extends by default
    pub lookahead_days: u32,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load settings from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read settings file {}: {e}", path_ref.display()),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from `path`, or from [`DEFAULT_SETTINGS_PATH`] when it exists.
/// Without an explicit path and without the default file, defaults are used.
pub fn load_or_default(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(explicit) => load_settings(explicit),
        None if Path::new(DEFAULT_SETTINGS_PATH).exists() => load_settings(DEFAULT_SETTINGS_PATH),
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}
