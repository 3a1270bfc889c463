//! Settings file loading and validation.

use crate::error::ConfigError;
use crate::types::Settings;
use std::path::Path;

/// Name of the settings file inside the cache root.
pub const SETTINGS_FILE: &str = "config.toml";

/// Loads `<root>/config.toml`, returning defaults when the file is absent.
pub fn load_settings(root: &Path) -> Result<Settings, ConfigError> {
    let path = root.join(SETTINGS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => load_settings_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

/// Parses and validates settings from a string.
pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if let Some(goroot) = &settings.toolchain.goroot {
        if goroot.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "toolchain.goroot must not be empty".to_string(),
            ));
        }
    }
    if let Some(flag) = settings.build.flags.iter().find(|f| f.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "build.flags contains an empty flag '{flag}'"
        )));
    }
    Ok(())
}
