//! TOML configuration file I/O
//!
//! Loads and saves toolkit configuration in the user's configuration
//! directory. A missing file silently yields defaults.

use crate::config::SwitchConfig;
use crate::error::{ConfigError, Result, SwitchError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns `~/.config/nordswitch` on unix, `%APPDATA%\nordswitch` on
/// Windows, or the `NORDSWITCH_CONFIG_DIR` environment variable if set.
pub fn get_config_dir() -> Result<PathBuf> {
    if let Ok(config_dir) = std::env::var("NORDSWITCH_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    if cfg!(windows) {
        let appdata = std::env::var("APPDATA").map_err(|_| {
            SwitchError::Config(ConfigError::IoError {
                message: "APPDATA environment variable not set".to_string(),
            })
        })?;
        return Ok(PathBuf::from(appdata).join("nordswitch"));
    }

    let home = std::env::var("HOME").map_err(|_| {
        SwitchError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;
    Ok(PathBuf::from(home).join(".config").join("nordswitch"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location, defaults if absent
pub fn load_config() -> Result<SwitchConfig> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(SwitchConfig::default());
    }
    load_config_from_path(&path)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<SwitchConfig> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SwitchError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => SwitchError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: SwitchConfig = toml::from_str(&contents)?;

    config
        .validate()
        .map_err(|message| SwitchError::Config(ConfigError::ValidationError { message }))?;

    Ok(config)
}

/// Save configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(config: &SwitchConfig, path: P) -> Result<()> {
    config
        .validate()
        .map_err(|message| SwitchError::Config(ConfigError::ValidationError { message }))?;

    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            SwitchError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents).map_err(|_| {
        SwitchError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let original = SwitchConfig {
            exe_path: Some("/opt/nordvpn/nordvpn".to_string()),
            state_timeout_secs: 30,
            ..Default::default()
        };

        save_config_to_path(&original, &config_path).unwrap();
        let loaded = load_config_from_path(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_missing_file_is_load_failed() {
        let temp_dir = tempdir().unwrap();
        let result = load_config_from_path(temp_dir.path().join("nope.toml"));
        assert!(matches!(
            result,
            Err(SwitchError::Config(ConfigError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "poll_interval_ms = 250\n").unwrap();

        let loaded = load_config_from_path(&config_path).unwrap();
        assert_eq!(loaded.poll_interval_ms, 250);
        assert_eq!(loaded.state_timeout_secs, 45);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "state_timeout_secs = 0\n").unwrap();

        assert!(load_config_from_path(&config_path).is_err());
    }
}
