// src/settings.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

/// Errors loading the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Interpreter options from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Submitting a blank line reloads the interpreter.
    pub reload_on_blank: bool,
    /// Expand `a..b` and `a...b` words like comma-lists.
    pub range_expansion: bool,
    /// Threads of the worker pool used by fan-out commands.
    pub pool_size: usize,
    pub prompt: String,
    /// Append submitted lines to the history file.
    pub history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reload_on_blank: false,
            range_expansion: false,
            pool_size: 4,
            prompt: "dag> ".to_string(),
            history: true,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No settings at '{}'; using defaults.", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.pool_size, 4);
        assert_eq!(settings.prompt, "dag> ");
        assert!(!settings.reload_on_blank);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "reload_on_blank = true\npool_size = 8\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(settings.reload_on_blank);
        assert_eq!(settings.pool_size, 8);
        assert!(settings.history);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "pool_size = \"many\"").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));
    }
}
