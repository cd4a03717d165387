// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, HOME_ENV_VAR};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref LAYOUT: Mutex<Option<Layout>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the system {0} directory.")]
    DirNotFound(&'static str),
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cache directory '{path}' is not writable: {source}")]
    NotWritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The four per-user directories of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub data: PathBuf,
    pub config: PathBuf,
    /// History and other run state.
    pub state: PathBuf,
    pub cache: PathBuf,
}

impl Layout {
    /// Everything under one base directory, as used with `DAG_HOME`.
    pub fn under(base: &Path) -> Self {
        Self {
            data: base.join("data"),
            config: base.join("config"),
            state: base.join("state"),
            cache: base.join("cache"),
        }
    }

    /// The platform directories, each namespaced under the program name.
    fn platform() -> Result<Self, PathError> {
        let data = dirs::data_dir().ok_or(PathError::DirNotFound("data"))?;
        let config = dirs::config_dir().ok_or(PathError::DirNotFound("config"))?;
        // Only some platforms have a state directory.
        let state = dirs::state_dir().unwrap_or_else(|| data.clone());
        let cache = dirs::cache_dir().ok_or(PathError::DirNotFound("cache"))?;
        Ok(Self {
            data: data.join(APP_DIR_NAME),
            config: config.join(APP_DIR_NAME),
            state: state.join(APP_DIR_NAME).join("state"),
            cache: cache.join(APP_DIR_NAME),
        })
    }

    /// Creates all four directories and checks that the cache accepts writes.
    ///
    /// # Errors
    /// `DirCreation` or `NotWritable`.
    pub fn ensure(&self) -> Result<(), PathError> {
        for dir in [&self.data, &self.config, &self.state, &self.cache] {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| PathError::DirCreation {
                    path: dir.display().to_string(),
                    source: e,
                })?;
            }
        }
        tempfile::NamedTempFile::new_in(&self.cache).map_err(|e| PathError::NotWritable {
            path: self.cache.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// The TOML settings file in the config directory.
    pub fn settings_file(&self) -> PathBuf {
        self.config.join(crate::constants::SETTINGS_FILENAME)
    }

    pub fn history_file(&self) -> PathBuf {
        self.state.join(crate::constants::HISTORY_FILENAME)
    }
}

/// Returns the program's directory layout, creating the directories if needed.
///
/// `DAG_HOME` puts all four directories under one base. This function is
/// memoized: the first call computes and caches the layout, subsequent calls
/// return the cached value.
pub fn layout() -> Result<Layout, PathError> {
    let mut cached = LAYOUT.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(layout) = &*cached {
        return Ok(layout.clone());
    }

    let layout = match std::env::var_os(HOME_ENV_VAR) {
        Some(base) if !base.is_empty() => Layout::under(Path::new(&base)),
        _ => Layout::platform()?,
    };
    layout.ensure()?;
    log::debug!("Using directory layout {:?}", layout);

    *cached = Some(layout.clone());
    Ok(layout)
}
