// src/constants.rs

/// Name of the per-user directories (`~/.config/dag`, `~/.cache/dag`, ...).
pub const APP_DIR_NAME: &str = "dag";

/// Environment variable that puts all program directories under one base.
pub const HOME_ENV_VAR: &str = "DAG_HOME";

/// The settings file, inside the config directory.
pub const SETTINGS_FILENAME: &str = "config.toml";

/// The input history, inside the state directory.
pub const HISTORY_FILENAME: &str = "history";

/// Startup argument that turns on memory tracing. Stripped before the run.
pub const MEMORY_TRACE_FLAG: &str = "=m";

/// Startup path value meaning "no file".
pub const NO_FILE: &str = "-";
