// src/system/supervisor.rs

//! The reload loop around interpreter runs.
//!
//! A run ends with `exit` (or end of input) or with a reload request. A reload
//! starts a fresh run with the requested arguments and the working directory
//! the previous run ended in. When the loop ends, a working directory that moved
//! is written to the cwd file so a wrapping shell can follow it.

use crate::constants::NO_FILE;
use crate::core::registry::ControlSignal;
use crate::system::memtrace::{self, MemoryProbe};
use anyhow::{Context as _, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

/// Process arguments after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartupArgs {
    pub cwd_file: Option<PathBuf>,
    pub reload_file: Option<PathBuf>,
    pub args: Vec<String>,
    pub trace_memory: bool,
}

impl StartupArgs {
    /// `-` or an empty string means "no file". `=m` is removed from `args` and
    /// turns on memory tracing.
    pub fn new(cwd_file: Option<String>, reload_file: Option<String>, mut args: Vec<String>) -> Self {
        let trace_memory = memtrace::strip_flag(&mut args);
        Self {
            cwd_file: file_arg(cwd_file),
            reload_file: file_arg(reload_file),
            args,
            trace_memory,
        }
    }
}

fn file_arg(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|v| !v.is_empty() && v != NO_FILE)
        .map(PathBuf::from)
}

/// What one run is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// 0 for the first run, incremented by every reload.
    pub generation: usize,
}

/// How one run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: ControlSignal,
    pub cwd: PathBuf,
}

/// Runs `run` until it reports `Exit`. Returns the final working directory.
///
/// # Errors
/// Errors of `run`, and failures writing the reload or cwd file.
pub fn supervise<F>(startup: StartupArgs, initial_cwd: PathBuf, mut run: F) -> Result<PathBuf>
where
    F: FnMut(RunRequest) -> Result<RunReport>,
{
    if startup.trace_memory {
        memtrace::enable();
    }

    let mut args = startup.args;
    let mut cwd = initial_cwd.clone();
    let mut generation = 0;

    loop {
        let _probe = MemoryProbe::start(format!("run {}", generation));
        log::debug!("Starting run {} with args {:?}", generation, args);
        let report = run(RunRequest {
            args: std::mem::take(&mut args),
            cwd: cwd.clone(),
            generation,
        })?;
        cwd = report.cwd;

        match report.outcome {
            ControlSignal::Exit => break,
            ControlSignal::Reload(signal) => {
                log::info!("Reloading: '{}'", signal.as_str());
                args = signal.into_args();
                if memtrace::strip_flag(&mut args) {
                    log::debug!("Ignoring '=m' in reload arguments; tracing is set at startup.");
                }
                if let Some(path) = &startup.reload_file {
                    write_reload_file(path, &args)?;
                }
                generation += 1;
            }
        }
    }

    if cwd != initial_cwd
        && let Some(path) = &startup.cwd_file
    {
        fs::write(path, cwd.display().to_string())
            .with_context(|| format!("Failed to write cwd file '{}'", path.display()))?;
        log::debug!("Wrote final directory to '{}'.", path.display());
    }
    Ok(cwd)
}

fn write_reload_file(path: &Path, args: &[String]) -> Result<()> {
    let line = shlex::try_join(args.iter().map(String::as_str))
        .map_err(|e| anyhow!("Cannot quote reload arguments: {}", e))?;
    fs::write(path, line)
        .with_context(|| format!("Failed to write reload file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ReloadSignal;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_startup_args_normalization() {
        let startup = StartupArgs::new(
            Some("-".into()),
            Some(String::new()),
            strings(&["echo", "=m", "hi"]),
        );
        assert_eq!(startup.cwd_file, None);
        assert_eq!(startup.reload_file, None);
        assert_eq!(startup.args, strings(&["echo", "hi"]));
        assert!(startup.trace_memory);

        let startup = StartupArgs::new(Some("/tmp/cwd".into()), None, vec![]);
        assert_eq!(startup.cwd_file, Some(PathBuf::from("/tmp/cwd")));
        assert!(!startup.trace_memory);
    }

    #[test]
    fn test_reload_splits_arguments_for_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let reload_file = dir.path().join("reload");
        let startup = StartupArgs {
            reload_file: Some(reload_file.clone()),
            args: strings(&["first"]),
            ..StartupArgs::default()
        };

        let mut seen = Vec::new();
        supervise(startup, dir.path().to_path_buf(), |request| {
            seen.push((request.generation, request.args.clone()));
            let outcome = if request.generation == 0 {
                ControlSignal::Reload(ReloadSignal::new("foo bar"))
            } else {
                ControlSignal::Exit
            };
            Ok(RunReport {
                outcome,
                cwd: request.cwd,
            })
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![(0, strings(&["first"])), (1, strings(&["foo", "bar"]))]
        );
        assert_eq!(fs::read_to_string(reload_file).unwrap(), "foo bar");
    }

    #[test]
    fn test_memory_flag_is_dropped_from_reload_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        supervise(StartupArgs::default(), dir.path().to_path_buf(), |request| {
            seen.push(request.args.clone());
            let outcome = if request.generation == 0 {
                ControlSignal::Reload(ReloadSignal::new("=m foo"))
            } else {
                ControlSignal::Exit
            };
            Ok(RunReport {
                outcome,
                cwd: request.cwd,
            })
        })
        .unwrap();
        assert_eq!(seen, vec![Vec::<String>::new(), strings(&["foo"])]);
    }

    #[test]
    fn test_moved_directory_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let cwd_file = dir.path().join("cwd");
        let moved = dir.path().join("elsewhere");
        let startup = StartupArgs {
            cwd_file: Some(cwd_file.clone()),
            ..StartupArgs::default()
        };

        let last = supervise(startup, dir.path().to_path_buf(), |_| {
            Ok(RunReport {
                outcome: ControlSignal::Exit,
                cwd: moved.clone(),
            })
        })
        .unwrap();
        assert_eq!(last, moved);
        assert_eq!(fs::read_to_string(&cwd_file).unwrap(), moved.display().to_string());
    }

    #[test]
    fn test_unchanged_directory_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cwd_file = dir.path().join("cwd");
        let startup = StartupArgs {
            cwd_file: Some(cwd_file.clone()),
            ..StartupArgs::default()
        };
        supervise(startup, dir.path().to_path_buf(), |request| {
            Ok(RunReport {
                outcome: ControlSignal::Exit,
                cwd: request.cwd,
            })
        })
        .unwrap();
        assert!(!cwd_file.exists());
    }

    #[test]
    fn test_run_errors_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let result = supervise(StartupArgs::default(), dir.path().to_path_buf(), |_| {
            Err(anyhow!("cache directory unwritable"))
        });
        assert!(result.is_err());
    }
}
