// src/core/interpreter.rs

use crate::commands;
use crate::core::cache::CacheStore;
use crate::core::command_list::{CommandList, Step};
use crate::core::context::Context;
use crate::core::engine::{Engine, ExecutionError};
use crate::core::events::SessionEvent;
use crate::core::expander::ExpandOptions;
use crate::core::lexer;
use crate::core::paths::Layout;
use crate::core::pool::WorkerPool;
use crate::core::registry::{ControlSignal, Registry, ReloadSignal};
use crate::dev_utils::BlockTimer;
use crate::models::Response;
use crate::render;
use crate::settings::Settings;
use anyhow::{Context as _, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// One visible outcome of a line, in the order it happened.
#[derive(Debug)]
pub enum LineEntry {
    Response(Response),
    Failure(ExecutionError),
}

/// Everything one input line produced.
#[derive(Debug, Default)]
pub struct LineReport {
    pub entries: Vec<LineEntry>,
    pub control: Option<ControlSignal>,
}

impl LineReport {
    /// The successful responses, in order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.entries.iter().filter_map(|entry| match entry {
            LineEntry::Response(response) => Some(response),
            LineEntry::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionError> {
        self.entries.iter().filter_map(|entry| match entry {
            LineEntry::Failure(error) => Some(error),
            LineEntry::Response(_) => None,
        })
    }
}

/// A fresh command registry, context and settings for one run.
#[derive(Debug)]
pub struct Interpreter {
    registry: Registry,
    context: Context,
    settings: Settings,
    history: Option<PathBuf>,
}

impl Interpreter {
    /// Builds an interpreter with every builtin registered.
    ///
    /// # Errors
    /// Fails when the worker pool cannot be started.
    pub fn new(settings: Settings, layout: &Layout, cwd: PathBuf) -> Result<Self> {
        let pool = WorkerPool::new(settings.pool_size)?;
        let context = Context::new(cwd, CacheStore::new(&layout.cache), pool);
        let mut registry = Registry::new();
        commands::register_builtins(&mut registry);
        let history = settings.history.then(|| layout.history_file());
        Ok(Self::from_parts(registry, context, settings, history))
    }

    /// Assembles an interpreter from ready-made parts. `history` is where
    /// input lines are appended, if anywhere.
    pub fn from_parts(
        registry: Registry,
        mut context: Context,
        settings: Settings,
        history: Option<PathBuf>,
    ) -> Self {
        let session = context.session();
        context.events_mut().subscribe(session, |event| match event {
            SessionEvent::CwdChanged { from, to } => {
                log::debug!("Working directory {} -> {}", from.display(), to.display());
            }
            SessionEvent::CacheWritten { path } => {
                log::debug!("Cache entry written: {}", path.display());
            }
        });
        Self {
            registry,
            context,
            settings,
            history,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs one line through tokenizer, builder and engine.
    ///
    /// A tokenizer error fails the whole line; every other failure belongs
    /// to its command and follows the control-flow operators.
    pub fn run_line(&mut self, line: &str) -> LineReport {
        let _timer = BlockTimer::new(format!("line {:?}", line));
        let mut report = LineReport::default();
        let tokens = match lexer::tokenize(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                report.entries.push(LineEntry::Failure(e.into()));
                return report;
            }
        };

        let options = ExpandOptions {
            ranges: self.settings.range_expansion,
        };
        let mut list = CommandList::build(&tokens, options);
        let engine = Engine::new(&self.registry);
        let context = &mut self.context;

        for step in list.traverse(|command, piped| engine.execute(command, piped, context)) {
            match step {
                Step::Executed { response, .. } => report.entries.push(LineEntry::Response(response)),
                Step::Failed { index, message } => {
                    log::debug!("Command {} failed: {}", index, message);
                }
                Step::Skipped { index } => log::trace!("Command {} skipped.", index),
                Step::Raised(error) => report.entries.push(LineEntry::Failure(error)),
                Step::Control(signal) => report.control = Some(signal),
            }
        }
        report
    }

    /// The read-eval-print loop. `args`, when present, run as the first line.
    ///
    /// Returns the control signal that ended the run: `Exit` at end of input
    /// or on `exit`, `Reload` from `reload` or a blank line when
    /// `reload_on_blank` is set.
    ///
    /// # Errors
    /// Only I/O errors on the given streams.
    pub fn run<R, W, E>(
        &mut self,
        args: &[String],
        mut input: R,
        out: &mut W,
        err: &mut E,
        interactive: bool,
    ) -> Result<ControlSignal>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        let first = lexer::join_args(args).unwrap_or_else(|e| {
            log::warn!("Could not quote startup arguments ({}); joining them as-is.", e);
            args.join(" ")
        });
        let mut pending = Some(first).filter(|line| !line.trim().is_empty());

        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => {
                    if interactive {
                        write!(out, "{}", self.settings.prompt)?;
                        out.flush()?;
                    }
                    let mut buffer = String::new();
                    if input.read_line(&mut buffer).context("Failed to read input")? == 0 {
                        return Ok(ControlSignal::Exit);
                    }
                    let line = buffer.trim_end_matches(['\n', '\r']).to_string();
                    if line.trim().is_empty() {
                        if self.settings.reload_on_blank {
                            log::info!("Blank line; reloading.");
                            return Ok(ControlSignal::Reload(ReloadSignal::default()));
                        }
                        continue;
                    }
                    self.append_history(&line);
                    line
                }
            };

            let report = self.run_line(&line);
            render::print_report(&report, out, err)?;
            if let Some(signal) = report.control {
                return Ok(signal);
            }
        }
    }

    fn append_history(&self, line: &str) {
        let Some(path) = &self.history else {
            return;
        };
        if let Err(e) = append_line(path, line) {
            log::warn!("Could not append to history '{}': {}", path.display(), e);
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::tests::context_in;
    use std::io::Cursor;

    fn interpreter(dir: &Path, settings: Settings) -> Interpreter {
        let mut registry = Registry::new();
        commands::register_builtins(&mut registry);
        let history = Some(dir.join("history"));
        Interpreter::from_parts(registry, context_in(dir), settings, history)
    }

    fn texts(report: &LineReport) -> Vec<String> {
        report.responses().map(Response::text).collect()
    }

    #[test]
    fn test_comma_list_runs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("echo a,b,c");
        assert_eq!(texts(&report), vec!["a", "b", "c"]);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn test_failure_then_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("fail ; echo ok");
        assert_eq!(texts(&report), vec!["ok"]);
        let failures: Vec<_> = report.failures().map(ToString::to_string).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Command 'fail' failed"));
        assert!(matches!(report.entries[0], LineEntry::Failure(_)));
    }

    #[test]
    fn test_pipes_between_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("echo hello world | upper");
        assert_eq!(texts(&report).last().map(String::as_str), Some("HELLO WORLD"));

        let report = interp.run_line("split a:b:c --sep : @| echo");
        assert_eq!(texts(&report).last().map(String::as_str), Some("a b c"));
    }

    #[test]
    fn test_lex_error_fails_whole_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("echo 'open ; echo b");
        assert_eq!(report.responses().count(), 0);
        assert!(matches!(
            report.failures().next(),
            Some(ExecutionError::Lex(_))
        ));
    }

    #[test]
    fn test_cached_command_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let first = interp.run_line("echo cached value =c");
        let second = interp.run_line("echo cached value =c");
        let (a, b) = (
            first.responses().next().unwrap(),
            second.responses().next().unwrap(),
        );
        assert!(!a.from_cache());
        assert!(b.from_cache());
        assert_eq!(a.text(), b.text());
        assert_eq!(interp.context().cache().entries().len(), 1);
    }

    #[test]
    fn test_quoted_comma_is_a_different_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        interp.run_line("echo a b =c");
        let report = interp.run_line("echo 'a,b' =c");
        let response = report.responses().next().unwrap();
        assert!(!response.from_cache());
        assert_eq!(response.text(), "a,b");
        assert_eq!(interp.context().cache().entries().len(), 2);
    }

    #[test]
    fn test_pipe_does_not_swallow_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("fail disk full | echo x");
        assert_eq!(texts(&report), vec!["x"]);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_output_file_follows_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let report = interp.run_line("cd sub ; echo hi =o out.txt");
        assert_eq!(report.failures().count(), 0);
        let written = std::fs::read_to_string(dir.path().join("sub").join("out.txt")).unwrap();
        assert_eq!(written, "hi");
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_run_executes_args_then_input_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let input = Cursor::new("echo second\n\necho third\n");
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let args = vec!["echo".to_string(), "first".to_string()];
        let signal = interp.run(&args, input, &mut out, &mut err, false).unwrap();
        assert_eq!(signal, ControlSignal::Exit);
        assert_eq!(String::from_utf8(out).unwrap(), "first\nsecond\nthird\n");

        let history = std::fs::read_to_string(dir.path().join("history")).unwrap();
        assert_eq!(history, "echo second\necho third\n");
    }

    #[test]
    fn test_startup_args_are_not_resplit() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let args: Vec<String> = ["echo", "a;b", "x,y"].iter().map(|s| s.to_string()).collect();
        interp
            .run(&args, Cursor::new(""), &mut out, &mut err, false)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a;b x\na;b y\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_run_stops_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        let input = Cursor::new("reload foo bar\necho never\n");
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let signal = interp.run(&[], input, &mut out, &mut err, false).unwrap();
        assert_eq!(signal, ControlSignal::Reload(ReloadSignal::new("foo bar")));
        assert!(out.is_empty());
    }

    #[test]
    fn test_blank_line_reloads_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            reload_on_blank: true,
            ..Settings::default()
        };
        let mut interp = interpreter(dir.path(), settings);
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let signal = interp
            .run(&[], Cursor::new("\n"), &mut out, &mut err, true)
            .unwrap();
        assert_eq!(signal, ControlSignal::Reload(ReloadSignal::default()));
        assert_eq!(String::from_utf8(out).unwrap(), "dag> ");
    }

    #[test]
    fn test_range_expansion_follows_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interpreter(dir.path(), Settings::default());
        assert_eq!(texts(&interp.run_line("echo 1..3")), vec!["1..3"]);

        let settings = Settings {
            range_expansion: true,
            ..Settings::default()
        };
        let mut interp = interpreter(dir.path(), settings);
        assert_eq!(texts(&interp.run_line("echo 1..3")), vec!["1", "2", "3"]);
    }
}
