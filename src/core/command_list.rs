// src/core/command_list.rs

use crate::core::directives::DirectiveSet;
use crate::core::engine::ExecutionError;
use crate::core::expander::{self, ExpandError, ExpandOptions};
use crate::core::lexer::{Operator, Token};
use crate::core::registry::ControlSignal;
use crate::models::{ParsedArguments, Response, Value};

// --- Commands ---

/// One invocation of a dagcmd as it appeared on the input line.
///
/// The words and the terminator are fixed at creation. The engine attaches the
/// parse result, the directives and the response while it runs the command.
#[derive(Debug, Clone)]
pub struct InputCommand {
    words: Vec<String>,
    terminator: Operator,
    expand_error: Option<ExpandError>,
    parsed: Option<ParsedArguments>,
    directives: DirectiveSet,
    response: Option<Response>,
}

impl InputCommand {
    /// A command made of `words`, followed in its line by `terminator`.
    pub fn new(words: Vec<String>, terminator: Operator) -> Self {
        Self {
            words,
            terminator,
            expand_error: None,
            parsed: None,
            directives: DirectiveSet::default(),
            response: None,
        }
    }

    /// A command whose expansion failed. It fails in place when executed.
    pub fn failed(words: Vec<String>, terminator: Operator, error: ExpandError) -> Self {
        Self {
            expand_error: Some(error),
            ..Self::new(words, terminator)
        }
    }

    /// The expanded words: command path first, then its arguments.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The operator after this command; `;` for the last one.
    pub fn terminator(&self) -> Operator {
        self.terminator
    }

    /// An empty command is a no-op.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.expand_error.is_none()
    }

    pub fn expand_error(&self) -> Option<&ExpandError> {
        self.expand_error.as_ref()
    }

    /// Forgets everything attached by a previous run of this command.
    pub fn reset(&mut self) {
        self.parsed = None;
        self.directives = DirectiveSet::default();
        self.response = None;
    }

    /// Records the parse result of the latest run.
    pub fn attach_parse(&mut self, parsed: Option<ParsedArguments>, directives: DirectiveSet) {
        self.parsed = parsed;
        self.directives = directives;
    }

    pub fn attach_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// `None` before the command ran, and after a meta directive replaced it.
    pub fn parsed(&self) -> Option<&ParsedArguments> {
        self.parsed.as_ref()
    }

    pub fn directives(&self) -> &DirectiveSet {
        &self.directives
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

// --- Piping ---

/// Where a piped value lands among the positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    First,
    Second,
    Last,
    /// List elements become the leading positionals.
    Splat,
}

impl PipeMode {
    /// The pipe mode of a pipe operator, `None` for any other operator.
    pub fn from_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Pipe => Some(Self::First),
            Operator::PipeSecond => Some(Self::Second),
            Operator::PipeLast => Some(Self::Last),
            Operator::PipeSplat => Some(Self::Splat),
            _ => None,
        }
    }
}

/// The previous response handed to a piped command.
#[derive(Debug, Clone, PartialEq)]
pub struct Piped {
    pub mode: PipeMode,
    pub value: Value,
}

// --- Building ---

/// The ordered commands of one input line.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<InputCommand>,
}

impl CommandList {
    /// Groups `tokens` into commands and expands their comma-lists.
    ///
    /// Expansion errors do not fail the build; they are stored on the command
    /// they belong to.
    pub fn build(tokens: &[Token], options: ExpandOptions) -> Self {
        let mut segments: Vec<(Vec<Token>, Operator)> = Vec::new();
        let mut current: Vec<Token> = Vec::new();

        for token in tokens {
            match token {
                Token::Operator(op) if *op != Operator::Comma => {
                    segments.push((std::mem::take(&mut current), *op));
                }
                other => current.push(other.clone()),
            }
        }
        if !current.is_empty() || segments.is_empty() {
            segments.push((current, Operator::Sequence));
        }
        log::debug!("Split input into {} segments.", segments.len());

        let mut commands = Vec::new();
        let mut previous = Operator::Sequence;
        for (run, terminator) in segments {
            let piped = previous.is_pipe();
            previous = terminator;
            match expander::expand(&run, piped, options) {
                Ok(expanded) => {
                    let count = expanded.len();
                    for (i, words) in expanded.into_iter().enumerate() {
                        let term = if i + 1 == count {
                            terminator
                        } else {
                            Operator::Sequence
                        };
                        commands.push(InputCommand::new(words, term));
                    }
                }
                Err(error) => {
                    log::debug!("Expansion failed: {}", error);
                    let words = run
                        .into_iter()
                        .filter_map(|t| match t {
                            Token::Word(w) => Some(w),
                            Token::Operator(_) => None,
                        })
                        .collect();
                    commands.push(InputCommand::failed(words, terminator, error));
                }
            }
        }

        Self { commands }
    }

    /// The commands in line order.
    pub fn commands(&self) -> &[InputCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Starts a lazy, in-order traversal with fresh control-flow state.
    ///
    /// `execute` runs one command, receiving the piped value when the command
    /// is connected to its predecessor by a pipe operator.
    pub fn traverse<F>(&mut self, execute: F) -> Traversal<'_, F>
    where
        F: FnMut(&mut InputCommand, Option<Piped>) -> Result<Response, ExecutionError>,
    {
        Traversal {
            commands: &mut self.commands,
            execute,
            position: 0,
            connector: Operator::Sequence,
            pending: None,
            last: None,
            queued: None,
            done: false,
        }
    }
}

// --- Traversal ---

/// What happened at one point of a traversal.
#[derive(Debug)]
pub enum Step {
    Executed { index: usize, response: Response },
    /// The command ran and failed; the failure is now pending.
    Failed { index: usize, message: String },
    Skipped { index: usize },
    /// A pending failure crossed a `;`/`;;` boundary or the end of input.
    Raised(ExecutionError),
    /// A reload or exit request. Nothing runs after it.
    Control(ControlSignal),
}

/// The control-flow state machine over a [`CommandList`].
pub struct Traversal<'a, F> {
    commands: &'a mut [InputCommand],
    execute: F,
    position: usize,
    connector: Operator,
    pending: Option<ExecutionError>,
    last: Option<Value>,
    queued: Option<Step>,
    done: bool,
}

impl<F> Iterator for Traversal<'_, F>
where
    F: FnMut(&mut InputCommand, Option<Piped>) -> Result<Response, ExecutionError>,
{
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if let Some(step) = self.queued.take() {
            return Some(step);
        }
        if self.done {
            return None;
        }

        let index = self.position;
        let Some(command) = self.commands.get_mut(index) else {
            self.done = true;
            return self.pending.take().map(Step::Raised);
        };
        self.position += 1;

        let connector = self.connector;
        let terminator = command.terminator();
        self.connector = terminator;

        let run = match connector {
            Operator::And => self.pending.is_none(),
            Operator::Or => self.pending.take().is_some(),
            _ => true,
        };

        let step = if run {
            let piped = PipeMode::from_operator(connector).and_then(|mode| {
                self.last.clone().map(|value| Piped { mode, value })
            });
            let no_op = command.is_empty();
            match (self.execute)(command, piped) {
                Ok(response) => {
                    // Only the `||` branch above clears a pending failure.
                    if !no_op {
                        self.last = Some(response.value().clone());
                    }
                    Step::Executed { index, response }
                }
                Err(ExecutionError::Control(signal)) => {
                    log::debug!("Control signal at command {}; stopping traversal.", index);
                    self.done = true;
                    return Some(Step::Control(signal));
                }
                Err(error) => {
                    let message = error.to_string();
                    if self.pending.is_none() {
                        self.pending = Some(error);
                    } else {
                        log::debug!("Command {} failed while an earlier failure is pending.", index);
                    }
                    self.last = None;
                    Step::Failed { index, message }
                }
            }
        } else {
            log::debug!("Skipping command {} after '{}'.", index, connector);
            Step::Skipped { index }
        };

        if terminator.is_boundary() {
            if terminator == Operator::DoubleSequence {
                self.last = None;
            }
            if let Some(error) = self.pending.take() {
                self.queued = Some(Step::Raised(error));
            }
        }
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexer::tokenize;
    use crate::core::registry::ReloadSignal;
    use std::time::Duration;

    fn build(input: &str) -> CommandList {
        CommandList::build(&tokenize(input).unwrap(), ExpandOptions::default())
    }

    fn shape(list: &CommandList) -> Vec<(String, Operator)> {
        list.commands()
            .iter()
            .map(|c| (c.words().join(" "), c.terminator()))
            .collect()
    }

    /// Echoes its words, fails on `fail`, signals on `exit`, and records the run.
    fn fake(
        log: &mut Vec<String>,
    ) -> impl FnMut(&mut InputCommand, Option<Piped>) -> Result<Response, ExecutionError> + '_ {
        move |command, piped| {
            if command.is_empty() {
                return Ok(Response::empty());
            }
            let mut words = command.words().to_vec();
            if let Some(p) = piped {
                words.push(format!("<{}>", p.value.plaintext()));
            }
            let text = words.join(" ");
            log.push(text.clone());
            match command.words().first().map(String::as_str) {
                Some("fail") => Err(ExecutionError::Command {
                    command: "fail".into(),
                    source: anyhow::anyhow!("boom").into(),
                }),
                Some("exit") => Err(ExecutionError::Control(ControlSignal::Exit)),
                Some("reload") => Err(ExecutionError::Control(ControlSignal::Reload(
                    ReloadSignal::new("foo bar"),
                ))),
                _ => Ok(Response::new("echo", Value::str(text), Duration::ZERO, false)),
            }
        }
    }

    fn run(input: &str) -> (Vec<String>, Vec<String>) {
        let mut list = build(input);
        let mut log = Vec::new();
        let steps: Vec<String> = list
            .traverse(fake(&mut log))
            .map(|step| match step {
                Step::Executed { index, .. } => format!("ok {}", index),
                Step::Failed { index, .. } => format!("fail {}", index),
                Step::Skipped { index } => format!("skip {}", index),
                Step::Raised(e) => format!("raise {}", e),
                Step::Control(s) => format!("control {}", s),
            })
            .collect();
        (log, steps)
    }

    #[test]
    fn test_build_attaches_terminators() {
        let list = build("a x ; b && c || d | e");
        assert_eq!(
            shape(&list),
            vec![
                ("a x".to_string(), Operator::Sequence),
                ("b".to_string(), Operator::And),
                ("c".to_string(), Operator::Or),
                ("d".to_string(), Operator::Pipe),
                ("e".to_string(), Operator::Sequence),
            ]
        );
    }

    #[test]
    fn test_empty_input_is_one_empty_command() {
        let list = build("   ");
        assert_eq!(list.len(), 1);
        assert!(list.commands()[0].is_empty());
        assert_eq!(list.commands()[0].terminator(), Operator::Sequence);
    }

    #[test]
    fn test_leading_operator_makes_an_empty_command() {
        let list = build("&& a");
        assert_eq!(shape(&list), vec![
            (String::new(), Operator::And),
            ("a".to_string(), Operator::Sequence),
        ]);
    }

    #[test]
    fn test_siblings_are_sequenced_and_last_keeps_terminator() {
        let list = build("echo a,b,c && done");
        assert_eq!(
            shape(&list),
            vec![
                ("echo a".to_string(), Operator::Sequence),
                ("echo b".to_string(), Operator::Sequence),
                ("echo c".to_string(), Operator::And),
                ("done".to_string(), Operator::Sequence),
            ]
        );
    }

    #[test]
    fn test_expansion_error_stays_on_its_command() {
        let list = build("echo a,b c,d ; echo ok");
        assert_eq!(list.len(), 2);
        assert!(matches!(
            list.commands()[0].expand_error(),
            Some(ExpandError::MultipleCommaLists { .. })
        ));
        assert!(list.commands()[1].expand_error().is_none());
    }

    #[test]
    fn test_comma_list_after_pipe_is_rejected_in_place() {
        let list = build("echo x | upper a,b");
        assert_eq!(
            list.commands()[1].expand_error(),
            Some(&ExpandError::PipedCommaList)
        );
    }

    #[test]
    fn test_sequence_runs_both_and_raises_after_boundary() {
        let (log, steps) = run("fail ; echo ok");
        assert_eq!(log, vec!["fail", "echo ok"]);
        assert_eq!(
            steps,
            vec!["fail 0", "raise Command 'fail' failed: boom", "ok 1"]
        );
    }

    #[test]
    fn test_and_runs_only_after_success() {
        assert_eq!(run("echo a && echo b").0, vec!["echo a", "echo b"]);
        let (log, steps) = run("fail && echo b");
        assert_eq!(log, vec!["fail"]);
        assert_eq!(steps, vec!["fail 0", "skip 1", "raise Command 'fail' failed: boom"]);
    }

    #[test]
    fn test_or_runs_only_after_failure() {
        let (log, steps) = run("fail || echo recovered");
        assert_eq!(log, vec!["fail", "echo recovered"]);
        assert_eq!(steps, vec!["fail 0", "ok 1"]);

        let (log, _) = run("echo a || echo b");
        assert_eq!(log, vec!["echo a"]);
    }

    #[test]
    fn test_failure_persists_across_skips_until_boundary() {
        let (log, steps) = run("fail && a && b ; c");
        assert_eq!(log, vec!["fail", "c"]);
        assert_eq!(
            steps,
            vec![
                "fail 0",
                "skip 1",
                "skip 2",
                "raise Command 'fail' failed: boom",
                "ok 3"
            ]
        );
    }

    #[test]
    fn test_pipe_target_success_keeps_pending_failure() {
        let (log, steps) = run("fail | echo x");
        assert_eq!(log, vec!["fail", "echo x"]);
        assert_eq!(
            steps,
            vec!["fail 0", "ok 1", "raise Command 'fail' failed: boom"]
        );

        let (_, steps) = run("fail .> echo x ; echo y");
        assert_eq!(
            steps,
            vec!["fail 0", "ok 1", "raise Command 'fail' failed: boom", "ok 2"]
        );
    }

    #[test]
    fn test_first_failure_wins_until_boundary() {
        let (_, steps) = run("fail | fail ; echo y");
        assert_eq!(
            steps,
            vec!["fail 0", "fail 1", "raise Command 'fail' failed: boom", "ok 2"]
        );
        let (_, steps) = run("fail | echo x || echo fixed");
        assert_eq!(steps, vec!["fail 0", "ok 1", "ok 2"]);
    }

    #[test]
    fn test_skipped_or_does_not_update_last_response() {
        let (log, _) = run("echo a || echo b | show");
        assert_eq!(log, vec!["echo a", "show <echo a>"]);
    }

    #[test]
    fn test_pipes_inject_previous_response() {
        let mut list = build("echo a | upper >. two .> last @| splat");
        let mut seen = Vec::new();
        let steps: Vec<_> = list
            .traverse(|command, piped| {
                seen.push(piped.map(|p| p.mode));
                let text = command.words().join(" ");
                Ok(Response::new("x", Value::str(text), Duration::ZERO, false))
            })
            .collect();
        assert_eq!(steps.len(), 5);
        assert_eq!(
            seen,
            vec![
                None,
                Some(PipeMode::First),
                Some(PipeMode::Second),
                Some(PipeMode::Last),
                Some(PipeMode::Splat)
            ]
        );
    }

    #[test]
    fn test_double_sequence_forgets_last_response() {
        let (log, _) = run("echo a ;; | show");
        assert_eq!(log, vec!["echo a", "show"]);
        let (log, _) = run("echo a ; | show");
        assert_eq!(log, vec!["echo a", "show <echo a>"]);
    }

    #[test]
    fn test_control_signal_stops_traversal() {
        let (log, steps) = run("echo a ; reload ; echo b");
        assert_eq!(log, vec!["echo a", "reload"]);
        assert_eq!(steps, vec!["ok 0", "control reload foo bar"]);

        let (_, steps) = run("fail && x || exit ; echo b");
        assert_eq!(steps, vec!["fail 0", "skip 1", "control exit"]);
    }

    #[test]
    fn test_pending_failure_raised_at_end_of_input() {
        let (_, steps) = run("fail &&");
        assert_eq!(steps, vec!["fail 0", "raise Command 'fail' failed: boom"]);
    }

    #[test]
    fn test_traversals_do_not_share_state() {
        let mut list = build("fail &&");
        let mut log = Vec::new();
        let first: Vec<_> = list.traverse(fake(&mut log)).collect();
        let second: Vec<_> = list.traverse(fake(&mut log)).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(log, vec!["fail", "fail"]);
    }
}
