// src/core/registry.rs

use crate::core::context::Context;
use crate::models::{ParsedArguments, Signature, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// --- Control Signals ---

/// The argument line a reload carries into the next run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReloadSignal(String);

impl ReloadSignal {
    /// A reload whose next run starts with the line `args`.
    pub fn new(args: impl Into<String>) -> Self {
        Self(args.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The next run's startup arguments: the line split on whitespace.
    pub fn into_args(self) -> Vec<String> {
        self.0.split_whitespace().map(String::from).collect()
    }
}

/// Requests that unwind a whole run. They travel in the error channel but are
/// never failures: no catch directive or control-flow operator stops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    Reload(ReloadSignal),
    Exit,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reload(signal) if signal.as_str().is_empty() => f.write_str("reload"),
            Self::Reload(signal) => write!(f, "reload {}", signal.as_str()),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// What a dagcmd may return instead of a value.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
    #[error("{0}")]
    Control(ControlSignal),
}

// --- Commands ---

/// The capability every invocable command provides.
pub trait DagCmd {
    /// Dotted command path, e.g. `cache.list`.
    fn path(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn signature(&self) -> Signature;

    /// Runs the command.
    ///
    /// # Errors
    /// A [`CommandError::Failed`] for any failure, or a control signal.
    fn invoke(&self, args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError>;
}

/// Handler signature of table-defined commands.
pub type Handler = fn(&ParsedArguments, &mut Context) -> Result<Value, CommandError>;

/// A command defined by a static table entry.
#[derive(Debug)]
pub struct CommandDefinition {
    pub path: &'static str,
    pub aliases: &'static [&'static str],
    pub signature: fn() -> Signature,
    pub handler: Handler,
}

impl DagCmd for CommandDefinition {
    fn path(&self) -> &str {
        self.path
    }

    fn aliases(&self) -> &[&str] {
        self.aliases
    }

    fn signature(&self) -> Signature {
        (self.signature)()
    }

    fn invoke(&self, args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
        (self.handler)(args, ctx)
    }
}

/// A command in the registry, with its signature computed once.
pub struct Registered {
    command: Box<dyn DagCmd>,
    signature: Signature,
}

impl Registered {
    /// The dotted path the command was registered under.
    pub fn path(&self) -> &str {
        self.command.path()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// # Errors
    /// Whatever the command returns.
    pub fn invoke(&self, args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
        self.command.invoke(args, ctx)
    }
}

impl fmt::Debug for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registered").field("path", &self.path()).finish()
    }
}

// --- Registry ---

/// All commands of one interpreter run, keyed by lowercased dotted path.
#[derive(Debug, Default)]
pub struct Registry {
    commands: BTreeMap<String, Registered>,
    aliases: BTreeMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. A later registration with the same path replaces the earlier one.
    pub fn register(&mut self, command: Box<dyn DagCmd>) {
        let path = command.path().to_lowercase();
        for alias in command.aliases() {
            self.aliases.insert(alias.to_lowercase(), path.clone());
        }
        let signature = command.signature();
        log::trace!("Registered command '{}'.", path);
        self.commands.insert(path, Registered { command, signature });
    }

    /// Registers every entry of a static table.
    pub fn register_table(&mut self, table: &'static [CommandDefinition]) {
        for definition in table {
            self.register(Box::new(StaticCommand(definition)));
        }
    }

    /// Looks up a path or alias, ignoring case.
    pub fn get(&self, path: &str) -> Option<&Registered> {
        let path = path.to_lowercase();
        let path = self.aliases.get(&path).unwrap_or(&path);
        self.commands.get(path)
    }

    /// Resolves the longest run of leading words that names a command.
    /// Returns the command and the number of words its path used.
    pub fn resolve(&self, words: &[String]) -> Option<(&Registered, usize)> {
        (1..=words.len()).rev().find_map(|count| {
            let path = words.get(..count)?.join(".");
            self.get(&path).map(|registered| (registered, count))
        })
    }

    /// Paths of all commands in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Adapts a `'static` table entry to a boxed [`DagCmd`].
struct StaticCommand(&'static CommandDefinition);

impl DagCmd for StaticCommand {
    fn path(&self) -> &str {
        self.0.path()
    }

    fn aliases(&self) -> &[&str] {
        self.0.aliases()
    }

    fn signature(&self) -> Signature {
        self.0.signature()
    }

    fn invoke(&self, args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
        self.0.invoke(args, ctx)
    }
}
