// src/core/engine.rs

use crate::core::arg_parser::{ArgParser, ParseError, Scanned};
use crate::core::cache::{CacheError, CacheIdentity};
use crate::core::command_list::{InputCommand, Piped};
use crate::core::context::{Context, Scope};
use crate::core::directives::{CachePolicy, Directive, DirectiveError, DirectiveSet};
use crate::core::events::SessionEvent;
use crate::core::expander::ExpandError;
use crate::core::lexer::LexError;
use crate::core::registry::{CommandError, ControlSignal, Registered, Registry};
use crate::models::{ParsedArguments, Response, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Everything that can make a single command fail, from tokenizing to the
/// response directives. [`ExecutionError::Control`] is not a failure.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Expand(#[from] ExpandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unknown command '{0}'.")]
    UnknownCommand(String),
    /// The command itself failed; wraps the original cause.
    #[error("Command '{command}' failed: {source}")]
    Command {
        command: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Directive(#[from] DirectiveError),
    /// Not a failure: a reload or exit unwinding to the supervisor.
    #[error("{0}")]
    Control(ControlSignal),
}

/// Runs single commands against a registry.
#[derive(Debug)]
pub struct Engine<'r> {
    registry: &'r Registry,
}

impl<'r> Engine<'r> {
    /// An engine that resolves command words in `registry`.
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Executes one command: resolve, parse, meta check, execution directives,
    /// cache-or-invoke, then response directives.
    ///
    /// # Errors
    /// Any [`ExecutionError`]. Control signals are returned as
    /// [`ExecutionError::Control`] and are never caught.
    pub fn execute(
        &self,
        command: &mut InputCommand,
        piped: Option<Piped>,
        ctx: &mut Context,
    ) -> Result<Response, ExecutionError> {
        command.reset();
        if let Some(error) = command.expand_error() {
            return Err(error.clone().into());
        }
        if command.is_empty() {
            let response = Response::empty();
            command.attach_response(response.clone());
            return Ok(response);
        }

        let (registered, used) = self
            .registry
            .resolve(command.words())
            .ok_or_else(|| {
                ExecutionError::UnknownCommand(command.words().first().cloned().unwrap_or_default())
            })?;
        let path = registered.path().to_string();
        let parser = ArgParser::new(registered.signature());
        let tokens = command.words().get(used..).unwrap_or_default().to_vec();
        log::debug!("Resolved '{}' with {} argument tokens.", path, tokens.len());

        let scanned = parser.scan(&tokens, piped)?;
        let directives = scanned.directives.clone();

        if let Some(meta) = directives.first_meta() {
            log::debug!("Meta directive {:?} replaces execution of '{}'.", meta, path);
            let value = self.run_meta(meta, registered, &parser, scanned, ctx)?;
            command.attach_parse(None, directives);
            let response = Response::new(path, value, Duration::ZERO, false);
            command.attach_response(response.clone());
            return Ok(response);
        }

        let args = parser.assemble(scanned)?;
        command.attach_parse(Some(args.clone()), directives.clone());

        let mut response = self.run(&path, registered, &args, &directives, ctx)?;
        directives.apply_responses(&mut response, ctx.cwd())?;
        command.attach_response(response.clone());
        Ok(response)
    }

    fn run(
        &self,
        path: &str,
        registered: &Registered,
        args: &ParsedArguments,
        directives: &DirectiveSet,
        ctx: &mut Context,
    ) -> Result<Response, ExecutionError> {
        let plan = directives.plan();
        let identity = CacheIdentity::new(path, args, registered.signature());
        let started = Instant::now();

        if plan.cache == CachePolicy::ReadOrWriteOnce {
            match ctx.cache().read(&identity) {
                Ok(value) => {
                    log::debug!("Cache hit for '{}'.", path);
                    return Ok(Response::new(path, value, started.elapsed(), true));
                }
                Err(CacheError::Miss(_)) => log::debug!("Cache miss for '{}'.", path),
                Err(e) => log::warn!("Ignoring unreadable cache entry: {}", e),
            }
        }

        let scope = Scope {
            catch_failures: plan.catch_failures,
        };
        let outcome = ctx.scoped(scope, |ctx| registered.invoke(args, ctx));
        let elapsed = started.elapsed();

        let value = match outcome {
            Ok(value) => value,
            Err(CommandError::Control(signal)) => return Err(ExecutionError::Control(signal)),
            Err(CommandError::Failed(cause)) if plan.catch_failures => {
                log::debug!("Caught failure of '{}': {:#}", path, cause);
                let mut response = Response::new(path, Value::Null, elapsed, false);
                response.push_note(format!("caught: {}", cause));
                return Ok(response);
            }
            Err(CommandError::Failed(cause)) => {
                return Err(ExecutionError::Command {
                    command: path.to_string(),
                    source: cause.into(),
                });
            }
        };

        if plan.cache != CachePolicy::Bypass {
            let written = ctx.cache().write(&identity, &value)?;
            ctx.publish(&SessionEvent::CacheWritten { path: written });
        }
        Ok(Response::new(path, value, elapsed, false))
    }

    fn run_meta(
        &self,
        meta: &Directive,
        registered: &Registered,
        parser: &ArgParser<'_>,
        scanned: Scanned,
        ctx: &Context,
    ) -> Result<Value, ExecutionError> {
        let signature = registered.signature();
        if *meta != Directive::Explain {
            return Ok(Value::str(signature.usage(registered.path())));
        }

        let args = parser.assemble(scanned)?;
        let identity = CacheIdentity::new(registered.path(), &args, signature);
        let path = ctx.cache().path_for(&identity);
        let mut explained = BTreeMap::new();
        explained.insert("command".to_string(), Value::str(identity.command()));
        explained.insert("identity".to_string(), Value::str(identity.stem()));
        explained.insert("path".to_string(), Value::str(path.display().to_string()));
        explained.insert("cached".to_string(), Value::Bool(ctx.cache().exists(&identity)));
        Ok(Value::Map(explained))
    }
}
