// src/commands/session.rs

use crate::core::context::Context;
use crate::core::registry::{CommandError, ControlSignal, ReloadSignal};
use crate::models::{ArgSpec, ArgType, ParsedArguments, Signature, Value};
use anyhow::anyhow;
use std::time::Duration;

pub fn cd_signature() -> Signature {
    Signature::new("Changes the working directory of the session.")
        .arg(ArgSpec::positional("path", ArgType::Str).default_value("~"))
}

/// Moves the session directory. Defaults to the home directory.
pub fn cd(args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
    let target = args.get_str("path").unwrap_or("~");
    let cwd = ctx.change_dir(target).map_err(|e| anyhow!(e))?;
    Ok(Value::str(cwd.display().to_string()))
}

pub fn pwd_signature() -> Signature {
    Signature::new("Prints the working directory of the session.")
}

/// The session directory, which may differ from the process directory.
pub fn pwd(_: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
    Ok(Value::str(ctx.cwd().display().to_string()))
}

pub fn sleep_signature() -> Signature {
    Signature::new("Waits for a number of seconds.")
        .arg(ArgSpec::positional("seconds", ArgType::Float).default_value(Value::Float(1.0)))
}

pub fn sleep(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let seconds = args.get_float("seconds").unwrap_or(1.0);
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|e| anyhow!("Cannot sleep for {} seconds: {}", seconds, e))?;
    std::thread::sleep(duration);
    Ok(Value::Float(seconds))
}

pub fn reload_signature() -> Signature {
    Signature::new("Restarts the interpreter, optionally with new startup arguments.")
        .arg(ArgSpec::rest("args").non_cacheable())
}

/// Ends the run with a reload carrying the remaining words.
/// Never returns a value: the signal travels in the error channel.
pub fn reload(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let line = args
        .get_list("args")
        .iter()
        .map(Value::plaintext)
        .collect::<Vec<_>>()
        .join(" ");
    Err(CommandError::Control(ControlSignal::Reload(ReloadSignal::new(line))))
}

pub fn exit_signature() -> Signature {
    Signature::new("Ends the session.")
}

/// Ends the run.
pub fn exit(_: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    Err(CommandError::Control(ControlSignal::Exit))
}
