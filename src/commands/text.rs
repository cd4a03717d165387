// src/commands/text.rs

use crate::core::context::Context;
use crate::core::deferred::{Deferred, Method};
use crate::core::registry::CommandError;
use crate::models::{ArgSpec, ArgType, ParsedArguments, Signature, Value};
use anyhow::anyhow;

fn joined(items: &[Value]) -> String {
    items.iter().map(Value::plaintext).collect::<Vec<_>>().join(" ")
}

// --- echo ---

/// Rest words, cacheable.
pub fn echo_signature() -> Signature {
    Signature::new("Prints its arguments.").arg(ArgSpec::rest("words"))
}

/// Joins its words with single spaces.
pub fn echo(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    Ok(Value::str(joined(args.get_list("words"))))
}

// --- upper ---

pub fn upper_signature() -> Signature {
    Signature::new("Uppercases text.")
        .arg(ArgSpec::positional("text", ArgType::Str))
        .arg(ArgSpec::rest("more"))
}

/// Uppercases the text and any extra words, joined by spaces.
pub fn upper(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let mut text = args.get_str("text").unwrap_or_default().to_string();
    let more = args.get_list("more");
    if !more.is_empty() {
        text.push(' ');
        text.push_str(&joined(more));
    }
    Ok(Value::str(text.to_uppercase()))
}

// --- split ---

pub fn split_signature() -> Signature {
    Signature::new("Splits text into a list.")
        .arg(ArgSpec::positional("text", ArgType::Str))
        .arg(
            ArgSpec::option("sep", ArgType::Str)
                .short('s')
                .help("Separator; whitespace when not given."),
        )
}

/// Splits on `--sep`, or on whitespace when no separator is given.
pub fn split(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let text = args.get_str("text").unwrap_or_default();
    let parts: Vec<Value> = match args.get_str("sep").filter(|s| !s.is_empty()) {
        Some(sep) => text.split(sep).map(Value::str).collect(),
        None => text.split_whitespace().map(Value::str).collect(),
    };
    Ok(Value::List(parts))
}

// --- count ---

pub fn count_signature() -> Signature {
    Signature::new("Counts its items.").arg(ArgSpec::rest("items"))
}

/// Number of items received.
pub fn count(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let n = i64::try_from(args.get_list("items").len()).map_err(|e| anyhow!(e))?;
    Ok(Value::Int(n))
}

// --- head ---

pub fn head_signature() -> Signature {
    Signature::new("Keeps the first n items.")
        .arg(ArgSpec::rest("items"))
        .arg(
            ArgSpec::option("n", ArgType::Int)
                .short('n')
                .deferred(Deferred::arg("items").call(Method::Len, vec![]))
                .help("How many; all of them by default."),
        )
}

/// The first `n` items; negative counts are rejected.
pub fn head(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let items = args.get_list("items");
    let n = args.get_int("n").unwrap_or_default();
    let Ok(n) = usize::try_from(n) else {
        return Err(anyhow!("head needs a non-negative count, got {}", n).into());
    };
    Ok(Value::List(items.iter().take(n).cloned().collect()))
}

// --- fail ---

pub fn fail_signature() -> Signature {
    Signature::new("Always fails; for trying out control flow.").arg(ArgSpec::rest("reason"))
}

/// # Errors
/// Always, with the given reason as the message.
pub fn fail(args: &ParsedArguments, _: &mut Context) -> Result<Value, CommandError> {
    let reason = joined(args.get_list("reason"));
    if reason.is_empty() {
        return Err(anyhow!("fail was called").into());
    }
    Err(anyhow!(reason).into())
}
