// src/commands/fs.rs

use crate::core::context::Context;
use crate::core::registry::CommandError;
use crate::models::{ArgSpec, ParsedArguments, Signature, Value};
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub fn stat_signature() -> Signature {
    Signature::new("Shows type and size of files, looked up in parallel.")
        .arg(ArgSpec::rest("paths").help("Files or directories; the working directory if none."))
}

/// Resolves every path on the session, then reads metadata on the worker pool.
///
/// One path gives one map, several give a list of maps in input order. With the
/// catch directive active, paths that cannot be read become `Null` instead of
/// failing the command.
pub fn stat(args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
    let mut targets: Vec<String> = args.get_list("paths").iter().map(Value::plaintext).collect();
    if targets.is_empty() {
        targets.push(".".to_string());
    }
    let lenient = ctx.scope().catch_failures;

    let resolved: Vec<Result<PathBuf, String>> = targets
        .iter()
        .map(|target| ctx.resolve_path(target).map_err(|e| e.to_string()))
        .collect();
    let stats = ctx.pool().map(resolved, |path| path.and_then(|p| describe(&p)));

    let mut values = Vec::with_capacity(stats.len());
    for stat in stats {
        match stat {
            Ok(value) => values.push(value),
            Err(reason) if lenient => {
                log::debug!("stat skipped an unreadable path: {}", reason);
                values.push(Value::Null);
            }
            Err(reason) => return Err(anyhow!(reason).into()),
        }
    }

    if values.len() == 1 {
        return Ok(values.pop().unwrap_or_default());
    }
    Ok(Value::List(values))
}

fn describe(path: &Path) -> Result<Value, String> {
    // Paths arrive canonicalized, so links are already followed.
    let meta = fs::metadata(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let kind = if meta.is_dir() {
        "dir"
    } else if meta.is_file() {
        "file"
    } else {
        "other"
    };
    log::trace!("stat {} -> {} bytes", path.display(), meta.len());

    let mut map = BTreeMap::new();
    map.insert("path".to_string(), Value::str(path.display().to_string()));
    map.insert("kind".to_string(), Value::str(kind));
    map.insert(
        "size".to_string(),
        Value::Int(i64::try_from(meta.len()).unwrap_or(i64::MAX)),
    );
    map.insert("readonly".to_string(), Value::Bool(meta.permissions().readonly()));
    Ok(Value::Map(map))
}
