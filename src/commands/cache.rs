// src/commands/cache.rs

use crate::core::context::Context;
use crate::core::registry::CommandError;
use crate::models::{ArgSpec, ArgType, ParsedArguments, Signature, Value};
use anyhow::anyhow;
use std::collections::BTreeMap;

pub fn list_signature() -> Signature {
    Signature::new("Lists cached results.").arg(
        ArgSpec::positional("command", ArgType::Str)
            .default_value(Value::Null)
            .help("Only entries of this command."),
    )
}

/// One map per cache entry, optionally limited to one command.
pub fn list(args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
    let wanted = args
        .get_str("command")
        .map(|c| crate::core::cache::sanitize(&c.to_lowercase()));
    let entries = ctx
        .cache()
        .entries()
        .into_iter()
        .filter(|entry| wanted.as_ref().is_none_or(|w| *w == entry.command))
        .map(|entry| {
            let mut map = BTreeMap::new();
            map.insert("command".to_string(), Value::str(entry.command));
            map.insert("path".to_string(), Value::str(entry.path.display().to_string()));
            map.insert(
                "size".to_string(),
                Value::Int(i64::try_from(entry.size).unwrap_or(i64::MAX)),
            );
            Value::Map(map)
        })
        .collect();
    Ok(Value::List(entries))
}

pub fn clear_signature() -> Signature {
    Signature::new("Deletes cached results.").arg(
        ArgSpec::positional("command", ArgType::Str)
            .default_value(Value::Null)
            .help("Only entries of this command."),
    )
}

/// Deletes entries and returns how many were removed.
pub fn clear(args: &ParsedArguments, ctx: &mut Context) -> Result<Value, CommandError> {
    let removed = ctx
        .cache()
        .clear(args.get_str("command"))
        .map_err(|e| anyhow!(e))?;
    Ok(Value::Int(i64::try_from(removed).unwrap_or(i64::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheIdentity;

    fn seed(ctx: &Context, command: &str, key: &str) {
        let signature = Signature::new("").arg(ArgSpec::positional("key", ArgType::Str));
        let mut args = ParsedArguments::new();
        args.insert("key", Value::str(key));
        let identity = CacheIdentity::new(command, &args, &signature);
        ctx.cache().write(&identity, &Value::str(key)).unwrap();
    }

    fn only(command: Option<&str>) -> ParsedArguments {
        let mut args = ParsedArguments::new();
        args.insert("command", command.map_or(Value::Null, Value::str));
        args
    }

    #[test]
    fn test_list_and_clear_by_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = crate::core::context::tests::context_in(dir.path());
        seed(&ctx, "echo", "a");
        seed(&ctx, "echo", "b");
        seed(&ctx, "upper", "a");

        let all = list(&only(None), &mut ctx).unwrap();
        assert_eq!(all.as_list().unwrap().len(), 3);
        let echo = list(&only(Some("ECHO")), &mut ctx).unwrap();
        assert_eq!(echo.as_list().unwrap().len(), 2);

        assert_eq!(clear(&only(Some("echo")), &mut ctx).unwrap(), Value::Int(2));
        assert_eq!(clear(&only(None), &mut ctx).unwrap(), Value::Int(1));
        assert!(list(&only(None), &mut ctx).unwrap().as_list().unwrap().is_empty());
    }
}
