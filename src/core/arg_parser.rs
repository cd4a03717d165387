// src/core/arg_parser.rs

use crate::core::command_list::{PipeMode, Piped};
use crate::core::deferred::{self, DeferredError};
use crate::core::directives::{Directive, DirectiveSet};
use crate::models::{ArgDefault, ArgKind, ArgSpec, ParsedArguments, Signature, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning argument tokens into values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A parsing step consumed nothing and produced nothing. Internal only:
    /// the offending token is dropped and parsing continues.
    #[error("Argument parser made no progress at '{token}'; token dropped.")]
    Stall { token: String },
    #[error("Unknown option '{0}'.")]
    UnknownOption(String),
    #[error("Option '{0}' expects a value.")]
    MissingValue(String),
    #[error("Missing required argument '{0}'.")]
    MissingArgument(String),
    #[error("Unexpected argument '{0}'.")]
    UnexpectedArgument(String),
    #[error("Invalid value '{value}' for '{name}': expected {expected}.")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
    #[error("Could not evaluate the default of '{name}': {source}")]
    Deferred {
        name: String,
        #[source]
        source: DeferredError,
    },
}

// --- Prefix Registry ---

/// A token class recognized by its leading characters.
#[derive(Debug)]
pub struct PrefixDefinition {
    pub prefix: &'static str,
    pub name: &'static str,
    /// Whether the text after the prefix is well formed for this class.
    pub accepts: fn(&str) -> bool,
    /// Consumes the token(s) of this class into the parse state.
    pub consume: fn(&mut ParseState<'_>) -> Result<(), ParseError>,
}

/// All prefixes, longest first. A prefix that is present but not accepted
/// falls through to the next entry and finally to a positional value.
pub static PREFIX_REGISTRY: &[PrefixDefinition] = &[
    PrefixDefinition {
        prefix: "--",
        name: "raw",
        accepts: str::is_empty,
        consume: consume_raw_marker,
    },
    PrefixDefinition {
        prefix: "--",
        name: "long",
        accepts: starts_with_letter,
        consume: consume_long,
    },
    PrefixDefinition {
        prefix: "-",
        name: "short",
        accepts: starts_with_letter,
        consume: consume_short,
    },
    PrefixDefinition {
        prefix: "=",
        name: "directive",
        accepts: all_directive_letters,
        consume: consume_directives,
    },
    PrefixDefinition {
        prefix: "\\",
        name: "escape",
        accepts: |_| true,
        consume: consume_escaped,
    },
];

fn starts_with_letter(rest: &str) -> bool {
    rest.chars().next().is_some_and(char::is_alphabetic)
}

fn all_directive_letters(rest: &str) -> bool {
    !rest.is_empty() && rest.chars().all(Directive::is_letter)
}

// --- Scanning ---

/// Mutable state of one scan over a command's argument tokens.
#[derive(Debug)]
pub struct ParseState<'s> {
    signature: &'s Signature,
    tokens: VecDeque<String>,
    raw: bool,
    positionals: Vec<Value>,
    keywords: Vec<(String, Value)>,
    directives: Vec<Directive>,
}

impl ParseState<'_> {
    fn produced(&self) -> usize {
        self.positionals.len() + self.keywords.len() + self.directives.len()
    }

    fn next_token(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    fn keyword(&mut self, spec: &ArgSpec, value: Value) {
        self.keywords.push((spec.name.clone(), value));
    }
}

fn consume_raw_marker(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    state.next_token();
    state.raw = true;
    Ok(())
}

fn consume_long(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    let Some(token) = state.next_token() else {
        return Ok(());
    };
    let body = token.trim_start_matches('-');
    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (body, None),
    };
    let signature = state.signature;
    let spec = signature
        .find(name)
        .ok_or_else(|| ParseError::UnknownOption(token.clone()))?;

    let value = match (spec.kind, inline) {
        (ArgKind::Flag, Some(value)) => Value::Str(value),
        (ArgKind::Flag, None) => Value::Bool(true),
        (_, Some(value)) => Value::Str(value),
        (_, None) => state
            .next_token()
            .map(Value::Str)
            .ok_or_else(|| ParseError::MissingValue(token.clone()))?,
    };
    state.keyword(spec, value);
    Ok(())
}

/// `-abc` is `-a -b -c`. A letter naming a non-flag takes the rest of the
/// token as its value, or the next token when nothing is left.
fn consume_short(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    let Some(token) = state.next_token() else {
        return Ok(());
    };
    let letters = token.get(1..).unwrap_or_default();
    let signature = state.signature;

    for (i, letter) in letters.char_indices() {
        let spec = signature
            .find_short(letter)
            .ok_or_else(|| ParseError::UnknownOption(format!("-{}", letter)))?;
        if spec.kind == ArgKind::Flag {
            state.keyword(spec, Value::Bool(true));
            continue;
        }
        let attached = letters.get(i + letter.len_utf8()..).unwrap_or_default();
        let value = if attached.is_empty() {
            state
                .next_token()
                .ok_or_else(|| ParseError::MissingValue(format!("-{}", letter)))?
        } else {
            attached.to_string()
        };
        state.keyword(spec, Value::Str(value));
        break;
    }
    Ok(())
}

fn consume_directives(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    let Some(token) = state.next_token() else {
        return Ok(());
    };
    for letter in token.chars().skip(1) {
        if letter == 'o' {
            let path = state
                .next_token()
                .ok_or_else(|| ParseError::MissingValue("=o".to_string()))?;
            let expanded = shellexpand::tilde(&path).into_owned();
            state.directives.push(Directive::WriteFile(PathBuf::from(expanded)));
        } else if let Some(directive) = Directive::from_letter(letter) {
            state.directives.push(directive);
        }
    }
    Ok(())
}

fn consume_escaped(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    if let Some(token) = state.next_token() {
        let literal = token.get(1..).unwrap_or_default().to_string();
        state.positionals.push(Value::Str(literal));
    }
    Ok(())
}

fn consume_positional(state: &mut ParseState<'_>) -> Result<(), ParseError> {
    if let Some(token) = state.next_token() {
        state.positionals.push(Value::Str(token));
    }
    Ok(())
}

/// The raw outcome of a scan, before defaults and types are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scanned {
    pub positionals: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
    pub directives: DirectiveSet,
    /// Stalls recovered from during the scan.
    pub stalls: Vec<ParseError>,
}

// --- Parser ---

/// Turns a command's argument tokens into typed values and directives,
/// following the command's [`Signature`].
#[derive(Debug)]
pub struct ArgParser<'s> {
    signature: &'s Signature,
}

impl<'s> ArgParser<'s> {
    pub fn new(signature: &'s Signature) -> Self {
        Self { signature }
    }

    /// Parses `tokens` and assembles the final arguments in one go.
    ///
    /// # Errors
    /// Any [`ParseError`] from scanning or assembling.
    pub fn parse(
        &self,
        tokens: &[String],
        piped: Option<Piped>,
    ) -> Result<(ParsedArguments, DirectiveSet), ParseError> {
        let scanned = self.scan(tokens, piped)?;
        let directives = scanned.directives.clone();
        Ok((self.assemble(scanned)?, directives))
    }

    /// Classifies every token. Piped values are placed among the positionals.
    ///
    /// # Logic:
    /// - Outside raw mode each token is matched against [`PREFIX_REGISTRY`].
    /// - Anything not claimed by a prefix is a positional value.
    /// - A step that neither consumes nor produces drops the leading token.
    pub fn scan(&self, tokens: &[String], piped: Option<Piped>) -> Result<Scanned, ParseError> {
        self.scan_with(PREFIX_REGISTRY, tokens, piped)
    }

    fn scan_with(
        &self,
        table: &[PrefixDefinition],
        tokens: &[String],
        piped: Option<Piped>,
    ) -> Result<Scanned, ParseError> {
        let mut state = ParseState {
            signature: self.signature,
            tokens: tokens.iter().cloned().collect(),
            raw: false,
            positionals: Vec::new(),
            keywords: Vec::new(),
            directives: Vec::new(),
        };
        let mut stalls = Vec::new();

        while let Some(token) = state.tokens.front() {
            let before = (state.tokens.len(), state.produced());
            let definition = if state.raw {
                None
            } else {
                table.iter().find(|def| {
                    token
                        .strip_prefix(def.prefix)
                        .is_some_and(|rest| (def.accepts)(rest))
                })
            };
            match definition {
                Some(def) => {
                    log::trace!("Token {:?} matched prefix class '{}'.", token, def.name);
                    (def.consume)(&mut state)?;
                }
                None => consume_positional(&mut state)?,
            }

            if (state.tokens.len(), state.produced()) == before {
                let token = state.tokens.pop_front().unwrap_or_default();
                log::warn!("Argument parser stalled at {:?}; dropping it.", token);
                stalls.push(ParseError::Stall { token });
            }
        }

        let mut positionals = state.positionals;
        if let Some(piped) = piped {
            place_piped(&mut positionals, piped);
        }
        Ok(Scanned {
            positionals,
            keywords: state.keywords,
            directives: DirectiveSet::new(state.directives),
            stalls,
        })
    }

    /// Builds the final arguments: defaults, then positionals, then keywords,
    /// then deferred defaults.
    ///
    /// # Errors
    /// `UnexpectedArgument` on positional overflow without a rest argument,
    /// `MissingArgument`, `InvalidValue` and `Deferred` as they arise.
    pub fn assemble(&self, scanned: Scanned) -> Result<ParsedArguments, ParseError> {
        let mut args = ParsedArguments::new();

        for spec in &self.signature.args {
            if let ArgDefault::Value(value) = &spec.default {
                args.insert(spec.name.clone(), value.clone());
            }
        }

        let mut values = scanned.positionals.into_iter();
        for spec in self.signature.positionals() {
            let Some(value) = values.next() else {
                break;
            };
            args.insert(spec.name.clone(), convert(spec, value)?);
        }
        let overflow: Vec<Value> = values.collect();
        if let Some(first) = overflow.first() {
            let Some(rest) = self.signature.rest_arg() else {
                return Err(ParseError::UnexpectedArgument(first.plaintext()));
            };
            let mut items = Vec::new();
            for value in overflow {
                match value {
                    Value::List(list) => items.extend(list),
                    other => items.push(other),
                }
            }
            args.insert(rest.name.clone(), Value::List(items));
        }

        for (name, value) in scanned.keywords {
            let Some(spec) = self.signature.find(&name) else {
                return Err(ParseError::UnknownOption(name));
            };
            args.insert(spec.name.clone(), convert(spec, value)?);
        }

        for spec in &self.signature.args {
            if spec.default == ArgDefault::Required && !args.contains(&spec.name) {
                return Err(ParseError::MissingArgument(spec.name.clone()));
            }
        }

        for spec in &self.signature.args {
            if let ArgDefault::Deferred(expr) = &spec.default
                && !args.contains(&spec.name)
            {
                let value = deferred::evaluate(expr, &args).map_err(|source| {
                    ParseError::Deferred {
                        name: spec.name.clone(),
                        source,
                    }
                })?;
                args.insert(spec.name.clone(), convert(spec, value)?);
            }
        }

        log::debug!("Assembled {} arguments.", args.len());
        Ok(args)
    }
}

fn convert(spec: &ArgSpec, value: Value) -> Result<Value, ParseError> {
    value.cast(spec.ty).ok_or_else(|| ParseError::InvalidValue {
        name: spec.name.clone(),
        value: value.plaintext(),
        expected: format!("{:?}", spec.ty).to_lowercase(),
    })
}

fn place_piped(positionals: &mut Vec<Value>, piped: Piped) {
    match (piped.mode, piped.value) {
        (PipeMode::Splat, Value::List(items)) => {
            positionals.splice(0..0, items);
        }
        (PipeMode::First | PipeMode::Splat, value) => positionals.insert(0, value),
        (PipeMode::Second, value) => {
            let at = positionals.len().min(1);
            positionals.insert(at, value);
        }
        (PipeMode::Last, value) => positionals.push(value),
    }
}
