// src/models.rs

use crate::core::deferred::Deferred;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

// --- VALUES ---

/// The raw payload produced by a dagcmd, before any formatting.
///
/// This is what the cache stores. `Opaque` stands for payloads that cannot be
/// persisted (live handles, images already sent to the terminal, ...); trying to
/// serialize one fails.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    #[serde(skip)]
    Opaque(String),
}

/// The declared type of an argument, used for conversion and casts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Any,
    Str,
    Int,
    Float,
    Bool,
    List,
}

impl Value {
    /// Creates a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Empty values are left out of cache identities.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => true,
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a list.
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The plain-text form printed by the interpreter.
    pub fn plaintext(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::plaintext)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Map(map) => {
                let mut out = String::new();
                for (key, value) in map {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    let _ = write!(out, "{}: {}", key, value.plaintext());
                }
                out
            }
            Self::Opaque(desc) => desc.clone(),
        }
    }

    /// The compact form used inside cache file names.
    ///
    /// Distinct values give distinct strings: `%` and `_` are escaped in every
    /// scalar, and the separators `,` and `=` are escaped in list and map
    /// elements, so `["a,b"]` and `["a", "b"]` never meet.
    pub fn identity_string(&self) -> String {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| escape_identity(&item.identity_string(), &[',', '=']))
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| {
                    let key = escape_identity(&escape_identity(k, &['_']), &[',', '=']);
                    format!("{}={}", key, escape_identity(&v.identity_string(), &[',', '=']))
                })
                .collect::<Vec<_>>()
                .join(","),
            other => escape_identity(&other.plaintext(), &['_']),
        }
    }

    /// Converts to a `serde_json` value for the json response directive.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) | Self::Opaque(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Converts the value to `ty`. Returns `None` when no sensible conversion exists.
    pub fn cast(&self, ty: ArgType) -> Option<Self> {
        match (ty, self) {
            (ArgType::Any, v) => Some(v.clone()),
            (ArgType::Str, Self::Str(_)) => Some(self.clone()),
            (ArgType::Str, v) => Some(Self::Str(v.plaintext())),
            (ArgType::Int, Self::Int(_)) => Some(self.clone()),
            (ArgType::Int, Self::Bool(b)) => Some(Self::Int(i64::from(*b))),
            (ArgType::Int, Self::Str(s)) => s.trim().parse().ok().map(Self::Int),
            (ArgType::Float, Self::Float(_)) => Some(self.clone()),
            (ArgType::Float, Self::Int(i)) => Some(Self::Float(*i as f64)),
            (ArgType::Float, Self::Str(s)) => s.trim().parse().ok().map(Self::Float),
            (ArgType::Bool, Self::Bool(_)) => Some(self.clone()),
            (ArgType::Bool, Self::Int(i)) => Some(Self::Bool(*i != 0)),
            (ArgType::Bool, Self::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(Self::Bool(true)),
                "false" | "no" | "off" | "0" => Some(Self::Bool(false)),
                _ => None,
            },
            (ArgType::List, Self::List(_)) => Some(self.clone()),
            (ArgType::List, Self::Null) => Some(Self::List(Vec::new())),
            (ArgType::List, v) => Some(Self::List(vec![v.clone()])),
            _ => None,
        }
    }

    /// A short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Opaque(_) => "opaque",
        }
    }
}

/// Percent-escapes `%` and every char of `special`.
fn escape_identity(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || special.contains(&c) {
            let _ = write!(out, "%{:02X}", u32::from(c));
        } else {
            out.push(c);
        }
    }
    out
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// --- RESPONSE ENVELOPE ---

/// The result of one executed command, as seen by response directives and the
/// renderer. The payload is reached through explicit accessors only.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    command: String,
    value: Value,
    rendered: Option<String>,
    elapsed: Duration,
    from_cache: bool,
    suppressed: bool,
    notes: Vec<String>,
}

impl Response {
    /// A response of `command` with nothing rendered yet.
    pub fn new(command: impl Into<String>, value: Value, elapsed: Duration, from_cache: bool) -> Self {
        Self {
            command: command.into(),
            value,
            rendered: None,
            elapsed,
            from_cache,
            suppressed: false,
            notes: Vec::new(),
        }
    }

    /// The response of an empty command.
    pub fn empty() -> Self {
        Self::new("", Value::Null, Duration::ZERO, false)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The printable text: the rendered form if a directive produced one,
    /// otherwise the plain text of the value.
    pub fn text(&self) -> String {
        self.rendered
            .clone()
            .unwrap_or_else(|| self.value.plaintext())
    }

    /// Replaces the text shown for this response; the value is kept.
    pub fn set_rendered(&mut self, text: String) {
        self.rendered = Some(text);
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the value was read from the cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Hides the response from the output. Pipes still see it.
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Extra lines printed after the response, such as timings.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

// --- ARGUMENT DECLARATIONS ---

/// How an argument is supplied on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Filled from positional tokens in declaration order.
    Positional,
    /// `--name value` or `-n value`.
    Option,
    /// `--name` or `-n`, no value.
    Flag,
    /// Collects every positional value left over.
    Rest,
}

/// Where the value of an argument comes from when the user does not give one.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgDefault {
    Required,
    Value(Value),
    /// Evaluated against the other arguments once all tokens are applied.
    Deferred(Deferred),
}

/// The declaration of one argument of a dagcmd.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub ty: ArgType,
    pub default: ArgDefault,
    pub cacheable: bool,
    pub short: Option<char>,
    pub help: String,
}

impl ArgSpec {
    fn new(name: &str, kind: ArgKind, ty: ArgType, default: ArgDefault) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ty,
            default,
            cacheable: true,
            short: None,
            help: String::new(),
        }
    }

    /// A required positional argument.
    pub fn positional(name: &str, ty: ArgType) -> Self {
        Self::new(name, ArgKind::Positional, ty, ArgDefault::Required)
    }

    /// An option taking a value; absent means `Null` unless a default is set.
    pub fn option(name: &str, ty: ArgType) -> Self {
        Self::new(name, ArgKind::Option, ty, ArgDefault::Value(Value::Null))
    }

    /// A boolean flag, `false` unless given.
    pub fn flag(name: &str) -> Self {
        Self::new(name, ArgKind::Flag, ArgType::Bool, ArgDefault::Value(Value::Bool(false)))
    }

    /// The catch-all for extra positional values.
    pub fn rest(name: &str) -> Self {
        Self::new(name, ArgKind::Rest, ArgType::List, ArgDefault::Value(Value::List(Vec::new())))
    }

    /// Used when the argument is not given.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = ArgDefault::Value(value.into());
        self
    }

    /// A default computed from the other arguments after parsing.
    pub fn deferred(mut self, expr: Deferred) -> Self {
        self.default = ArgDefault::Deferred(expr);
        self
    }

    /// Also accept `-<letter>`.
    pub fn short(mut self, letter: char) -> Self {
        self.short = Some(letter);
        self
    }

    /// Keeps this argument out of the cache identity.
    pub fn non_cacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = text.to_string();
        self
    }
}

/// Everything a dagcmd declares about its arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub summary: String,
    pub args: Vec<ArgSpec>,
}

impl Signature {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            args: Vec::new(),
        }
    }

    /// Appends an argument; positionals keep declaration order.
    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    /// Looks an argument up by name; dashes and underscores are interchangeable.
    pub fn find(&self, name: &str) -> Option<&ArgSpec> {
        let wanted = name.replace('-', "_");
        self.args.iter().find(|spec| spec.name.replace('-', "_") == wanted)
    }

    pub fn find_short(&self, letter: char) -> Option<&ArgSpec> {
        self.args.iter().find(|spec| spec.short == Some(letter))
    }

    pub fn positionals(&self) -> impl Iterator<Item = &ArgSpec> {
        self.args.iter().filter(|spec| spec.kind == ArgKind::Positional)
    }

    pub fn rest_arg(&self) -> Option<&ArgSpec> {
        self.args.iter().find(|spec| spec.kind == ArgKind::Rest)
    }

    /// Whether an argument takes part in the cache identity. Unknown names do.
    pub fn is_cacheable(&self, name: &str) -> bool {
        self.find(name).is_none_or(|spec| spec.cacheable)
    }

    /// Builds the usage text shown by the help directive.
    pub fn usage(&self, path: &str) -> String {
        let mut line = format!("usage: {}", path.replace('.', " "));
        for spec in &self.args {
            let part = match (spec.kind, &spec.default) {
                (ArgKind::Positional, ArgDefault::Required) => format!(" <{}>", spec.name),
                (ArgKind::Positional, _) => format!(" [{}]", spec.name),
                (ArgKind::Rest, _) => format!(" [{}...]", spec.name),
                (ArgKind::Option, _) => format!(" [--{} <value>]", spec.name),
                (ArgKind::Flag, _) => format!(" [--{}]", spec.name),
            };
            line.push_str(&part);
        }

        let mut out = String::new();
        if !self.summary.is_empty() {
            out.push_str(&self.summary);
            out.push('\n');
        }
        out.push_str(&line);
        for spec in self.args.iter().filter(|s| !s.help.is_empty()) {
            let short = spec.short.map(|c| format!("-{}, ", c)).unwrap_or_default();
            let _ = write!(out, "\n  {}{:<12} {}", short, spec.name, spec.help);
        }
        out
    }
}

// --- PARSED ARGUMENTS ---

/// Typed argument values of one command invocation, keyed by argument name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedArguments {
    values: BTreeMap<String, Value>,
}

impl ParsedArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// `None` unless the value is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Float(f)) => Some(*f),
            Some(Value::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// `false` when absent or not a bool.
    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Value::Bool(true)))
    }

    /// The list payload of an argument, empty when absent or not a list.
    pub fn get_list(&self, name: &str) -> &[Value] {
        self.get(name).and_then(Value::as_list).unwrap_or(&[])
    }

    /// Iterates in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
