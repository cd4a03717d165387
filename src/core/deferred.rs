//! # Deferred values
//!
//! A `Deferred` describes "the value of this argument once the others are
//! resolved". It is a plain expression tree with one variant per operation and
//! a single interpreter, [`evaluate`], that walks it against the parsed
//! arguments of a command.

use crate::models::{ArgType, ParsedArguments, Value};
use std::cmp::Ordering;
use thiserror::Error;

/// Methods that a [`Deferred::Call`] node may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Len,
    Lower,
    Upper,
    Split,
    Contains,
    Join,
}

/// Comparison operators for [`Deferred::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An expression evaluated after argument parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    Literal(Value),
    /// The parsed value of another argument.
    Arg(String),
    /// A key of a map value.
    Attr { target: Box<Deferred>, name: String },
    Call {
        target: Box<Deferred>,
        method: Method,
        args: Vec<Deferred>,
    },
    /// List element, string character or map entry. Negative indexes count from the end.
    Index {
        target: Box<Deferred>,
        index: Box<Deferred>,
    },
    Compare {
        left: Box<Deferred>,
        op: CmpOp,
        right: Box<Deferred>,
    },
    Cast { target: Box<Deferred>, ty: ArgType },
}

/// Errors from evaluating a [`Deferred`] default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeferredError {
    #[error("Deferred value refers to unknown argument '{0}'.")]
    UnknownArgument(String),
    #[error("Value of kind '{kind}' has no attribute '{name}'.")]
    NoAttribute { kind: &'static str, name: String },
    #[error("Index {index} is out of range for a value of length {len}.")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Cannot apply '{op}' to a value of kind '{kind}'.")]
    TypeMismatch { op: String, kind: &'static str },
    #[error("Cannot cast a value of kind '{kind}' to {ty:?}.")]
    BadCast { kind: &'static str, ty: ArgType },
}

impl Deferred {
    /// A fixed value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// The parsed value of another argument.
    pub fn arg(name: &str) -> Self {
        Self::Arg(name.to_string())
    }

    pub fn attr(self, name: &str) -> Self {
        Self::Attr {
            target: Box::new(self),
            name: name.to_string(),
        }
    }

    pub fn call(self, method: Method, args: Vec<Self>) -> Self {
        Self::Call {
            target: Box::new(self),
            method,
            args,
        }
    }

    pub fn index(self, index: Self) -> Self {
        Self::Index {
            target: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn compare(self, op: CmpOp, right: Self) -> Self {
        Self::Compare {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn cast(self, ty: ArgType) -> Self {
        Self::Cast {
            target: Box::new(self),
            ty,
        }
    }
}

/// Evaluates `root` against already parsed arguments.
///
/// # Errors
/// Returns a [`DeferredError`] for unknown arguments, missing attributes,
/// out-of-range indexes, mismatched types and impossible casts.
pub fn evaluate(root: &Deferred, scope: &ParsedArguments) -> Result<Value, DeferredError> {
    match root {
        Deferred::Literal(value) => Ok(value.clone()),
        Deferred::Arg(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| DeferredError::UnknownArgument(name.clone())),
        Deferred::Attr { target, name } => match evaluate(target, scope)? {
            Value::Map(mut map) => map.remove(name).ok_or_else(|| DeferredError::NoAttribute {
                kind: "map",
                name: name.clone(),
            }),
            other => Err(DeferredError::NoAttribute {
                kind: other.kind(),
                name: name.clone(),
            }),
        },
        Deferred::Call {
            target,
            method,
            args,
        } => {
            let receiver = evaluate(target, scope)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call_method(receiver, *method, &args)
        }
        Deferred::Index { target, index } => {
            let container = evaluate(target, scope)?;
            let index = evaluate(index, scope)?;
            index_value(container, &index)
        }
        Deferred::Compare { left, op, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            compare(&left, *op, &right).map(Value::Bool)
        }
        Deferred::Cast { target, ty } => {
            let value = evaluate(target, scope)?;
            value.cast(*ty).ok_or(DeferredError::BadCast {
                kind: value.kind(),
                ty: *ty,
            })
        }
    }
}

fn length_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

fn call_method(receiver: Value, method: Method, args: &[Value]) -> Result<Value, DeferredError> {
    let mismatch = |kind: &'static str| DeferredError::TypeMismatch {
        op: format!("{:?}", method).to_lowercase(),
        kind,
    };
    let first_str = || args.first().and_then(Value::as_str);

    match (method, &receiver) {
        (Method::Len, Value::Str(s)) => Ok(length_value(s.chars().count())),
        (Method::Len, Value::List(items)) => Ok(length_value(items.len())),
        (Method::Len, Value::Map(map)) => Ok(length_value(map.len())),
        (Method::Lower, Value::Str(s)) => Ok(Value::Str(s.to_lowercase())),
        (Method::Upper, Value::Str(s)) => Ok(Value::Str(s.to_uppercase())),
        (Method::Split, Value::Str(s)) => {
            let sep = first_str().unwrap_or(",");
            Ok(Value::List(s.split(sep).map(Value::str).collect()))
        }
        (Method::Contains, Value::Str(s)) => {
            let needle = first_str().ok_or_else(|| mismatch("null"))?;
            Ok(Value::Bool(s.contains(needle)))
        }
        (Method::Contains, Value::List(items)) => {
            let needle = args.first().cloned().unwrap_or_default();
            Ok(Value::Bool(items.contains(&needle)))
        }
        (Method::Join, Value::List(items)) => {
            let sep = first_str().unwrap_or(" ");
            Ok(Value::Str(
                items.iter().map(Value::plaintext).collect::<Vec<_>>().join(sep),
            ))
        }
        (_, other) => Err(mismatch(other.kind())),
    }
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let absolute = if index < 0 { len_i + index } else { index };
    usize::try_from(absolute).ok().filter(|i| *i < len)
}

fn index_value(container: Value, index: &Value) -> Result<Value, DeferredError> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len();
            resolve_index(*i, len)
                .and_then(|pos| items.into_iter().nth(pos))
                .ok_or(DeferredError::IndexOutOfRange { index: *i, len })
        }
        (Value::Str(s), Value::Int(i)) => {
            let len = s.chars().count();
            resolve_index(*i, len)
                .and_then(|pos| s.chars().nth(pos))
                .map(|c| Value::Str(c.to_string()))
                .ok_or(DeferredError::IndexOutOfRange { index: *i, len })
        }
        (Value::Map(mut map), Value::Str(key)) => {
            map.remove(key).ok_or_else(|| DeferredError::NoAttribute {
                kind: "map",
                name: key.clone(),
            })
        }
        (other, _) => Err(DeferredError::TypeMismatch {
            op: "index".to_string(),
            kind: other.kind(),
        }),
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<bool, DeferredError> {
    if matches!(op, CmpOp::Eq | CmpOp::Ne) {
        let equal = match (left, right) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            _ => left == right,
        };
        return Ok(equal == (op == CmpOp::Eq));
    }

    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
    .ok_or(DeferredError::TypeMismatch {
        op: format!("{:?}", op).to_lowercase(),
        kind: left.kind(),
    })?;

    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq | CmpOp::Ne => false,
    })
}
