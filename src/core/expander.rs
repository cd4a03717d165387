// src/core/expander.rs

use crate::core::lexer::{Operator, Token};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    // Bounds may not contain dots, so relative paths like `../x` never match.
    static ref RANGE_RE: Regex =
        Regex::new(r"^([^.]+)(\.\.\.?)([^.]+)$").expect("range pattern is valid");
}

/// Largest number of values one range may expand to.
pub const MAX_RANGE_VALUES: u64 = 10_000;

/// Errors raised while expanding a single command's token run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    /// More than one comma-list (or expandable range) in one command.
    #[error("Only one comma-list is allowed per command; found another at '{second}'.")]
    MultipleCommaLists { second: String },
    /// A comma without a word on one of its sides.
    #[error("Dangling ',' in comma-list.")]
    DanglingComma,
    /// A comma-list in a command that receives a piped value.
    #[error("A piped command cannot contain a comma-list.")]
    PipedCommaList,
    /// A range whose bounds are not integers, or that is empty.
    #[error("Unsupported range '{0}': bounds must be integers and the range non-empty.")]
    UnsupportedRange(String),
    /// A range with more than [`MAX_RANGE_VALUES`] values.
    #[error("Range '{word}' has more than {limit} values.")]
    RangeTooLarge { word: String, limit: u64 },
}

/// Switches for the optional parts of expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Expand `a..b` / `a...b` words. Off by default.
    pub ranges: bool,
}

/// A range word recognized by [`parse_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: String,
    pub end: String,
    /// `..` includes `end`, `...` excludes it.
    pub inclusive: bool,
}

impl RangeSpec {
    /// Number of values in the range, or `None` when a bound is not an integer.
    pub fn count(&self) -> Option<u64> {
        let start: i64 = self.start.parse().ok()?;
        let end: i64 = self.end.parse().ok()?;
        let span = start.abs_diff(end);
        Some(if self.inclusive { span.saturating_add(1) } else { span })
    }

    /// Integer values of the range, or `None` when a bound is not an integer.
    /// Callers check [`RangeSpec::count`] first; nothing here bounds the size.
    pub fn integer_values(&self) -> Option<Vec<i64>> {
        let start: i64 = self.start.parse().ok()?;
        let end: i64 = self.end.parse().ok()?;
        let step = if end >= start { 1 } else { -1 };
        let mut values = Vec::new();
        let mut current = start;
        loop {
            let at_end = current == end;
            if at_end && !self.inclusive {
                break;
            }
            values.push(current);
            if at_end {
                break;
            }
            current += step;
        }
        Some(values)
    }
}

/// Recognizes `a..b` (inclusive) and `a...b` (exclusive).
pub fn parse_range(word: &str) -> Option<RangeSpec> {
    let caps = RANGE_RE.captures(word)?;
    Some(RangeSpec {
        start: caps.get(1)?.as_str().to_string(),
        end: caps.get(3)?.as_str().to_string(),
        inclusive: caps.get(2)?.as_str() == "..",
    })
}

/// One argument position: a plain word or a list of alternatives.
#[derive(Debug)]
enum Slot {
    Word(String),
    Alternatives(Vec<String>),
}

/// Expands the comma-list of one command's token run.
///
/// `tokens` holds the words of a single command and the commas between them.
/// The result has one word run per alternative, in list order; without a list
/// it is the single unchanged run.
///
/// # Errors
/// See [`ExpandError`]. On error nothing is produced.
pub fn expand(
    tokens: &[Token],
    piped: bool,
    options: ExpandOptions,
) -> Result<Vec<Vec<String>>, ExpandError> {
    let mut slots: Vec<Slot> = Vec::new();
    let mut after_comma = false;

    for token in tokens {
        match token {
            Token::Word(word) if after_comma => {
                match slots.pop() {
                    Some(Slot::Word(first)) => {
                        slots.push(Slot::Alternatives(vec![first, word.clone()]));
                    }
                    Some(Slot::Alternatives(mut list)) => {
                        list.push(word.clone());
                        slots.push(Slot::Alternatives(list));
                    }
                    None => return Err(ExpandError::DanglingComma),
                }
                after_comma = false;
            }
            Token::Word(word) => slots.push(Slot::Word(word.clone())),
            Token::Operator(Operator::Comma) => {
                if after_comma || slots.is_empty() {
                    return Err(ExpandError::DanglingComma);
                }
                after_comma = true;
            }
            Token::Operator(op) => {
                log::debug!("Ignoring stray operator '{}' inside a command run.", op);
            }
        }
    }
    if after_comma {
        return Err(ExpandError::DanglingComma);
    }

    if options.ranges {
        slots = slots
            .into_iter()
            .map(expand_range_slot)
            .collect::<Result<_, _>>()?;
    }

    let mut list_position = None;
    for (i, slot) in slots.iter().enumerate() {
        if let Slot::Alternatives(list) = slot {
            if list_position.is_some() {
                return Err(ExpandError::MultipleCommaLists {
                    second: list.join(","),
                });
            }
            list_position = Some(i);
        }
    }

    let Some(position) = list_position else {
        return Ok(vec![slots.into_iter().map(slot_word).collect()]);
    };
    if piped {
        return Err(ExpandError::PipedCommaList);
    }

    let alternatives = match slots.get(position) {
        Some(Slot::Alternatives(list)) => list.clone(),
        _ => Vec::new(),
    };
    log::debug!(
        "Expanding comma-list at position {} into {} commands.",
        position,
        alternatives.len()
    );

    Ok(alternatives
        .into_iter()
        .map(|choice| {
            slots
                .iter()
                .enumerate()
                .map(|(i, slot)| match slot {
                    Slot::Word(word) => word.clone(),
                    Slot::Alternatives(_) if i == position => choice.clone(),
                    Slot::Alternatives(list) => list.join(","),
                })
                .collect()
        })
        .collect())
}

fn expand_range_slot(slot: Slot) -> Result<Slot, ExpandError> {
    let Slot::Word(word) = slot else {
        return Ok(slot);
    };
    let Some(range) = parse_range(&word) else {
        return Ok(Slot::Word(word));
    };
    if let Some(count) = range.count()
        && count > MAX_RANGE_VALUES
    {
        return Err(ExpandError::RangeTooLarge {
            word,
            limit: MAX_RANGE_VALUES,
        });
    }
    match range.integer_values() {
        Some(values) if !values.is_empty() => Ok(Slot::Alternatives(
            values.into_iter().map(|v| v.to_string()).collect(),
        )),
        _ => Err(ExpandError::UnsupportedRange(word)),
    }
}

fn slot_word(slot: Slot) -> String {
    match slot {
        Slot::Word(word) => word,
        Slot::Alternatives(list) => list.join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexer::tokenize;

    fn run(input: &str) -> Result<Vec<Vec<String>>, ExpandError> {
        expand(&tokenize(input).unwrap(), false, ExpandOptions::default())
    }

    fn runs(input: &str) -> Vec<String> {
        run(input).unwrap().into_iter().map(|r| r.join(" ")).collect()
    }

    #[test]
    fn test_no_list_is_a_single_unchanged_run() {
        assert_eq!(runs("get weather london"), vec!["get weather london"]);
    }

    #[test]
    fn test_list_expands_in_order_at_its_position() {
        assert_eq!(
            runs("weather london,paris,rome --units metric"),
            vec![
                "weather london --units metric",
                "weather paris --units metric",
                "weather rome --units metric",
            ]
        );
    }

    #[test]
    fn test_whitespace_around_commas_is_irrelevant() {
        assert_eq!(runs("echo a , b"), vec!["echo a", "echo b"]);
    }

    #[test]
    fn test_siblings_differ_only_at_the_substituted_position() {
        let expanded = run("cmd x a,b,c,d y").unwrap();
        assert_eq!(expanded.len(), 4);
        for sibling in &expanded {
            assert_eq!(sibling.len(), 4);
            assert_eq!(sibling[0], "cmd");
            assert_eq!(sibling[1], "x");
            assert_eq!(sibling[3], "y");
        }
        let substituted: Vec<_> = expanded.iter().map(|s| s[2].as_str()).collect();
        assert_eq!(substituted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_second_list_is_rejected() {
        assert_eq!(
            run("cmd a,b c,d"),
            Err(ExpandError::MultipleCommaLists {
                second: "c,d".to_string()
            })
        );
    }

    #[test]
    fn test_dangling_commas_are_rejected() {
        assert_eq!(run("cmd a,"), Err(ExpandError::DanglingComma));
        assert_eq!(run(", a"), Err(ExpandError::DanglingComma));
        assert_eq!(run("cmd a,,b"), Err(ExpandError::DanglingComma));
    }

    #[test]
    fn test_piped_command_cannot_hold_a_list() {
        let tokens = tokenize("upper a,b").unwrap();
        assert_eq!(
            expand(&tokens, true, ExpandOptions::default()),
            Err(ExpandError::PipedCommaList)
        );
        // Without a list a piped command expands normally.
        let tokens = tokenize("upper a").unwrap();
        assert!(expand(&tokens, true, ExpandOptions::default()).is_ok());
    }

    #[test]
    fn test_parse_range_recognizes_both_forms() {
        assert_eq!(
            parse_range("1..3"),
            Some(RangeSpec {
                start: "1".into(),
                end: "3".into(),
                inclusive: true
            })
        );
        assert_eq!(parse_range("a...z").map(|r| r.inclusive), Some(false));
        assert_eq!(parse_range("../etc"), None);
        assert_eq!(parse_range("1.5"), None);
    }

    #[test]
    fn test_ranges_pass_through_when_disabled() {
        assert_eq!(runs("seq 1..3"), vec!["seq 1..3"]);
    }

    #[test]
    fn test_ranges_expand_when_enabled() {
        let options = ExpandOptions { ranges: true };
        let tokens = tokenize("page 1..3").unwrap();
        let expanded = expand(&tokens, false, options).unwrap();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[2], vec!["page", "3"]);

        let tokens = tokenize("page 3...1").unwrap();
        let expanded = expand(&tokens, false, options).unwrap();
        let pages: Vec<_> = expanded.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(pages, vec!["3", "2"]);
    }

    #[test]
    fn test_enabled_ranges_count_as_a_list() {
        let options = ExpandOptions { ranges: true };
        let tokens = tokenize("page 1..2 a,b").unwrap();
        assert!(matches!(
            expand(&tokens, false, options),
            Err(ExpandError::MultipleCommaLists { .. })
        ));
        let tokens = tokenize("page a..c").unwrap();
        assert_eq!(
            expand(&tokens, false, options),
            Err(ExpandError::UnsupportedRange("a..c".into()))
        );
        let tokens = tokenize("page 2...2").unwrap();
        assert!(matches!(
            expand(&tokens, false, options),
            Err(ExpandError::UnsupportedRange(_))
        ));
    }

    #[test]
    fn test_huge_ranges_are_refused_before_expanding() {
        let options = ExpandOptions { ranges: true };
        let tokens = tokenize("page 0..10000000000").unwrap();
        assert_eq!(
            expand(&tokens, false, options),
            Err(ExpandError::RangeTooLarge {
                word: "0..10000000000".into(),
                limit: MAX_RANGE_VALUES,
            })
        );
        let tokens = tokenize("page -9223372036854775808..9223372036854775807").unwrap();
        assert!(matches!(
            expand(&tokens, false, options),
            Err(ExpandError::RangeTooLarge { .. })
        ));

        let tokens = tokenize("page 1..10000").unwrap();
        assert_eq!(expand(&tokens, false, options).unwrap().len(), 10_000);
        let tokens = tokenize("page 0...10000").unwrap();
        assert_eq!(expand(&tokens, false, options).unwrap().len(), 10_000);
        let tokens = tokenize("page 0..10000").unwrap();
        assert!(expand(&tokens, false, options).is_err());
    }
}
