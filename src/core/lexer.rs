// src/core/lexer.rs

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A control operator of the command language.
///
/// Operators are plain `Copy` values. The set is fixed; the order of
/// [`Operator::ALL`] is the matching order used by the tokenizer (longest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `;` runs the next command unconditionally.
    Sequence,
    /// `;;` like `;`, and also forgets the last response.
    DoubleSequence,
    /// `&&` runs the next command only if nothing failed.
    And,
    /// `||` runs the next command only if something failed.
    Or,
    /// `|` passes the last response as the first positional argument.
    Pipe,
    /// `@|` spreads a list response into leading positional arguments.
    PipeSplat,
    /// `.>` passes the last response as the last positional argument.
    PipeLast,
    /// `>.` passes the last response as the second positional argument.
    PipeSecond,
    /// `,` separates the entries of a comma-list.
    Comma,
}

impl Operator {
    /// Every operator, longest symbol first.
    pub const ALL: [Self; 9] = [
        Self::DoubleSequence,
        Self::And,
        Self::Or,
        Self::PipeSplat,
        Self::PipeLast,
        Self::PipeSecond,
        Self::Sequence,
        Self::Pipe,
        Self::Comma,
    ];

    /// The source text of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Sequence => ";",
            Self::DoubleSequence => ";;",
            Self::And => "&&",
            Self::Or => "||",
            Self::Pipe => "|",
            Self::PipeSplat => "@|",
            Self::PipeLast => ".>",
            Self::PipeSecond => ">.",
            Self::Comma => ",",
        }
    }

    /// `;` and `;;` close a failure scope: pending failures are raised after them.
    pub fn is_boundary(self) -> bool {
        matches!(self, Self::Sequence | Self::DoubleSequence)
    }

    /// All operators that hand the previous response to the next command.
    pub fn is_pipe(self) -> bool {
        matches!(
            self,
            Self::Pipe | Self::PipeSplat | Self::PipeLast | Self::PipeSecond
        )
    }

    /// Returns the operator that `input` starts with, if any.
    fn match_prefix(input: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| input.starts_with(op.symbol()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One lexical unit of an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word, with quotes already removed.
    Word(String),
    /// A control operator.
    Operator(Operator),
}

impl Token {
    /// Shorthand used by the builder and by tests.
    pub fn word(text: impl Into<String>) -> Self {
        Self::Word(text.into())
    }
}

/// Errors that fail a whole input line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A quote was opened and never closed before the end of input.
    #[error("Unterminated {quote} quote starting at offset {position}.")]
    MalformedQuote { quote: char, position: usize },
}

/// Splits raw input into words and control operators.
///
/// Whitespace separates words. Quoted text (single or double quotes) is part of
/// the current word and keeps operator characters verbatim; inside quotes a
/// backslash escapes the matching quote or another backslash.
///
/// # Errors
/// Returns [`LexError::MalformedQuote`] when a quote is never closed.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut rest = input;
    let mut offset = 0;

    while let Some(c) = rest.chars().next() {
        let advance = if c.is_whitespace() {
            flush_word(&mut tokens, &mut word, &mut in_word);
            c.len_utf8()
        } else if c == '\'' || c == '"' {
            in_word = true;
            read_quoted(rest, offset, &mut word)?
        } else if let Some(op) = Operator::match_prefix(rest) {
            flush_word(&mut tokens, &mut word, &mut in_word);
            tokens.push(Token::Operator(op));
            op.symbol().len()
        } else {
            word.push(c);
            in_word = true;
            c.len_utf8()
        };
        rest = rest.get(advance..).unwrap_or("");
        offset += advance;
    }
    flush_word(&mut tokens, &mut word, &mut in_word);

    log::trace!("Tokenized {:?} into {} tokens.", input, tokens.len());
    Ok(tokens)
}

fn flush_word(tokens: &mut Vec<Token>, word: &mut String, in_word: &mut bool) {
    if *in_word {
        tokens.push(Token::Word(std::mem::take(word)));
        *in_word = false;
    }
}

/// Reads a quoted section at the start of `input` into `word`.
/// Returns the number of bytes consumed, including both quotes.
fn read_quoted(input: &str, offset: usize, word: &mut String) -> Result<usize, LexError> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Ok(0),
    };

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok(i + c.len_utf8());
        }
        if c == '\\' {
            match chars.clone().next() {
                Some((_, next)) if next == quote || next == '\\' => {
                    word.push(next);
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        word.push(c);
    }

    Err(LexError::MalformedQuote {
        quote,
        position: offset,
    })
}

/// Joins process arguments into one input line for [`tokenize`].
///
/// Every argument stays a single word, except that commas keep separating
/// list entries and an argument that is exactly an operator symbol stays an
/// operator.
///
/// # Errors
/// Fails when an argument contains a nul byte.
pub fn join_args(args: &[String]) -> Result<String, shlex::QuoteError> {
    let mut words = Vec::with_capacity(args.len());
    for arg in args {
        if Operator::ALL.iter().any(|op| op.symbol() == arg.as_str()) {
            words.push(arg.clone());
            continue;
        }
        let pieces = arg
            .split(',')
            .map(|piece| match piece {
                "" => Ok(String::new()),
                _ => shlex::try_quote(piece).map(Cow::into_owned),
            })
            .collect::<Result<Vec<_>, _>>()?;
        words.push(pieces.join(","));
    }
    Ok(words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(input: &str) -> Vec<Token> {
        tokenize(input).unwrap()
    }

    #[test]
    fn test_whitespace_separates_words() {
        assert_eq!(
            words("  echo   hello\tworld "),
            vec![Token::word("echo"), Token::word("hello"), Token::word("world")]
        );
    }

    #[test]
    fn test_operators_are_matched_longest_first() {
        assert_eq!(
            words("a;;b;c&&d||e|f@|g.>h>.i,j"),
            vec![
                Token::word("a"),
                Token::Operator(Operator::DoubleSequence),
                Token::word("b"),
                Token::Operator(Operator::Sequence),
                Token::word("c"),
                Token::Operator(Operator::And),
                Token::word("d"),
                Token::Operator(Operator::Or),
                Token::word("e"),
                Token::Operator(Operator::Pipe),
                Token::word("f"),
                Token::Operator(Operator::PipeSplat),
                Token::word("g"),
                Token::Operator(Operator::PipeLast),
                Token::word("h"),
                Token::Operator(Operator::PipeSecond),
                Token::word("i"),
                Token::Operator(Operator::Comma),
                Token::word("j"),
            ]
        );
    }

    #[test]
    fn test_single_ampersand_and_dots_stay_in_words() {
        assert_eq!(words("a&b 1.5 ../x"), vec![
            Token::word("a&b"),
            Token::word("1.5"),
            Token::word("../x"),
        ]);
    }

    #[test]
    fn test_quotes_keep_operators_verbatim() {
        assert_eq!(
            words(r#"echo "a; b && c" 'x,y'"#),
            vec![Token::word("echo"), Token::word("a; b && c"), Token::word("x,y")]
        );
    }

    #[test]
    fn test_joined_args_keep_their_words() {
        let args: Vec<String> = ["echo", "a;b", "x y", "it's", "c,d", "&&", "=j"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let line = join_args(&args).unwrap();
        assert_eq!(
            words(&line),
            vec![
                Token::word("echo"),
                Token::word("a;b"),
                Token::word("x y"),
                Token::word("it's"),
                Token::word("c"),
                Token::Operator(Operator::Comma),
                Token::word("d"),
                Token::Operator(Operator::And),
                Token::word("=j"),
            ]
        );
    }

    #[test]
    fn test_quotes_join_adjacent_text() {
        assert_eq!(words(r#"pre"fix 1"post"#), vec![Token::word("prefix 1post")]);
    }

    #[test]
    fn test_escaped_quotes_inside_quotes() {
        assert_eq!(
            words(r#""say \"hi\"" 'it\'s' "back\\slash""#),
            vec![
                Token::word(r#"say "hi""#),
                Token::word("it's"),
                Token::word(r"back\slash"),
            ]
        );
    }

    #[test]
    fn test_empty_quotes_produce_empty_word() {
        assert_eq!(words(r#"echo """#), vec![Token::word("echo"), Token::word("")]);
    }

    #[test]
    fn test_unterminated_quote_fails_with_position() {
        let err = tokenize("echo 'abc").unwrap_err();
        assert_eq!(
            err,
            LexError::MalformedQuote {
                quote: '\'',
                position: 5
            }
        );
        assert!(matches!(
            tokenize(r#"say "x\""#),
            Err(LexError::MalformedQuote { quote: '"', .. })
        ));
    }

    #[test]
    fn test_empty_input_has_no_tokens() {
        assert!(words("").is_empty());
        assert!(words("   ").is_empty());
    }

    #[test]
    fn test_tokenizing_is_restartable() {
        let first = words("a && b");
        let second = words("a && b");
        assert_eq!(first, second);
    }
}
