//! Shell-like argument splitting
//!
//! Configuration strings and command lines are both sequences of whitespace-separated
//! tokens where a token may be quoted to carry spaces:
//!
//! - `"..."` double quotes, with `\"`, `\\`, `\n`, `\r`, `\t` and `\xHH` escapes
//! - `'...'` single quotes, where only `\'` is an escape
//!
//! Quoted and bare segments glued together form one token (`a"b c"` is `ab c`).
//! [`join_args`] is the inverse: it quotes exactly the tokens that need it.

use std::borrow::Cow;
use thiserror::Error;

/// Errors from [`split_args`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// A quote was opened but never closed
    #[error("unterminated quote starting at byte {0}")]
    UnterminatedQuote(usize),

    /// A backslash escape ran past the end of the input
    #[error("dangling escape at end of input")]
    DanglingEscape,

    /// A `\x` escape was not followed by two hex digits
    #[error("invalid hex escape at byte {0}")]
    InvalidHexEscape(usize),
}

/// Splits `input` into tokens, honoring quoting.
///
/// ```
/// use kvbridge::config::args::split_args;
///
/// let tokens = split_args(r#"-d ";" -f "/tmp/my db""#).unwrap();
/// assert_eq!(tokens, vec!["-d", ";", "-f", "/tmp/my db"]);
/// ```
pub fn split_args(input: &str) -> Result<Vec<String>, SplitError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && chars[i].1.is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            return Ok(tokens);
        }

        let mut token = String::new();
        while i < chars.len() && !chars[i].1.is_whitespace() {
            match chars[i].1 {
                '"' => i = read_double_quoted(&chars, i, &mut token)?,
                '\'' => i = read_single_quoted(&chars, i, &mut token)?,
                c => {
                    token.push(c);
                    i += 1;
                }
            }
        }
        tokens.push(token);
    }
}

/// Reads a `"..."` segment starting at `start` (the opening quote).
/// Returns the index just past the closing quote.
fn read_double_quoted(
    chars: &[(usize, char)],
    start: usize,
    out: &mut String,
) -> Result<usize, SplitError> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            '"' => return Ok(i + 1),
            '\\' => {
                let (_, next) = *chars.get(i + 1).ok_or(SplitError::DanglingEscape)?;
                match next {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'x' => {
                        let hex: String = chars
                            .get(i + 2..i + 4)
                            .ok_or(SplitError::InvalidHexEscape(chars[i].0))?
                            .iter()
                            .map(|(_, c)| *c)
                            .collect();
                        let byte = u8::from_str_radix(&hex, 16)
                            .map_err(|_| SplitError::InvalidHexEscape(chars[i].0))?;
                        out.push(char::from(byte));
                        i += 2;
                    }
                    other => out.push(other),
                }
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(SplitError::UnterminatedQuote(chars[start].0))
}

/// Reads a `'...'` segment starting at `start` (the opening quote).
fn read_single_quoted(
    chars: &[(usize, char)],
    start: usize,
    out: &mut String,
) -> Result<usize, SplitError> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            '\'' => return Ok(i + 1),
            '\\' if chars.get(i + 1).map(|(_, c)| *c) == Some('\'') => {
                out.push('\'');
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(SplitError::UnterminatedQuote(chars[start].0))
}

/// Quotes a single token if it would not survive [`split_args`] as-is.
pub fn quote(token: &str) -> Cow<'_, str> {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '\\'));
    if !needs_quotes {
        return Cow::Borrowed(token);
    }

    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x80 => {
                quoted.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

/// Joins tokens into one string that [`split_args`] splits back into the same tokens.
pub fn join_args<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| quote(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
