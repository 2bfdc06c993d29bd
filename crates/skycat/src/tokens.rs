//! Splitting catalog lines into tokens.
//!
//! The default mode splits on runs of spaces, tabs, and commas (plus any
//! extra separator characters the caller names). `"tab"` and `"bar"` restrict
//! splitting to exactly one tab or `|` per field boundary, so empty fields
//! survive; tab-tables and Tycho-2 records rely on that. Text between single
//! or double quotes is one token in every mode.

use crate::error::{Error, Result};

/// Most tokens a single line may produce.
pub const MAX_TOKENS: usize = 1000;

const DEFAULT_SEPARATORS: &str = " \t,";

/// Which characters end a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separators {
    /// Space, tab, comma, and any extra characters; runs collapse.
    Whitespace(String),
    /// Exactly one tab per field boundary.
    Tab,
    /// Exactly one `|` per field boundary.
    Bar,
}

impl Separators {
    /// Interpret the `extra_separators` argument of [`tokenize`].
    pub fn from_option(extra: Option<&str>) -> Separators {
        match extra {
            None => Separators::Whitespace(String::new()),
            Some("tab") => Separators::Tab,
            Some("bar") => Separators::Bar,
            Some(chars) => Separators::Whitespace(chars.to_string()),
        }
    }

    fn is_separator(&self, b: u8) -> bool {
        match self {
            Separators::Whitespace(extra) => {
                DEFAULT_SEPARATORS.as_bytes().contains(&b) || extra.as_bytes().contains(&b)
            }
            Separators::Tab => b == b'\t',
            Separators::Bar => b == b'|',
        }
    }

    fn collapses(&self) -> bool {
        matches!(self, Separators::Whitespace(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    /// Where the token begins in the line, including an opening quote.
    raw_start: usize,
    start: usize,
    end: usize,
}

/// The tokens of one line, borrowed from it.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a str,
    spans: Vec<Span>,
    cursor: usize,
}

/// Split `line` into tokens.
///
/// `extra_separators` is `None` for the default separators, `Some("tab")` or
/// `Some("bar")` for single-separator modes, or a string of characters added
/// to the defaults.
///
/// # Errors
/// Returns [`Error::Malformed`] when the line holds more than [`MAX_TOKENS`].
pub fn tokenize<'a>(line: &'a str, extra_separators: Option<&str>) -> Result<Tokens<'a>> {
    tokenize_with(line, &Separators::from_option(extra_separators))
}

/// Split `line` using an already-built [`Separators`].
pub fn tokenize_with<'a>(line: &'a str, seps: &Separators) -> Result<Tokens<'a>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();

    if len == 0 {
        return Ok(Tokens {
            line,
            spans,
            cursor: 0,
        });
    }

    let next_sep = |from: usize| -> usize {
        (from..len)
            .find(|&k| seps.is_separator(bytes[k]))
            .unwrap_or(len)
    };

    let mut i = 0;
    loop {
        if seps.collapses() {
            while i < len && seps.is_separator(bytes[i]) {
                i += 1;
            }
            if i >= len {
                break;
            }
        }
        if spans.len() == MAX_TOKENS {
            return Err(Error::malformed(format!(
                "line has more than {MAX_TOKENS} tokens"
            )));
        }

        let raw_start = i;
        let quote = bytes.get(i).copied().filter(|&b| b == b'"' || b == b'\'');
        let closing = quote.and_then(|q| (i + 1..len).find(|&k| bytes[k] == q));
        match closing {
            Some(close) => {
                spans.push(Span {
                    raw_start,
                    start: i + 1,
                    end: close,
                });
                i = next_sep(close + 1);
            }
            None => {
                let end = next_sep(i);
                spans.push(Span {
                    raw_start,
                    start: i,
                    end,
                });
                i = end;
            }
        }

        if i >= len {
            break;
        }
        // Step over exactly one separator; collapsing modes skip the rest at the top.
        i += 1;
    }

    Ok(Tokens {
        line,
        spans,
        cursor: 0,
    })
}

impl<'a> Tokens<'a> {
    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True when the line held no tokens.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The line the tokens came from, without its line terminator.
    pub fn line(&self) -> &'a str {
        self.line
    }

    /// Return the next token, advancing the internal cursor.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let tok = self.get_token(self.cursor as isize + 1)?;
        self.cursor += 1;
        Some(tok)
    }

    /// Number of tokens [`Tokens::next_token`] has already returned.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Fetch a token by 1-based index.
    ///
    /// `0` returns the whole line. A negative index `-k` returns the rest of
    /// the line starting at token `k`, with trailing whitespace removed.
    pub fn get_token(&self, index: isize) -> Option<&'a str> {
        let line = self.line;
        match index {
            0 => Some(line),
            k if k > 0 => self
                .spans
                .get(k as usize - 1)
                .map(|s| &line[s.start..s.end]),
            k => {
                let k = k.unsigned_abs();
                self.spans
                    .get(k - 1)
                    .map(|s| line[s.raw_start..].trim_end())
            }
        }
    }

    /// Iterate over all tokens in order, ignoring the cursor.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        let line = self.line;
        self.spans.iter().map(move |s| &line[s.start..s.end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(line: &str, extra: Option<&str>) -> Vec<String> {
        tokenize(line, extra)
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn default_separators_collapse() {
        assert_eq!(
            all("  12.5, -3.25\t\t7  ", None),
            vec!["12.5", "-3.25", "7"]
        );
    }

    #[test]
    fn extra_separators_are_added() {
        assert_eq!(all("a;b c", Some(";")), vec!["a", "b", "c"]);
    }

    #[test]
    fn tab_mode_keeps_empty_fields_and_spaces() {
        assert_eq!(
            all("1\t\tM 31, galaxy\t", Some("tab")),
            vec!["1", "", "M 31, galaxy", ""]
        );
    }

    #[test]
    fn bar_mode_splits_on_pipes_only() {
        assert_eq!(
            all("0001 00008 1| |  2.31|", Some("bar")),
            vec!["0001 00008 1", " ", "  2.31", ""]
        );
    }

    #[test]
    fn quoted_text_is_one_token() {
        assert_eq!(
            all("10 'Polaris, alpha UMi' \"x y\" z", None),
            vec!["10", "Polaris, alpha UMi", "x y", "z"]
        );
    }

    #[test]
    fn unterminated_quote_runs_to_separator() {
        assert_eq!(all("'abc def", None), vec!["'abc", "def"]);
    }

    #[test]
    fn line_terminators_are_ignored() {
        assert_eq!(all("a b\r\n", None), vec!["a", "b"]);
        assert!(tokenize("\n", None).unwrap().is_empty());
    }

    #[test]
    fn get_token_indices() {
        let t = tokenize("101 10.5 -20.25 6.1 Vega the star", None).unwrap();
        assert_eq!(t.len(), 7);
        assert_eq!(t.get_token(1), Some("101"));
        assert_eq!(t.get_token(7), Some("star"));
        assert_eq!(t.get_token(8), None);
        assert_eq!(t.get_token(0), Some("101 10.5 -20.25 6.1 Vega the star"));
        assert_eq!(t.get_token(-5), Some("Vega the star"));
        assert_eq!(t.get_token(-9), None);
    }

    #[test]
    fn rest_of_line_keeps_quotes() {
        let t = tokenize("1 'a b' c", None).unwrap();
        assert_eq!(t.get_token(2), Some("a b"));
        assert_eq!(t.get_token(-2), Some("'a b' c"));
    }

    #[test]
    fn next_token_walks_in_order() {
        let mut t = tokenize("x y", None).unwrap();
        assert_eq!(t.next_token(), Some("x"));
        assert_eq!(t.consumed(), 1);
        assert_eq!(t.next_token(), Some("y"));
        assert_eq!(t.next_token(), None);
    }

    #[test]
    fn too_many_tokens_is_an_error() {
        let line = "1 ".repeat(MAX_TOKENS + 1);
        let err = tokenize(&line, None).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));

        let ok = "1 ".repeat(MAX_TOKENS);
        assert_eq!(tokenize(&ok, None).unwrap().len(), MAX_TOKENS);
    }
}
