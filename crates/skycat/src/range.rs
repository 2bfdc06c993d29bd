//! Range expressions such as `"3,7-12x2"`.
//!
//! A range is a list of terms separated by commas or whitespace. Each term is
//! `N`, `N-M`, `N-MxS`, `-M` / `-MxS` (first value 1), or `N-` (runs to the
//! caller's default last value). `:` may be used in place of `-`. An empty
//! string means `1..=default_last`.
//!
//! [`Range`] carries a restartable cursor: [`Range::next_i64`] and
//! [`Range::next_f64`] walk the values in order and [`Range::restart`] rewinds.

/// Characters allowed in a range expression.
const RANGE_CHARS: &str = "0123456789.,:-x \t";

/// One `first..last` run with its step and precomputed length.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    first: f64,
    last: f64,
    step: f64,
    count: i64,
}

impl Term {
    fn new(first: f64, last: f64, step: Option<f64>) -> Term {
        let direction = if last < first { -1.0 } else { 1.0 };
        let step = match step {
            None => direction,
            Some(s) if s == 0.0 => direction,
            Some(s) => s,
        };
        // A step pointing away from `last` yields only the first value.
        let span = ((last - first) / step + 1e-9).floor() as i64 + 1;
        Term {
            first,
            last,
            step,
            count: span.max(1),
        }
    }

    fn single(value: f64) -> Term {
        Term {
            first: value,
            last: value,
            step: 1.0,
            count: 1,
        }
    }

    fn value(&self, index: i64) -> f64 {
        self.first + index as f64 * self.step
    }
}

/// A parsed range expression with a cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    terms: Vec<Term>,
    term: usize,
    index: i64,
}

/// Return true if `text` contains only characters a range may use.
pub fn is_range(text: &str) -> bool {
    !text.trim().is_empty() && text.chars().all(|c| RANGE_CHARS.contains(c))
}

/// Parse a range expression.
///
/// Text with characters outside `[0-9.,:-x ]`, or with a term that does not
/// parse, yields an empty range (`count() == 0`).
pub fn parse_range(text: &str, default_last: i64) -> Range {
    let text = text.trim();
    if text.is_empty() {
        if default_last < 1 {
            return Range::default();
        }
        return Range::from_terms(vec![Term::new(1.0, default_last as f64, Some(1.0))]);
    }
    if !is_range(text) {
        return Range::default();
    }

    let mut terms = Vec::new();
    for raw in text.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.is_empty() {
            continue;
        }
        match parse_term(raw, default_last) {
            Some(term) => terms.push(term),
            None => return Range::default(),
        }
    }
    Range::from_terms(terms)
}

fn parse_term(raw: &str, default_last: i64) -> Option<Term> {
    let (bounds, step) = match raw.find('x') {
        Some(pos) => (&raw[..pos], Some(parse_number(&raw[pos + 1..])?)),
        None => (raw, None),
    };

    // A leading '-' means "from 1"; a separator anywhere later splits first/last.
    let sep = bounds
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-' || c == ':')
        .map(|(i, _)| i);

    if let Some(rest) = bounds.strip_prefix('-').or_else(|| bounds.strip_prefix(':')) {
        let last = parse_number(rest)?;
        return Some(Term::new(1.0, last, step));
    }

    match sep {
        Some(pos) => {
            let first = parse_number(&bounds[..pos])?;
            let tail = &bounds[pos + 1..];
            let last = if tail.is_empty() {
                default_last as f64
            } else {
                parse_number(tail)?
            };
            Some(Term::new(first, last, step))
        }
        None => Some(Term::single(parse_number(bounds)?)),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Range {
    fn from_terms(terms: Vec<Term>) -> Range {
        Range {
            terms,
            term: 0,
            index: 0,
        }
    }

    /// Total number of values the range denotes.
    pub fn count(&self) -> i64 {
        self.terms.iter().map(|t| t.count).sum()
    }

    /// True when the range denotes no values at all.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Rewind the cursor to the first value.
    pub fn restart(&mut self) {
        self.term = 0;
        self.index = 0;
    }

    /// Next value as a float, or `None` once every value has been returned.
    pub fn next_f64(&mut self) -> Option<f64> {
        while let Some(term) = self.terms.get(self.term) {
            if self.index < term.count {
                let v = term.value(self.index);
                self.index += 1;
                return Some(v);
            }
            self.term += 1;
            self.index = 0;
        }
        None
    }

    /// Next value rounded to the nearest integer.
    pub fn next_i64(&mut self) -> Option<i64> {
        self.next_f64().map(|v| v.round() as i64)
    }

    /// Largest value the range reaches, if any.
    pub fn max_value(&self) -> Option<f64> {
        self.terms
            .iter()
            .map(|t| t.first.max(t.value(t.count - 1)))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(text: &str, default_last: i64) -> Vec<i64> {
        let mut r = parse_range(text, default_last);
        let mut out = Vec::new();
        while let Some(v) = r.next_i64() {
            out.push(v);
        }
        out
    }

    #[test]
    fn mixed_terms_enumerate_in_order() {
        let r = parse_range("3,7-12x2", 100);
        assert_eq!(r.count(), 4);
        assert_eq!(ints("3,7-12x2", 100), vec![3, 7, 9, 11]);
    }

    #[test]
    fn empty_text_uses_default() {
        assert_eq!(ints("", 4), vec![1, 2, 3, 4]);
        assert_eq!(parse_range("  ", 0).count(), 0);
    }

    #[test]
    fn leading_dash_starts_at_one() {
        assert_eq!(ints("-5", 0), vec![1, 2, 3, 4, 5]);
        assert_eq!(ints("-7x3", 0), vec![1, 4, 7]);
    }

    #[test]
    fn open_ended_term_runs_to_default() {
        assert_eq!(ints("8-", 10), vec![8, 9, 10]);
    }

    #[test]
    fn whitespace_separates_terms() {
        assert_eq!(ints("1 4  6-7", 0), vec![1, 4, 6, 7]);
    }

    #[test]
    fn colon_is_a_range_separator() {
        assert_eq!(ints("2:4", 0), vec![2, 3, 4]);
    }

    #[test]
    fn descending_range_without_step() {
        assert_eq!(ints("12-7", 0), vec![12, 11, 10, 9, 8, 7]);
    }

    #[test]
    fn descending_range_with_negative_step() {
        assert_eq!(ints("12-7x-2", 0), vec![12, 10, 8]);
    }

    #[test]
    fn mis_signed_step_yields_first_value_only() {
        let r = parse_range("12-7x2", 0);
        assert_eq!(r.count(), 1);
        assert_eq!(ints("12-7x2", 0), vec![12]);
    }

    #[test]
    fn zero_step_does_not_loop() {
        assert_eq!(ints("1-3x0", 0), vec![1, 2, 3]);
    }

    #[test]
    fn single_value_ignores_step() {
        assert_eq!(ints("5x3", 0), vec![5]);
    }

    #[test]
    fn invalid_characters_give_empty_range() {
        let r = parse_range("3,7-q", 10);
        assert_eq!(r.count(), 0);
        assert!(r.is_empty());
        assert!(!is_range("abc"));
        assert!(is_range("1-5x2"));
    }

    #[test]
    fn unparseable_terms_give_empty_range() {
        assert_eq!(parse_range("1-2-3", 10).count(), 0);
        assert_eq!(parse_range("x", 10).count(), 0);
        assert_eq!(parse_range("4,.", 10).count(), 0);
    }

    #[test]
    fn open_ended_term_with_step() {
        assert_eq!(ints("3-x2", 10), vec![3, 5, 7, 9]);
    }

    #[test]
    fn float_values() {
        let mut r = parse_range("0.5-1.5x0.5", 0);
        assert_eq!(r.count(), 3);
        assert_eq!(r.next_f64(), Some(0.5));
        assert_eq!(r.next_f64(), Some(1.0));
        assert_eq!(r.next_f64(), Some(1.5));
        assert_eq!(r.next_f64(), None);
    }

    #[test]
    fn restart_rewinds_cursor() {
        let mut r = parse_range("1-3", 0);
        assert_eq!(r.next_i64(), Some(1));
        assert_eq!(r.next_i64(), Some(2));
        r.restart();
        assert_eq!(r.next_i64(), Some(1));
    }

    #[test]
    fn count_matches_enumeration() {
        for text in ["1-100x7", "5,3,1-2", "20-1x-3", "4", "-9x4,10-11"] {
            let r = parse_range(text, 50);
            assert_eq!(r.count() as usize, ints(text, 50).len(), "{text}");
        }
    }

    #[test]
    fn max_value_over_terms() {
        assert_eq!(parse_range("3,7-12x2", 0).max_value(), Some(11.0));
        assert_eq!(parse_range("q", 0).max_value(), None);
    }
}
