//! Parsing of completion text into ticker symbols.
//!
//! Completion output is untrusted free text. Vision answers are read as a JSON
//! array when one is present and scanned for ticker-shaped tokens otherwise;
//! text answers are a comma/whitespace list. Every candidate then goes through
//! [`TickerFilter`].

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Table headers and units that look like tickers but never are.
pub const DENYLIST: &[&str] = &[
    "FWD", "EPS", "AVG", "TOTAL", "SOURCE", "ALPHA", "LSEG", "FACTSET", "GROWTH", "RATE", "USD",
    "S&P", "500", "INDEX", "SYMBOL", "COMPANY", "NAME", "REVENUE", "MAG", "TOP", "7",
];

fn token_pattern() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\b[A-Z0-9.]{1,8}\b").expect("valid ticker pattern"))
}

/// Normalization and validation applied to every ticker candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerFilter {
    pub max_len: usize,
    pub deny: &'static [&'static str],
}

impl TickerFilter {
    pub const VISION: TickerFilter = TickerFilter {
        max_len: 8,
        deny: DENYLIST,
    };
    pub const TEXT: TickerFilter = TickerFilter {
        max_len: 10,
        deny: DENYLIST,
    };

    /// Upper-cased symbol if `raw` passes, otherwise `None`.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let t = raw.trim().to_uppercase();
        let len = t.chars().count();
        if len == 0 || len > self.max_len {
            return None;
        }
        if self.deny.contains(&t.as_str()) {
            return None;
        }
        if !t.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.') {
            return None;
        }
        Some(t)
    }

    /// Filter and deduplicate, keeping first-seen order.
    pub fn apply<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|c| self.accept(c.as_ref()))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

/// Raw candidates from a vision answer.
///
/// The outermost `[...]` span is parsed as JSON; non-string elements are
/// ignored. If no span exists or it is not valid JSON, ticker-shaped tokens
/// are scanned from the whole answer instead.
pub fn parse_ticker_array(content: &str) -> Vec<String> {
    let span = match (content.find('['), content.rfind(']')) {
        (Some(start), Some(end)) if start < end => Some(&content[start..=end]),
        _ => None,
    };
    if let Some(Ok(items)) = span.map(serde_json::from_str::<Vec<Value>>) {
        return items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect();
    }
    token_pattern()
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn list_tokens(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|t| t.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '{' | '}')))
        .filter(|t| !t.is_empty())
}

fn is_none_token(token: &str) -> bool {
    token
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .eq_ignore_ascii_case("none")
}

/// Raw candidates from a text answer, or `None` when any token of the answer is `NONE`.
pub fn parse_ticker_list(content: &str) -> Option<Vec<String>> {
    if list_tokens(content).any(is_none_token) {
        return None;
    }
    Some(
        list_tokens(content.trim().trim_end_matches('.'))
            .map(|t| t.replace(['(', ')', '[', ']', '{', '}'], ""))
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

pub fn tickers_from_vision(content: &str) -> Vec<String> {
    TickerFilter::VISION.apply(parse_ticker_array(content))
}

pub fn tickers_from_text(content: &str) -> Vec<String> {
    match parse_ticker_list(content) {
        Some(candidates) => TickerFilter::TEXT.apply(candidates),
        None => Vec::new(),
    }
}
