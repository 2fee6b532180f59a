//! Turns human-typed editor arguments into a discrete argv.
//!
//! The editor is spawned directly, never through a shell, so the output of
//! [`tokenize`] is passed verbatim as process arguments. Splitting is a small
//! character-scanning state machine; each raw token is then normalized by
//! [`normalize_arg`].

use serde::Deserialize;

/// Extra editor arguments as they appear in the editor config file: either a
/// single command-line string or an already-split list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawArgs {
    Line(String),
    List(Vec<String>),
}

impl Default for RawArgs {
    fn default() -> Self {
        RawArgs::List(Vec::new())
    }
}

impl From<&str> for RawArgs {
    fn from(line: &str) -> Self {
        RawArgs::Line(line.to_string())
    }
}

impl From<Vec<String>> for RawArgs {
    fn from(list: Vec<String>) -> Self {
        RawArgs::List(list)
    }
}

/// Split (strings only) and normalize into final arguments.
pub fn tokenize(raw: &RawArgs) -> Vec<String> {
    match raw {
        RawArgs::Line(line) => split_line(line).iter().map(|t| normalize_arg(t)).collect(),
        RawArgs::List(list) => list.iter().map(|t| normalize_arg(t)).collect(),
    }
}

/// Double every backslash so a path survives [`normalize_arg`] unchanged.
pub fn escape_path_arg(path: &str) -> String {
    path.replace('\\', "\\\\")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

impl Quote {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Bare,
    InQuote(Quote),
    /// The previous character was a backslash; `None` means it was outside quotes.
    EscapePending(Option<Quote>),
}

/// Split on unquoted, unescaped whitespace. Quote characters and backslashes
/// stay in the raw tokens. A quote that is never closed is dropped and acts as
/// a token boundary; the text after it is scanned again as bare input.
pub fn split_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Bare;
    // Index of the open quote and the token length just before it.
    let mut opened_at = (0, 0);
    let mut pos = 0;

    loop {
        let Some(&ch) = chars.get(pos) else {
            if !matches!(
                state,
                ScanState::InQuote(_) | ScanState::EscapePending(Some(_))
            ) {
                break;
            }
            let (quote_pos, token_len) = opened_at;
            current.truncate(token_len);
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            state = ScanState::Bare;
            pos = quote_pos + 1;
            continue;
        };
        pos += 1;

        state = match state {
            ScanState::Bare if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                ScanState::Bare
            }
            ScanState::Bare => {
                let next = match (ch, Quote::from_char(ch)) {
                    ('\\', _) => ScanState::EscapePending(None),
                    (_, Some(quote)) => {
                        opened_at = (pos - 1, current.len());
                        ScanState::InQuote(quote)
                    }
                    _ => ScanState::Bare,
                };
                current.push(ch);
                next
            }
            ScanState::InQuote(quote) => {
                current.push(ch);
                if ch == '\\' {
                    ScanState::EscapePending(Some(quote))
                } else if ch == quote.as_char() {
                    ScanState::Bare
                } else {
                    ScanState::InQuote(quote)
                }
            }
            ScanState::EscapePending(resume) => {
                current.push(ch);
                resume.map_or(ScanState::Bare, ScanState::InQuote)
            }
        };
    }

    // trailing lone backslash escapes nothing
    if state == ScanState::EscapePending(None) {
        current.pop();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Normalize one raw token.
///
/// A token wholly wrapped in matching quotes loses them and has `\<quote>` and
/// `\\` unescaped. Any other token first drops each backslash not followed by
/// another backslash, then strips the quotes of every quoted sub-span, leftmost
/// span first.
pub fn normalize_arg(token: &str) -> String {
    let trimmed = token.trim();
    if let Some((quote, inner)) = wrapped_inner(trimmed) {
        return unescape_wrapped(inner, quote);
    }
    strip_quoted_spans(&drop_lone_backslashes(token))
}

fn wrapped_inner(token: &str) -> Option<(Quote, &str)> {
    let first = token.chars().next()?;
    let quote = Quote::from_char(first)?;
    if token.len() < 2 || !token.ends_with(quote.as_char()) {
        return None;
    }
    Some((quote, &token[1..token.len() - 1]))
}

fn unescape_wrapped(inner: &str, quote: Quote) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == quote.as_char() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn drop_lone_backslashes(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() != Some(&'\\') {
            continue;
        }
        out.push(ch);
    }
    out
}

fn strip_quoted_spans(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(ch) = rest.chars().next() {
        let after = &rest[ch.len_utf8()..];
        match Quote::from_char(ch).and_then(|q| after.find(q.as_char())) {
            Some(end) => {
                out.push_str(&after[..end]);
                rest = &after[end + 1..];
            }
            None => {
                out.push(ch);
                rest = after;
            }
        }
    }
    out
}
