//! The single tokenizer shared by diffing, gene resolution and
//! merge-back: tokens are delimited by spaces and dashes.

/// Joins the two axes of a 2-D position expression.
pub const AXIS_SEPARATOR: &str = " and ";

/// Splits on every space and dash. Empty tokens (from repeated
/// delimiters) are kept so that indices line up with `rewrite_tokens`.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split([' ', '-']).collect()
}

pub fn tokenize_owned(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(String::from).collect()
}

/// Returns the first index at which `current` differs from `previous`.
/// An index equal to `previous.len()` means a token was appended.
///
/// This is a first-difference heuristic: a paste spanning several
/// tokens, or a deletion in the middle of the text, is reported as a
/// change at the first differing index only.
pub fn diff<A, B>(previous: &[A], current: &[B]) -> Option<usize>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    for (i, token) in current.iter().enumerate() {
        match previous.get(i) {
            None => return Some(i),
            Some(prev) if prev.as_ref() != token.as_ref() => return Some(i),
            _ => (),
        }
    }

    None
}

/// Remembers the tokens of the last text the user or the viewport
/// produced, so the next edit can be diffed against it.
#[derive(Debug, Default, Clone)]
pub struct TokenDiffTracker {
    previous: Vec<String>,
}

impl TokenDiffTracker {
    pub fn new(text: &str) -> Self {
        Self {
            previous: tokenize_owned(text),
        }
    }

    pub fn baseline(&self) -> &[String] {
        &self.previous
    }

    /// Replaces the baseline without reporting a change, e.g. after the
    /// text was regenerated from the viewport.
    pub fn reset(&mut self, text: &str) {
        self.previous = tokenize_owned(text);
    }

    /// Diffs `text` against the baseline, then makes `text` the new
    /// baseline.
    pub fn update(&mut self, text: &str) -> Option<usize> {
        let current = tokenize(text);
        let changed = diff(&self.previous, &current);
        self.previous = current.into_iter().map(String::from).collect();
        changed
    }
}

/// One dash-delimited token inside a space-delimited segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSlot<'a> {
    /// Index in `tokenize(text)`.
    pub index: usize,
    /// Position within the dash-delimited range, 0 for the first endpoint.
    pub position: usize,
    /// Number of dash-delimited parts in the enclosing segment.
    pub range_len: usize,
    pub text: &'a str,
}

impl TokenSlot<'_> {
    pub fn is_lone(&self) -> bool {
        self.range_len == 1
    }
}

/// Rebuilds `text`, replacing each token for which `f` returns a new
/// string. Delimiters are preserved exactly.
pub fn rewrite_tokens<F>(text: &str, mut f: F) -> String
where
    F: FnMut(TokenSlot<'_>) -> Option<String>,
{
    let mut index = 0;

    let segments = text
        .split(' ')
        .map(|segment| {
            let parts = segment.split('-').collect::<Vec<_>>();
            let range_len = parts.len();

            parts
                .into_iter()
                .enumerate()
                .map(|(position, part)| {
                    let slot = TokenSlot {
                        index,
                        position,
                        range_len,
                        text: part,
                    };
                    index += 1;
                    f(slot).unwrap_or_else(|| part.to_string())
                })
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>();

    segments.join(" ")
}
