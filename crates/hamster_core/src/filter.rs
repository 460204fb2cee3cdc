/// Filters shorter than this (after trimming) are treated as "no filter".
pub const MIN_FILTER_LEN: usize = 3;

/// Conjunctive, case-insensitive token filter over row title text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    tokens: Vec<String>,
}

impl FilterQuery {
    /// Returns `None` when the text is too short to act as a filter.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.chars().count() < MIN_FILTER_LEN {
            return None;
        }
        let tokens = text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>();
        Some(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// A row matches iff every token occurs somewhere in its text.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.tokens.iter().all(|token| haystack.contains(token.as_str()))
    }
}

/// Applies an optional filter; no filter matches everything.
pub fn matches_filter(filter: Option<&FilterQuery>, text: &str) -> bool {
    filter.map_or(true, |query| query.matches(text))
}
