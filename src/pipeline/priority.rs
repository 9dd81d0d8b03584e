//! Explicit source ranking for deduplication.
//!
//! The aggregator keeps the first record it sees for a fingerprint, so the
//! order collectors run in decides which source wins. That order comes
//! from here rather than from wherever a source happens to be registered.

/// Ordered list of source names, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePriority {
    ranked: Vec<String>,
}

impl SourcePriority {
    pub fn new<I, S>(ranked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ranked: ranked.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of `source` in the ranking; unlisted sources rank last.
    pub fn rank(&self, source: &str) -> usize {
        self.ranked
            .iter()
            .position(|s| s.eq_ignore_ascii_case(source))
            .unwrap_or(self.ranked.len())
    }

    /// Stable sort of `items` by the rank of their source name.
    ///
    /// Listed sources come first in ranking order; unlisted ones follow in
    /// their original order.
    pub fn order<T, F>(&self, items: &mut [T], name_of: F)
    where
        F: Fn(&T) -> &str,
    {
        items.sort_by_key(|item| self.rank(name_of(item)));
    }
}
