use serde::{Deserialize, Serialize};

/// How an entity identifier is compared against stored entity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Identical after trimming.
    Exact,
    /// Identical ignoring case.
    CaseInsensitive,
    /// The stored name contains the identifier, ignoring case.
    #[default]
    Substring,
}

/// An entity identifier paired with the strategy used to match it.
///
/// # Examples
///
/// ```rust
/// use agrocast::series::matching::{EntityMatcher, MatchStrategy};
///
/// let matcher = EntityMatcher::new("cabai", MatchStrategy::Substring);
/// assert!(matcher.matches("Cabai Merah Keriting"));
/// assert!(!EntityMatcher::new("cabai", MatchStrategy::Exact).matches("Cabai"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMatcher {
    pattern: String,
    strategy: MatchStrategy,
}

impl EntityMatcher {
    pub fn new(pattern: &str, strategy: MatchStrategy) -> Self {
        Self {
            pattern: pattern.trim().to_string(),
            strategy,
        }
    }

    pub fn exact(pattern: &str) -> Self {
        Self::new(pattern, MatchStrategy::Exact)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        match self.strategy {
            MatchStrategy::Exact => candidate == self.pattern,
            MatchStrategy::CaseInsensitive => {
                candidate.to_lowercase() == self.pattern.to_lowercase()
            }
            MatchStrategy::Substring => candidate
                .to_lowercase()
                .contains(&self.pattern.to_lowercase()),
        }
    }
}
