use serde::{Deserialize, Serialize};
use std::fmt;

/// Order in which a scope consults its own source and its delegate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookupStrategy {
    /// Only the scope's own source.
    SelfOnly,
    /// Delegate first, then the own source.
    ParentFirst,
    /// Own source first, then the delegate.
    ChildFirst,
    /// Only the delegate.
    ParentOnly,
}

impl LookupStrategy {
    /// Whether the own source is consulted before the delegate.
    pub fn is_child_first(&self) -> bool {
        matches!(self, LookupStrategy::ChildFirst)
    }

    /// Sources to consult, in order. `true` stands for the own source,
    /// `false` for the delegate.
    pub fn order(&self) -> &'static [bool] {
        match self {
            LookupStrategy::SelfOnly => &[true],
            LookupStrategy::ParentFirst => &[false, true],
            LookupStrategy::ChildFirst => &[true, false],
            LookupStrategy::ParentOnly => &[false],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStrategy::SelfOnly => "SELF_ONLY",
            LookupStrategy::ParentFirst => "PARENT_FIRST",
            LookupStrategy::ChildFirst => "CHILD_FIRST",
            LookupStrategy::ParentOnly => "PARENT_ONLY",
        }
    }
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_strategy() {
        assert_eq!(LookupStrategy::SelfOnly.order(), &[true]);
        assert_eq!(LookupStrategy::ParentOnly.order(), &[false]);
        assert_eq!(LookupStrategy::ParentFirst.order(), &[false, true]);
        assert_eq!(LookupStrategy::ChildFirst.order(), &[true, false]);
    }

    #[test]
    fn test_display() {
        assert_eq!(LookupStrategy::ChildFirst.to_string(), "CHILD_FIRST");
    }
}
