//! Ordered pattern collections

use crate::rule::PatternRule;

/// Built-in patterns used when no pattern file is available.
pub const DEFAULT_PATTERNS: &[&str] = &[r"\b123456789\b", r"\b\d{8,17}\b"];

/// A pattern source string plus an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub name: Option<String>,
    pub pattern: String,
}

impl PatternSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
        }
    }
}

impl From<&str> for PatternSpec {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for PatternSpec {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

/// A source entry that failed to compile.
#[derive(Debug, Clone)]
pub struct RejectedPattern {
    /// Position in the input sequence
    pub index: usize,
    pub reason: String,
}

/// Validated rules in application order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    rules: Vec<PatternRule>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Compile every spec, keeping order and skipping the ones that fail.
    pub fn from_specs<I, S>(specs: I) -> (Self, Vec<RejectedPattern>)
    where
        I: IntoIterator<Item = S>,
        S: Into<PatternSpec>,
    {
        let mut set = Self::new();
        let mut rejected = Vec::new();

        for (index, spec) in specs.into_iter().enumerate() {
            let spec = spec.into();
            match PatternRule::compile(index, spec.name, &spec.pattern) {
                Ok(rule) => set.rules.push(rule),
                Err(e) => {
                    log::warn!("[Rules] skipping pattern #{}: {}", index, e);
                    rejected.push(RejectedPattern {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (set, rejected)
    }

    pub fn defaults() -> Self {
        Self::from_specs(DEFAULT_PATTERNS.iter().copied()).0
    }

    pub fn push(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, other: PatternSet) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PatternRule> {
        self.rules.get(index)
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a PatternRule;
    type IntoIter = std::slice::Iter<'a, PatternRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_entries_are_skipped_in_order() {
        let (set, rejected) = PatternSet::from_specs([r"\d{9}", r"([a-z", r"ACCT\d+"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().source(), r"\d{9}");
        assert_eq!(set.get(1).unwrap().source(), r"ACCT\d+");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 1);
    }

    #[test]
    fn test_defaults_compile() {
        assert_eq!(PatternSet::defaults().len(), DEFAULT_PATTERNS.len());
    }

    #[test]
    fn test_extend_appends() {
        let mut set = PatternSet::defaults();
        let (extra, _) = PatternSet::from_specs(["foo"]);
        set.extend(extra);
        assert_eq!(set.iter().last().unwrap().source(), "foo");
    }
}
