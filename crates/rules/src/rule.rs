//! Compiled match rules

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// How a rule is evaluated against a single word token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TokenMatchMode {
    /// The pattern may match anywhere inside the token.
    #[default]
    Substring,
    /// The pattern must cover the whole token.
    FullToken,
}

impl std::fmt::Display for TokenMatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenMatchMode::Substring => write!(f, "substring"),
            TokenMatchMode::FullToken => write!(f, "full-token"),
        }
    }
}

/// A validated regular expression.
///
/// All three compiled forms are built up front so that a rule which made it
/// into a [`crate::PatternSet`] can never fail to compile later.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: Option<String>,
    source: String,
    search: Regex,
    full_token: Regex,
    case_insensitive: Regex,
}

impl PatternRule {
    /// Compile `source`; `index` is only used for the error message.
    pub fn compile(index: usize, name: Option<String>, source: &str) -> Result<Self, RuleError> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| RuleError::Compile {
                index,
                reason: e.to_string(),
            })
        };

        Ok(Self {
            name,
            source: source.to_string(),
            search: build(source)?,
            full_token: build(&format!("^(?:{})$", source))?,
            case_insensitive: build(&format!("(?i)(?:{})", source))?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Evaluate against one word token.
    pub fn matches_token(&self, token: &str, mode: TokenMatchMode) -> bool {
        let regex = match mode {
            TokenMatchMode::Substring => &self.search,
            TokenMatchMode::FullToken => &self.full_token,
        };
        evaluate(regex, token)
    }

    /// Case-insensitive substring test, used for noisy OCR text.
    pub fn matches_loosely(&self, text: &str) -> bool {
        evaluate(&self.case_insensitive, text)
    }

    /// Number of non-overlapping matches in `text`.
    pub fn count_in(&self, text: &str) -> usize {
        self.search
            .find_iter(text)
            .filter_map(|m| match m {
                Ok(m) => Some(m),
                Err(e) => {
                    log::debug!("[Rules] evaluation aborted: {}", e);
                    None
                }
            })
            .count()
    }
}

// Backtracking limits surface as runtime errors; those count as no match.
fn evaluate(regex: &Regex, text: &str) -> bool {
    match regex.is_match(text) {
        Ok(matched) => matched,
        Err(e) => {
            log::debug!("[Rules] evaluation aborted: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_rejects_invalid_pattern() {
        let err = PatternRule::compile(3, None, r"(\d{8").unwrap_err();
        assert!(matches!(err, RuleError::Compile { index: 3, .. }));
    }

    #[test]
    fn test_substring_vs_full_token() {
        let rule = PatternRule::compile(0, None, r"\d{9}").unwrap();
        assert!(rule.matches_token("123456789", TokenMatchMode::Substring));
        assert!(rule.matches_token("123456789", TokenMatchMode::FullToken));
        assert!(rule.matches_token("#123456789.", TokenMatchMode::Substring));
        assert!(!rule.matches_token("#123456789.", TokenMatchMode::FullToken));
    }

    #[test]
    fn test_lookaround_and_backreference_supported() {
        let rule = PatternRule::compile(0, None, r"(?<=#)\d{4}").unwrap();
        assert!(rule.matches_token("#1234", TokenMatchMode::Substring));
        assert!(!rule.matches_token("1234", TokenMatchMode::Substring));

        let rule = PatternRule::compile(0, None, r"(\d)\1{3}").unwrap();
        assert!(rule.matches_token("7777", TokenMatchMode::FullToken));
        assert!(!rule.matches_token("7778", TokenMatchMode::FullToken));
    }

    #[test]
    fn test_full_token_respects_alternation() {
        let rule = PatternRule::compile(0, None, "abc|def").unwrap();
        assert!(rule.matches_token("def", TokenMatchMode::FullToken));
        assert!(!rule.matches_token("abcdef", TokenMatchMode::FullToken));
    }

    #[test]
    fn test_loose_match_ignores_case() {
        let rule = PatternRule::compile(0, None, r"ACCT-\d+").unwrap();
        assert!(rule.matches_loosely("acct-991"));
        assert!(!rule.matches_token("acct-991", TokenMatchMode::Substring));
    }

    #[test]
    fn test_count_in() {
        let rule = PatternRule::compile(0, None, r"\b\d{8,17}\b").unwrap();
        assert_eq!(rule.count_in("a 12345678 b 1234 c 9876543210"), 2);
    }
}
