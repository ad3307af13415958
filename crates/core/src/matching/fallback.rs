//! Token fallback matching over extracted words

use pagescrub_pdf::Word;
use pagescrub_rules::{PatternRule, TokenMatchMode};

use crate::model::{Confidence, Match, Provenance};

/// Evaluate `rule` against each word on its own. At most one match per
/// word; spans split across words are not reassembled.
pub fn match_tokens(
    words: &[Word],
    pattern_index: usize,
    rule: &PatternRule,
    mode: TokenMatchMode,
) -> Vec<Match> {
    words
        .iter()
        .filter(|word| rule.matches_token(&word.text, mode))
        .map(|word| Match {
            text: word.text.clone(),
            rect: word.rect,
            provenance: Provenance::FallbackToken,
            confidence: Confidence::Exact,
            pattern_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagescrub_pdf::Rect;

    fn words() -> Vec<Word> {
        ["Acct:", "123456789", "ref:AB123456789"]
            .iter()
            .enumerate()
            .map(|(i, text)| Word {
                text: text.to_string(),
                rect: Rect::from_xywh(i as f64 * 100.0, 0.0, 90.0, 12.0),
            })
            .collect()
    }

    #[test]
    fn test_substring_and_full_token() {
        let rule = PatternRule::compile(0, None, r"\d{9}(?!\d)").unwrap();

        let loose = match_tokens(&words(), 0, &rule, TokenMatchMode::Substring);
        assert_eq!(loose.len(), 2);

        let strict = match_tokens(&words(), 0, &rule, TokenMatchMode::FullToken);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].rect, Rect::from_xywh(100.0, 0.0, 90.0, 12.0));
        assert_eq!(strict[0].provenance, Provenance::FallbackToken);
    }

    #[test]
    fn test_backreference() {
        let rule = PatternRule::compile(0, None, r"(\d)\1{3}").unwrap();
        let words = vec![Word {
            text: "x7777".to_string(),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
        }];
        assert_eq!(match_tokens(&words, 0, &rule, TokenMatchMode::Substring).len(), 1);
        assert!(match_tokens(&words, 0, &rule, TokenMatchMode::FullToken).is_empty());
    }
}
