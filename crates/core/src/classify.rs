//! Page classification

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageClass {
    TextBearing,
    LikelyScanned,
}

/// Decides from a page's native text whether OCR is needed.
#[derive(Debug, Clone, Copy)]
pub struct PageClassifier {
    text_threshold: usize,
    sparse_threshold: usize,
}

fn stripped_len(text: &str) -> usize {
    text.trim().chars().count()
}

impl PageClassifier {
    pub fn new(text_threshold: usize, sparse_threshold: usize) -> Self {
        Self {
            text_threshold,
            sparse_threshold,
        }
    }

    pub fn classify(&self, text: &str) -> PageClass {
        if stripped_len(text) < self.text_threshold {
            PageClass::LikelyScanned
        } else {
            PageClass::TextBearing
        }
    }

    /// A text-bearing page whose native matching found nothing but whose
    /// text is sparse gets a second pass through OCR.
    pub fn should_promote(&self, class: PageClass, text: &str, native_matches: usize) -> bool {
        let len = stripped_len(text);
        class == PageClass::TextBearing
            && native_matches == 0
            && len > 0
            && len < self.sparse_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PageClassifier {
        PageClassifier::new(100, 500)
    }

    #[test]
    fn test_classify_by_stripped_length() {
        let c = classifier();
        assert_eq!(c.classify(""), PageClass::LikelyScanned);
        assert_eq!(c.classify(&format!("  {}  \n", "x".repeat(99))), PageClass::LikelyScanned);
        assert_eq!(c.classify(&"x".repeat(100)), PageClass::TextBearing);
    }

    #[test]
    fn test_promotion() {
        let c = classifier();
        let sparse = "x".repeat(200);
        let dense = "x".repeat(500);
        assert!(c.should_promote(PageClass::TextBearing, &sparse, 0));
        assert!(!c.should_promote(PageClass::TextBearing, &sparse, 1));
        assert!(!c.should_promote(PageClass::TextBearing, &dense, 0));
        assert!(!c.should_promote(PageClass::LikelyScanned, &sparse, 0));
        assert!(!c.should_promote(PageClass::TextBearing, "   ", 0));
    }
}
