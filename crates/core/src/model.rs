//! Matches and regions

use pagescrub_pdf::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which strategy produced a match. Ordered by trust, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Direct,
    FallbackToken,
    Ocr,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Direct => write!(f, "direct"),
            Provenance::FallbackToken => write!(f, "fallback-token"),
            Provenance::Ocr => write!(f, "ocr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    /// Native text
    Exact,
    /// OCR score, 0-100
    Score(f32),
}

/// A proposal from one matcher. Never persisted.
#[derive(Clone, PartialEq)]
pub struct Match {
    /// Only for in-process decisions, never logged or reported.
    pub text: String,
    pub rect: Rect,
    pub provenance: Provenance,
    pub confidence: Confidence,
    pub pattern_index: usize,
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("text", &format_args!("<{} chars>", self.text.chars().count()))
            .field("rect", &self.rect)
            .field("provenance", &self.provenance)
            .field("confidence", &self.confidence)
            .field("pattern_index", &self.pattern_index)
            .finish()
    }
}

/// An accepted rectangle awaiting commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub rect: Rect,
    pub provenance: Provenance,
    pub confidence: Confidence,
    pub pattern_index: usize,
}

impl From<Match> for Region {
    fn from(m: Match) -> Self {
        Self {
            rect: m.rect,
            provenance: m.provenance,
            confidence: m.confidence,
            pattern_index: m.pattern_index,
        }
    }
}
