//! Direct search through the document engine

use pagescrub_pdf::{PdfError, RedactableDocument, SearchOutcome};
use pagescrub_rules::PatternRule;

use crate::model::{Confidence, Match, Provenance};

#[derive(Debug)]
pub enum DirectOutcome {
    Matches(Vec<Match>),
    /// The engine's search cannot evaluate this pattern; token matching
    /// takes over for it on this page.
    Unsupported { reason: String },
}

/// Search the page's text layer with the engine's own regex search.
pub fn match_direct<D: RedactableDocument + ?Sized>(
    doc: &D,
    page: usize,
    pattern_index: usize,
    rule: &PatternRule,
) -> Result<DirectOutcome, PdfError> {
    match doc.search_regex(page, rule.source())? {
        SearchOutcome::Hits(hits) => Ok(DirectOutcome::Matches(
            hits.into_iter()
                .map(|hit| Match {
                    text: hit.text,
                    rect: hit.rect,
                    provenance: Provenance::Direct,
                    confidence: Confidence::Exact,
                    pattern_index,
                })
                .collect(),
        )),
        SearchOutcome::PatternUnsupported { reason } => Ok(DirectOutcome::Unsupported { reason }),
    }
}
