//! Post-redaction verification
//!
//! Re-scans the native text of a written document with full regex
//! semantics. Residual hits mean a redaction did not remove the text
//! beneath it.

use pagescrub_pdf::{PdfError, RedactableDocument};
use pagescrub_rules::PatternSet;
use serde::{Deserialize, Serialize};

/// Matches of one pattern still present on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualHit {
    pub page: usize,
    pub pattern_index: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub residual: Vec<ResidualHit>,
    pub warnings: Vec<String>,
}

impl VerifyResult {
    pub fn residual_total(&self) -> usize {
        self.residual.iter().map(|hit| hit.count).sum()
    }
}

/// Scan every page of `doc`. The document must already be unlocked.
pub fn verify_document<D: RedactableDocument + ?Sized>(
    doc: &D,
    patterns: &PatternSet,
) -> Result<VerifyResult, PdfError> {
    let mut residual = Vec::new();
    let mut warnings = Vec::new();

    for page in 0..doc.page_count() {
        let text = doc.page_text(page)?;
        if text.trim().is_empty() {
            continue;
        }

        let before = residual.len();
        for (pattern_index, rule) in patterns.iter().enumerate() {
            let count = rule.count_in(&text);
            if count > 0 {
                residual.push(ResidualHit {
                    page,
                    pattern_index,
                    count,
                });
            }
        }

        let page_hits: usize = residual[before..].iter().map(|hit| hit.count).sum();
        if page_hits > 0 {
            log::warn!(
                "[Verify] page {}: {} residual match(es) in the text layer",
                page,
                page_hits
            );
            warnings.push(format!(
                "page {}: {} residual match(es) in the text layer",
                page, page_hits
            ));
        }
    }

    log::info!(
        "[Verify] {} page(s) checked, {} residual match(es)",
        doc.page_count(),
        residual.iter().map(|hit| hit.count).sum::<usize>()
    );

    Ok(VerifyResult {
        ok: residual.is_empty(),
        residual,
        warnings,
    })
}
