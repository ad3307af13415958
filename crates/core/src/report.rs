//! Run reports
//!
//! Everything here is serialisable and free of matched text: rectangles,
//! provenance, counts and statuses only.

use pagescrub_verify::VerifyResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::classify::PageClass;
use crate::model::{Provenance, Region};

/// Outcome of the OCR pass for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum OcrStatus {
    /// The page was never classified as scanned.
    #[default]
    NotRun,
    /// The page needed OCR but no engine was available or OCR was switched off.
    Disabled,
    /// Tokens kept after the confidence floor.
    Completed { tokens: usize },
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceCounts {
    pub direct: usize,
    pub fallback_token: usize,
    pub ocr: usize,
}

impl ProvenanceCounts {
    pub fn tally(regions: &[Region]) -> Self {
        let mut counts = Self::default();
        for region in regions {
            match region.provenance {
                Provenance::Direct => counts.direct += 1,
                Provenance::FallbackToken => counts.fallback_token += 1,
                Provenance::Ocr => counts.ocr += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.direct + self.fallback_token + self.ocr
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub index: usize,
    pub class: PageClass,
    /// Text-bearing page that was sent through OCR as a second pass.
    pub promoted: bool,
    pub regions: Vec<Region>,
    pub counts: ProvenanceCounts,
    pub ocr: OcrStatus,
    /// Pattern indices the engine search could not evaluate on this page.
    pub unsupported_patterns: Vec<usize>,
    /// Images under a region whose pixels could not be rewritten.
    #[serde(default)]
    pub images_unscrubbed: usize,
}

impl PageReport {
    pub fn committed(&self) -> usize {
        self.regions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub pages: Vec<PageReport>,
    pub total: usize,
    pub encrypted: bool,
}

impl DocumentReport {
    pub fn counts(&self) -> ProvenanceCounts {
        self.pages.iter().fold(ProvenanceCounts::default(), |acc, p| ProvenanceCounts {
            direct: acc.direct + p.counts.direct,
            fallback_token: acc.fallback_token + p.counts.fallback_token,
            ocr: acc.ocr + p.counts.ocr,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDisposition {
    Written,
    CopiedUnmodified,
    NotWritten,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub document: DocumentReport,
    pub output_disposition: OutputDisposition,
    pub verification: Option<VerifyResult>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.document.total
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
