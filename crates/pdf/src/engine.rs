//! Document engine contract
//!
//! Every capability the redaction pipeline consumes from a PDF backend goes
//! through these two traits. Page indices are zero-based.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PdfError;
use crate::geometry::{PageSize, Rect, Rgb};

/// A word from the page's text layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub rect: Rect,
}

/// One line fragment of a regex match.
#[derive(Debug, Clone, PartialEq)]
pub struct TextHit {
    pub rect: Rect,
    pub text: String,
}

/// Result of a regex search over a page's text layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// One hit per matched line fragment.
    Hits(Vec<TextHit>),
    /// The engine's regex dialect cannot evaluate the pattern.
    PatternUnsupported { reason: String },
}

/// What happens to raster images beneath a committed mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImagePolicy {
    /// Blank the image pixels under the mark.
    #[default]
    Scrub,
    /// Leave pixels untouched; only the overlay hides them.
    Preserve,
}

/// A pending or committed redaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionMark {
    pub rect: Rect,
    pub fill: Rgb,
}

/// What one [`RedactableDocument::commit_redactions`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Marks burned in
    pub marks: usize,
    pub glyphs_removed: usize,
    pub paths_removed: usize,
    pub images_scrubbed: usize,
    /// Images under a mark whose pixels were left in place; only the overlay
    /// hides them.
    pub images_unscrubbed: usize,
}

/// Output options for [`RedactableDocument::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Deflate streams
    pub compress: bool,
    /// Drop objects no longer reachable from the trailer
    pub prune_unused: bool,
    /// Record tool and time in the document info dictionary
    pub stamp_metadata: bool,
}

impl SaveOptions {
    /// Options for a document that received redactions.
    pub fn redacted() -> Self {
        Self {
            compress: true,
            prune_unused: true,
            stamp_metadata: true,
        }
    }

    /// Options for writing an unmodified copy.
    pub fn copy() -> Self {
        Self {
            compress: false,
            prune_unused: false,
            stamp_metadata: false,
        }
    }
}

/// Opens documents from disk.
pub trait DocumentEngine {
    type Document: RedactableDocument;

    fn open(&self, path: &Path) -> Result<Self::Document, PdfError>;
}

/// A loaded document that can be inspected page by page and redacted.
pub trait RedactableDocument {
    fn page_count(&self) -> usize;

    /// The file carries an encryption dictionary.
    fn is_encrypted(&self) -> bool;

    /// Try to unlock the document; `true` when page content became readable.
    fn authenticate(&mut self, password: &str) -> bool;

    /// Unrotated page extent. Page space, text rectangles and marks all use
    /// this orientation.
    fn page_size(&self, page: usize) -> Result<PageSize, PdfError>;

    /// Clockwise rotation applied when the page is displayed: 0, 90, 180 or
    /// 270.
    fn page_rotation(&self, page: usize) -> Result<u16, PdfError>;

    /// Native text layer, possibly empty.
    fn page_text(&self, page: usize) -> Result<String, PdfError>;

    /// Whitespace-delimited words with their rectangles.
    fn page_words(&self, page: usize) -> Result<Vec<Word>, PdfError>;

    fn search_regex(&self, page: usize, pattern: &str) -> Result<SearchOutcome, PdfError>;

    /// Render the full page extent at `dpi`, as displayed: a page rotated by
    /// 90 degrees comes back with width and height swapped.
    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage, PdfError>;

    fn add_redaction_mark(&mut self, page: usize, rect: Rect, fill: Rgb) -> Result<(), PdfError>;

    fn pending_marks(&self, page: usize) -> &[RedactionMark];

    /// Burn every pending mark of `page` into the content in one step,
    /// removing the text and vector content beneath. Not idempotent.
    fn commit_redactions(
        &mut self,
        page: usize,
        images: ImagePolicy,
    ) -> Result<CommitSummary, PdfError>;

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfError>;
}

/// Normalise a `/Rotate` value. Values that are not a multiple of 90 are
/// ignored by viewers and count as upright.
pub(crate) fn normalize_rotation(degrees: i64) -> u16 {
    match degrees.rem_euclid(360) {
        r @ (90 | 180 | 270) => r as u16,
        _ => 0,
    }
}

pub(crate) fn check_page(index: usize, count: usize) -> Result<(), PdfError> {
    if index < count {
        Ok(())
    } else {
        Err(PdfError::PageOutOfRange { index, count })
    }
}
