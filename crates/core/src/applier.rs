//! Burn accepted regions into a page

use pagescrub_pdf::{CommitSummary, ImagePolicy, PdfError, RedactableDocument, Rgb};

use crate::model::Region;

#[derive(Debug, Clone, Copy)]
pub struct RedactionApplier {
    pub fill: Rgb,
    pub images: ImagePolicy,
}

impl RedactionApplier {
    pub fn new(fill: Rgb, images: ImagePolicy) -> Self {
        Self { fill, images }
    }

    /// Mark every region and commit the page once. An empty set leaves the
    /// page untouched and returns an empty summary.
    pub fn apply<D: RedactableDocument + ?Sized>(
        &self,
        doc: &mut D,
        page: usize,
        regions: &[Region],
    ) -> Result<CommitSummary, PdfError> {
        if regions.is_empty() {
            return Ok(CommitSummary::default());
        }
        for region in regions {
            doc.add_redaction_mark(page, region.rect, self.fill)?;
        }
        let summary = doc.commit_redactions(page, self.images)?;
        log::debug!(
            "[Commit] page {}: {} region(s) burned in, images {:?}",
            page,
            summary.marks,
            self.images
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, Provenance};
    use pagescrub_pdf::{MemoryDocument, MemoryPage, Rect};

    fn region(rect: Rect) -> Region {
        Region {
            rect,
            provenance: Provenance::Direct,
            confidence: Confidence::Exact,
            pattern_index: 0,
        }
    }

    #[test]
    fn test_empty_set_does_not_commit() {
        let mut doc = MemoryDocument::new().with_page(MemoryPage::letter().line(72.0, 72.0, 12.0, "hello"));
        let applier = RedactionApplier::new(Rgb::BLACK, ImagePolicy::Scrub);
        assert_eq!(applier.apply(&mut doc, 0, &[]).unwrap(), CommitSummary::default());
        assert!(doc.pages[0].redactions.is_empty());
        // page is still committable
        let rect = doc.page_words(0).unwrap()[0].rect;
        assert_eq!(applier.apply(&mut doc, 0, &[region(rect)]).unwrap().marks, 1);
    }

    #[test]
    fn test_apply_removes_text_and_clears_pending() {
        let mut doc = MemoryDocument::new()
            .with_page(MemoryPage::letter().line(72.0, 72.0, 12.0, "secret 123456789 visible"));
        let words = doc.page_words(0).unwrap();
        let target = words.iter().find(|w| w.text == "123456789").unwrap().rect;

        let applier = RedactionApplier::new(Rgb::BLACK, ImagePolicy::Scrub);
        let summary = applier.apply(&mut doc, 0, &[region(target)]).unwrap();
        assert_eq!(summary.marks, 1);
        assert_eq!(summary.glyphs_removed, 9);

        let text = doc.page_text(0).unwrap();
        assert!(!text.contains("123456789"));
        assert!(text.contains("visible"));
        assert!(doc.pending_marks(0).is_empty());
    }

    #[test]
    fn test_image_policy_passed_through() {
        let image_rect = Rect::new(100.0, 100.0, 300.0, 300.0);
        let mut doc = MemoryDocument::new().with_page(MemoryPage::letter().image(image_rect));
        let applier = RedactionApplier::new(Rgb::BLACK, ImagePolicy::Preserve);
        applier
            .apply(&mut doc, 0, &[region(Rect::new(150.0, 150.0, 200.0, 200.0))])
            .unwrap();
        assert!(doc.pages[0].images[0].scrubbed.is_empty());
    }
}
