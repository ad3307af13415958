//! In-memory document engine
//!
//! Pages are positioned text lines plus optional image areas, stored as
//! JSON. Glyphs use a fixed advance of half the font size, so every word has
//! a predictable rectangle. Implements the full [`RedactableDocument`]
//! contract and serves as its reference behaviour in tests.

use image::imageops::{rotate180, rotate270, rotate90};
use image::{DynamicImage, Rgb as Pixel, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::engine::{
    check_page, normalize_rotation, CommitSummary, DocumentEngine, ImagePolicy,
    RedactableDocument, RedactionMark, SaveOptions, SearchOutcome, Word,
};
use crate::error::PdfError;
use crate::geometry::{PageSize, Rect, Rgb};
use crate::layout::TextLayout;

/// Advance of one glyph as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.5;

const IMAGE_SHADE: Pixel<u8> = Pixel([160, 160, 160]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    pub x: f64,
    /// Top edge of the line
    pub y: f64,
    pub font_size: f64,
    pub text: String,
}

impl TextLine {
    fn glyph_rect(&self, index: usize) -> Rect {
        let advance = self.font_size * GLYPH_ADVANCE;
        let x0 = self.x + index as f64 * advance;
        Rect::new(x0, self.y, x0 + advance, self.y + self.font_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArea {
    pub rect: Rect,
    /// Parts of the image whose pixels were blanked by a commit.
    #[serde(default)]
    pub scrubbed: Vec<Rect>,
    /// Encoded in a way commits cannot rewrite; only the overlay hides it.
    #[serde(default)]
    pub unsupported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPage {
    pub width: f64,
    pub height: f64,
    /// Clockwise display rotation
    #[serde(default)]
    pub rotation: u16,
    #[serde(default)]
    pub lines: Vec<TextLine>,
    #[serde(default)]
    pub images: Vec<ImageArea>,
    /// Marks burned in by earlier commits.
    #[serde(default)]
    pub redactions: Vec<RedactionMark>,
    /// Forces the rasteriser to produce an image of this pixel size, as
    /// displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster_size: Option<(u32, u32)>,
    #[serde(skip)]
    pending: Vec<RedactionMark>,
    #[serde(skip)]
    committed: bool,
}

impl MemoryPage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: 0,
            lines: Vec::new(),
            images: Vec::new(),
            redactions: Vec::new(),
            raster_size: None,
            pending: Vec::new(),
            committed: false,
        }
    }

    /// US Letter, 612 x 792 points.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    pub fn line(mut self, x: f64, y: f64, font_size: f64, text: &str) -> Self {
        self.lines.push(TextLine {
            x,
            y,
            font_size,
            text: text.to_string(),
        });
        self
    }

    pub fn image(mut self, rect: Rect) -> Self {
        self.images.push(ImageArea {
            rect,
            scrubbed: Vec::new(),
            unsupported: false,
        });
        self
    }

    /// An image commits cannot rewrite, like a JBIG2 scan.
    pub fn unsupported_image(mut self, rect: Rect) -> Self {
        self.images.push(ImageArea {
            rect,
            scrubbed: Vec::new(),
            unsupported: true,
        });
        self
    }

    pub fn rotate(mut self, degrees: i64) -> Self {
        self.rotation = normalize_rotation(degrees);
        self
    }

    pub fn raster_size(mut self, width: u32, height: u32) -> Self {
        self.raster_size = Some((width, height));
        self
    }

    fn layout(&self) -> TextLayout {
        let mut layout = TextLayout::new();
        for (n, line) in self.lines.iter().enumerate() {
            if n > 0 {
                layout.push('\n', None);
            }
            for (i, ch) in line.text.chars().enumerate() {
                layout.push(ch, Some(line.glyph_rect(i)));
            }
        }
        layout
    }

    fn commit(&mut self, images: ImagePolicy) -> CommitSummary {
        let marks = std::mem::take(&mut self.pending);
        let mut summary = CommitSummary {
            marks: marks.len(),
            ..CommitSummary::default()
        };

        for line in &mut self.lines {
            let blanked: String = line
                .text
                .chars()
                .enumerate()
                .map(|(i, ch)| {
                    let glyph = line.glyph_rect(i);
                    if !ch.is_whitespace() && marks.iter().any(|m| m.rect.intersects(&glyph)) {
                        summary.glyphs_removed += 1;
                        ' '
                    } else {
                        ch
                    }
                })
                .collect();
            line.text = blanked;
        }

        if images == ImagePolicy::Scrub {
            for image in &mut self.images {
                let covered: Vec<Rect> = marks
                    .iter()
                    .filter_map(|m| m.rect.intersection(&image.rect))
                    .collect();
                if covered.is_empty() {
                    continue;
                }
                if image.unsupported {
                    summary.images_unscrubbed += 1;
                } else {
                    image.scrubbed.extend(covered);
                    summary.images_scrubbed += 1;
                }
            }
        }

        self.committed = true;
        self.redactions.extend(marks.iter().copied());
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub pages: Vec<MemoryPage>,
    /// Documents with a password are encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip)]
    unlocked: bool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn page(&self, index: usize) -> Result<&MemoryPage, PdfError> {
        check_page(index, self.pages.len())?;
        if self.password.is_some() && !self.unlocked {
            return Err(PdfError::PasswordRequired);
        }
        Ok(&self.pages[index])
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut MemoryPage, PdfError> {
        self.page(index)?;
        Ok(&mut self.pages[index])
    }

    pub fn from_json(json: &str) -> Result<Self, PdfError> {
        serde_json::from_str(json).map_err(|e| PdfError::Open(e.to_string()))
    }
}

impl RedactableDocument for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }

    fn authenticate(&mut self, password: &str) -> bool {
        self.unlocked = match &self.password {
            Some(expected) => expected == password,
            None => true,
        };
        self.unlocked
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        let p = self.page(page)?;
        Ok(PageSize::new(p.width, p.height))
    }

    fn page_rotation(&self, page: usize) -> Result<u16, PdfError> {
        Ok(self.page(page)?.rotation)
    }

    fn page_text(&self, page: usize) -> Result<String, PdfError> {
        Ok(self.page(page)?.layout().text().to_string())
    }

    fn page_words(&self, page: usize) -> Result<Vec<Word>, PdfError> {
        Ok(self.page(page)?.layout().words())
    }

    fn search_regex(&self, page: usize, pattern: &str) -> Result<SearchOutcome, PdfError> {
        Ok(self.page(page)?.layout().search(pattern))
    }

    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage, PdfError> {
        let p = self.page(page)?;
        let scale = f64::from(dpi) / 72.0;
        let quarter_turn = matches!(p.rotation, 90 | 270);
        // drawn upright, turned to the displayed orientation at the end
        let (width, height) = match p.raster_size {
            Some((w, h)) if quarter_turn => (h, w),
            Some(size) => size,
            None => (
                ((p.width * scale).round() as u32).max(1),
                ((p.height * scale).round() as u32).max(1),
            ),
        };
        let sx = f64::from(width) / p.width;
        let sy = f64::from(height) / p.height;

        let to_pixels = |r: &Rect| -> Option<PixelRect> {
            let w = (r.width() * sx).round() as u32;
            let h = (r.height() * sy).round() as u32;
            (w > 0 && h > 0)
                .then(|| PixelRect::at((r.x0 * sx).round() as i32, (r.y0 * sy).round() as i32).of_size(w, h))
        };

        let mut canvas = RgbImage::from_pixel(width, height, Pixel([255, 255, 255]));
        for image in &p.images {
            if let Some(r) = to_pixels(&image.rect) {
                draw_filled_rect_mut(&mut canvas, r, IMAGE_SHADE);
            }
            for blank in &image.scrubbed {
                if let Some(r) = to_pixels(blank) {
                    draw_filled_rect_mut(&mut canvas, r, Pixel([255, 255, 255]));
                }
            }
        }
        for mark in &p.redactions {
            if let Some(r) = to_pixels(&mark.rect) {
                draw_filled_rect_mut(&mut canvas, r, Pixel(mark.fill.0));
            }
        }

        let displayed = match p.rotation {
            90 => rotate90(&canvas),
            180 => rotate180(&canvas),
            270 => rotate270(&canvas),
            _ => canvas,
        };
        Ok(DynamicImage::ImageRgb8(displayed))
    }

    fn add_redaction_mark(&mut self, page: usize, rect: Rect, fill: Rgb) -> Result<(), PdfError> {
        self.page_mut(page)?.pending.push(RedactionMark { rect, fill });
        Ok(())
    }

    fn pending_marks(&self, page: usize) -> &[RedactionMark] {
        self.pages.get(page).map_or(&[], |p| p.pending.as_slice())
    }

    fn commit_redactions(
        &mut self,
        page: usize,
        images: ImagePolicy,
    ) -> Result<CommitSummary, PdfError> {
        let p = self.page_mut(page)?;
        if p.committed {
            return Err(PdfError::AlreadyCommitted(page));
        }
        Ok(p.commit(images))
    }

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfError> {
        if options.stamp_metadata {
            self.producer = Some(format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ));
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self).map_err(|e| PdfError::Write(e.to_string()))
    }
}

/// Opens JSON-described documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEngine;

impl DocumentEngine for MemoryEngine {
    type Document = MemoryDocument;

    fn open(&self, path: &Path) -> Result<MemoryDocument, PdfError> {
        let file = File::open(path).map_err(|e| PdfError::Open(format!("{}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PdfError::Open(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement() -> MemoryDocument {
        MemoryDocument::new().with_page(
            MemoryPage::letter()
                .line(50.0, 100.0, 12.0, "Account Number: 123456789 Details")
                .image(Rect::new(50.0, 300.0, 250.0, 400.0)),
        )
    }

    #[test]
    fn test_commit_blanks_text_under_mark() {
        let mut doc = statement();
        let SearchOutcome::Hits(hits) = doc.search_regex(0, r"\d{9}").unwrap() else {
            panic!("supported pattern");
        };
        assert_eq!(hits.len(), 1);

        doc.add_redaction_mark(0, hits[0].rect, Rgb::BLACK).unwrap();
        assert_eq!(doc.pending_marks(0).len(), 1);
        let summary = doc.commit_redactions(0, ImagePolicy::Scrub).unwrap();
        assert_eq!(summary.marks, 1);
        assert_eq!(summary.glyphs_removed, 9);

        let text = doc.page_text(0).unwrap();
        assert!(!text.contains("123456789"));
        assert!(text.contains("Details"));
        assert!(doc.pending_marks(0).is_empty());
        assert_eq!(doc.pages[0].redactions.len(), 1);
    }

    #[test]
    fn test_second_commit_is_rejected() {
        let mut doc = statement();
        doc.commit_redactions(0, ImagePolicy::Scrub).unwrap();
        assert!(matches!(
            doc.commit_redactions(0, ImagePolicy::Scrub),
            Err(PdfError::AlreadyCommitted(0))
        ));
    }

    #[test]
    fn test_image_policy() {
        let mark = Rect::new(100.0, 350.0, 300.0, 360.0);

        let mut scrubbed = statement();
        scrubbed.add_redaction_mark(0, mark, Rgb::BLACK).unwrap();
        let summary = scrubbed.commit_redactions(0, ImagePolicy::Scrub).unwrap();
        assert_eq!(summary.images_scrubbed, 1);
        assert_eq!(
            scrubbed.pages[0].images[0].scrubbed,
            vec![Rect::new(100.0, 350.0, 250.0, 360.0)]
        );

        let mut preserved = statement();
        preserved.add_redaction_mark(0, mark, Rgb::BLACK).unwrap();
        let summary = preserved.commit_redactions(0, ImagePolicy::Preserve).unwrap();
        assert_eq!(summary.images_scrubbed, 0);
        assert!(preserved.pages[0].images[0].scrubbed.is_empty());
    }

    #[test]
    fn test_unsupported_image_is_counted_not_scrubbed() {
        let mut doc = MemoryDocument::new().with_page(
            MemoryPage::letter()
                .unsupported_image(Rect::new(50.0, 300.0, 250.0, 400.0))
                .image(Rect::new(50.0, 500.0, 250.0, 600.0)),
        );
        doc.add_redaction_mark(0, Rect::new(100.0, 350.0, 300.0, 360.0), Rgb::BLACK)
            .unwrap();
        let summary = doc.commit_redactions(0, ImagePolicy::Scrub).unwrap();
        assert_eq!(summary.images_unscrubbed, 1);
        assert_eq!(summary.images_scrubbed, 0);
        assert!(doc.pages[0].images[0].scrubbed.is_empty());
    }

    #[test]
    fn test_locked_document() {
        let mut doc = statement().with_password("secret");
        assert!(doc.is_encrypted());
        assert!(matches!(doc.page_text(0), Err(PdfError::PasswordRequired)));
        assert!(!doc.authenticate(""));
        assert!(doc.authenticate("secret"));
        assert!(doc.page_text(0).is_ok());
    }

    #[test]
    fn test_rasterize_covers_page() {
        let doc = statement();
        let image = doc.rasterize(0, 144).unwrap();
        assert_eq!((image.width(), image.height()), (1224, 1584));

        let forced = MemoryDocument::new().with_page(MemoryPage::letter().raster_size(100, 50));
        let image = forced.rasterize(0, 300).unwrap();
        assert_eq!((image.width(), image.height()), (100, 50));
    }

    #[test]
    fn test_rotated_page_renders_as_displayed() {
        let mark = Rect::new(0.0, 0.0, 72.0, 36.0);
        let mut doc = MemoryDocument::new().with_page(MemoryPage::letter().rotate(-270));
        assert_eq!(doc.page_rotation(0).unwrap(), 90);
        doc.add_redaction_mark(0, mark, Rgb::BLACK).unwrap();
        doc.commit_redactions(0, ImagePolicy::Scrub).unwrap();

        let image = doc.rasterize(0, 72).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (792, 612));
        // the page's top-left corner ends up top-right
        assert_eq!(image.get_pixel(791, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(791 - 36, 0).0, [255, 255, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(MemoryPage::letter().rotate(45).rotation, 0);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let mut doc = statement();
        doc.save(&path, &SaveOptions::redacted()).unwrap();

        let reopened = MemoryEngine.open(&path).unwrap();
        assert_eq!(reopened.page_count(), 1);
        assert!(reopened.producer.is_some());
        assert_eq!(reopened.page_text(0).unwrap(), doc.page_text(0).unwrap());
    }

    #[test]
    fn test_out_of_range() {
        let doc = statement();
        assert!(matches!(
            doc.page_size(3),
            Err(PdfError::PageOutOfRange { index: 3, count: 1 })
        ));
    }
}
