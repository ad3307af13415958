//! OCR pass for scanned pages
//!
//! Rasterise, recognise, drop weak tokens, turn pixel boxes back to the
//! upright page and scale them into page space, then match each pattern
//! case-insensitively inside each token.

use pagescrub_ocr::{OcrEngine, PixelBox};
use pagescrub_pdf::{PageSize, RedactableDocument, Rect};
use pagescrub_rules::PatternSet;
use std::time::Instant;

use crate::config::OcrSettings;
use crate::error::{CoreError, Result};
use crate::model::{Confidence, Match, Provenance};
use crate::report::OcrStatus;

/// A recognised word, already in page space.
#[derive(Clone)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f32,
    pub rect: Rect,
}

pub struct OcrPass {
    pub status: OcrStatus,
    pub matches: Vec<Match>,
}

/// Scale a pixel box of a `raster` that covers the full page onto `page`.
pub fn remap(bbox: &PixelBox, raster: (u32, u32), page: PageSize) -> Rect {
    let sx = page.width / f64::from(raster.0);
    let sy = page.height / f64::from(raster.1);
    Rect::new(
        f64::from(bbox.left) * sx,
        f64::from(bbox.top) * sy,
        f64::from(bbox.left + bbox.width) * sx,
        f64::from(bbox.top + bbox.height) * sy,
    )
}

/// Raster size of the upright page behind a raster displayed with
/// `rotation`.
fn upright_size(displayed: (u32, u32), rotation: u16) -> (u32, u32) {
    match rotation {
        90 | 270 => (displayed.1, displayed.0),
        _ => displayed,
    }
}

/// Map a box from a raster displayed with clockwise `rotation` onto the
/// upright raster.
pub fn unrotate(bbox: &PixelBox, displayed: (u32, u32), rotation: u16) -> PixelBox {
    let (w, h) = displayed;
    let right = bbox.left + bbox.width;
    let bottom = bbox.top + bbox.height;
    match rotation {
        90 => PixelBox::new(bbox.top, w.saturating_sub(right), bbox.height, bbox.width),
        180 => PixelBox::new(
            w.saturating_sub(right),
            h.saturating_sub(bottom),
            bbox.width,
            bbox.height,
        ),
        270 => PixelBox::new(h.saturating_sub(bottom), bbox.left, bbox.height, bbox.width),
        _ => *bbox,
    }
}

fn check_geometry(page: usize, size: PageSize, raster: (u32, u32), tolerance: f64) -> Result<()> {
    let page_aspect = size.aspect_ratio();
    let raster_aspect = f64::from(raster.0) / f64::from(raster.1);
    if (raster_aspect / page_aspect - 1.0).abs() > tolerance {
        return Err(CoreError::RasterGeometry {
            page,
            raster_width: raster.0,
            raster_height: raster.1,
            raster_aspect,
            page_aspect,
        });
    }
    Ok(())
}

/// Run OCR over one page and match `patterns` against the tokens.
///
/// Rendering and recognition failures are reported through
/// [`OcrStatus`] and yield no matches. A raster whose aspect ratio differs
/// from the page's is an error: every box would land in the wrong place.
pub fn recognize_page<D: RedactableDocument + ?Sized>(
    doc: &D,
    page: usize,
    engine: &mut dyn OcrEngine,
    patterns: &PatternSet,
    settings: &OcrSettings,
) -> Result<OcrPass> {
    let size = doc.page_size(page)?;
    let rotation = doc.page_rotation(page)?;
    let image = match doc.rasterize(page, settings.dpi) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("[Ocr] page {}: render failed, skipping OCR: {}", page, e);
            return Ok(OcrPass {
                status: OcrStatus::Failed {
                    reason: e.to_string(),
                },
                matches: Vec::new(),
            });
        }
    };
    let displayed = (image.width(), image.height());
    let raster = upright_size(displayed, rotation);
    if raster.0 == 0 || raster.1 == 0 {
        return Err(CoreError::RasterGeometry {
            page,
            raster_width: raster.0,
            raster_height: raster.1,
            raster_aspect: 0.0,
            page_aspect: size.aspect_ratio(),
        });
    }
    check_geometry(page, size, raster, settings.aspect_tolerance)?;
    if rotation != 0 {
        log::debug!("[Ocr] page {}: displayed at {} degrees, boxes turned back upright", page, rotation);
    }

    let start = Instant::now();
    let words = match engine.recognize(&image, &settings.request()) {
        Ok(words) => words,
        Err(e) => {
            let status = if e.is_timeout() {
                OcrStatus::TimedOut
            } else {
                OcrStatus::Failed {
                    reason: e.to_string(),
                }
            };
            log::warn!("[Ocr] page {}: {} failed, treating as no tokens: {}", page, engine.name(), e);
            return Ok(OcrPass {
                status,
                matches: Vec::new(),
            });
        }
    };

    let recognised = words.len();
    let tokens: Vec<OcrToken> = words
        .into_iter()
        .filter(|w| w.confidence >= settings.min_confidence)
        .filter_map(|w| {
            let text = w.text.trim();
            (!text.is_empty()).then(|| OcrToken {
                text: text.to_string(),
                confidence: w.confidence,
                rect: remap(&unrotate(&w.bbox, displayed, rotation), raster, size),
            })
        })
        .collect();

    log::info!(
        "[Ocr] page {}: {} word(s) recognised, {} kept, {} ms",
        page,
        recognised,
        tokens.len(),
        start.elapsed().as_millis()
    );

    let mut matches = Vec::new();
    for (pattern_index, rule) in patterns.iter().enumerate() {
        for token in &tokens {
            if rule.matches_loosely(&token.text) {
                matches.push(Match {
                    text: token.text.clone(),
                    rect: token.rect,
                    provenance: Provenance::Ocr,
                    confidence: Confidence::Score(token.confidence),
                    pattern_index,
                });
            }
        }
    }

    Ok(OcrPass {
        status: OcrStatus::Completed {
            tokens: tokens.len(),
        },
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &Rect, b: &Rect) -> bool {
        let eps = 1e-9;
        (a.x0 - b.x0).abs() < eps
            && (a.y0 - b.y0).abs() < eps
            && (a.x1 - b.x1).abs() < eps
            && (a.y1 - b.y1).abs() < eps
    }

    #[test]
    fn test_full_raster_maps_to_full_page() {
        let page = PageSize::new(612.0, 792.0);
        let rect = remap(&PixelBox::new(0, 0, 2550, 3300), (2550, 3300), page);
        assert!(approx(&rect, &page.rect()));

        let odd = PageSize::new(595.3, 841.9);
        let rect = remap(&PixelBox::new(0, 0, 2481, 3508), (2481, 3508), odd);
        assert!(approx(&rect, &odd.rect()));
    }

    #[test]
    fn test_remap_scales_each_axis() {
        let rect = remap(
            &PixelBox::new(1000, 1500, 400, 50),
            (2550, 3300),
            PageSize::new(612.0, 792.0),
        );
        assert!(approx(&rect, &Rect::new(240.0, 360.0, 336.0, 372.0)));
    }

    #[test]
    fn test_unrotate_each_quarter_turn() {
        // a 54 x 12 box at (50, 100) on an upright 612 x 792 raster
        let upright = PixelBox::new(50, 100, 54, 12);
        assert_eq!(unrotate(&upright, (612, 792), 0), upright);
        assert_eq!(unrotate(&PixelBox::new(680, 50, 12, 54), (792, 612), 90), upright);
        assert_eq!(unrotate(&PixelBox::new(508, 680, 54, 12), (612, 792), 180), upright);
        assert_eq!(unrotate(&PixelBox::new(100, 508, 12, 54), (792, 612), 270), upright);
    }

    #[test]
    fn test_upright_size() {
        assert_eq!(upright_size((3300, 2550), 90), (2550, 3300));
        assert_eq!(upright_size((3300, 2550), 270), (2550, 3300));
        assert_eq!(upright_size((2550, 3300), 180), (2550, 3300));
    }

    #[test]
    fn test_geometry_check() {
        let letter = PageSize::new(612.0, 792.0);
        assert!(check_geometry(0, letter, (2550, 3300), 0.01).is_ok());
        assert!(check_geometry(0, letter, (2551, 3300), 0.01).is_ok());
        assert!(matches!(
            check_geometry(2, letter, (3300, 2550), 0.01),
            Err(CoreError::RasterGeometry { page: 2, .. })
        ));
    }
}
