//! Page commit on a lopdf document
//!
//! Rewrites the page content and every form XObject it paints over a mask,
//! scrubs the image XObjects under masks, then stacks the overlay on top.
//! A changed XObject is written as a new object and re-pointed from the
//! resource dictionary that names it, so other pages sharing the original
//! keep it.

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::content::{append_overlay, encode, rewrite_content, Mask};
use crate::engine::{CommitSummary, ImagePolicy};
use crate::error::PdfError;
use crate::fonts::FontSet;
use crate::matrix::{matrix_from, multiply, numbers, transform_rect, Matrix, IDENTITY};
use crate::objects::{
    entry, entry_dict, page_content, page_resources, replace_content, set_page_resources,
    stream_content,
};
use crate::scrub::{scrub_image, ImageScrub};

const MAX_FORM_DEPTH: usize = 16;

struct Pass<'a> {
    masks: &'a [Mask],
    images: ImagePolicy,
    summary: CommitSummary,
}

impl Pass<'_> {
    /// Rewrite one content stream and the XObjects it paints. Replacements
    /// are re-pointed in `resources`; the flag tells whether any were made.
    fn rewrite_stream(
        &mut self,
        doc: &mut Document,
        data: &[u8],
        resources: &mut Dictionary,
        ctm: Matrix,
        depth: usize,
    ) -> Result<(Vec<Operation>, bool), PdfError> {
        let fonts = FontSet::from_resources(doc, resources);
        let rewrite = rewrite_content(data, self.masks, &fonts, ctm)?;
        self.summary.glyphs_removed += rewrite.glyphs_removed;
        self.summary.paths_removed += rewrite.paths_removed;

        let Some(mut xobjects) = entry_dict(doc, resources, b"XObject").cloned() else {
            return Ok((rewrite.operations, false));
        };
        let mut changed = false;
        for placement in &rewrite.placements {
            let id = match xobjects.get(&placement.name) {
                Ok(Object::Reference(id)) => *id,
                _ => continue,
            };
            if let Some(new_id) = self.rewrite_xobject(doc, id, &placement.matrix, resources, depth)? {
                xobjects.set(placement.name.clone(), Object::Reference(new_id));
                changed = true;
            }
        }
        if changed {
            resources.set("XObject", Object::Dictionary(xobjects));
        }
        Ok((rewrite.operations, changed))
    }

    fn rewrite_xobject(
        &mut self,
        doc: &mut Document,
        id: ObjectId,
        matrix: &Matrix,
        parent: &Dictionary,
        depth: usize,
    ) -> Result<Option<ObjectId>, PdfError> {
        let stream = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => stream.clone(),
            _ => return Ok(None),
        };
        match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
            Ok(b"Image") if self.images == ImagePolicy::Scrub => {
                match scrub_image(doc, &stream, matrix, self.masks)? {
                    ImageScrub::Untouched => Ok(None),
                    ImageScrub::Scrubbed(rewritten) => {
                        self.summary.images_scrubbed += 1;
                        Ok(Some(doc.add_object(rewritten)))
                    }
                    ImageScrub::Unsupported(reason) => {
                        log::warn!(
                            "[Scrub] image {:?} left in place ({}), only the overlay hides it",
                            id,
                            reason
                        );
                        self.summary.images_unscrubbed += 1;
                        Ok(None)
                    }
                }
            }
            Ok(b"Form") => self.rewrite_form(doc, id, stream, matrix, parent, depth + 1),
            _ => Ok(None),
        }
    }

    fn rewrite_form(
        &mut self,
        doc: &mut Document,
        id: ObjectId,
        form: Stream,
        matrix: &Matrix,
        parent: &Dictionary,
        depth: usize,
    ) -> Result<Option<ObjectId>, PdfError> {
        let ctm = multiply(&matrix_from(form.dict.get(b"Matrix").ok()), matrix);
        if let Some(Object::Array(bbox)) = entry(doc, &form.dict, b"BBox") {
            if let Some([x0, y0, x1, y1]) = numbers::<4>(bbox) {
                let bounds = transform_rect(&ctm, x0, y0, x1, y1);
                if !self.masks.iter().any(|m| m.rect.intersects(&bounds)) {
                    return Ok(None);
                }
            }
        }
        if depth > MAX_FORM_DEPTH {
            return Err(PdfError::Content(format!(
                "form XObjects nested deeper than {}",
                MAX_FORM_DEPTH
            )));
        }

        let own = entry_dict(doc, &form.dict, b"Resources").cloned();
        let mut resources = own.clone().unwrap_or_else(|| parent.clone());
        let data = stream_content(&form);
        let before = self.summary;
        let (operations, resources_changed) =
            self.rewrite_stream(doc, &data, &mut resources, ctm, depth)?;
        let touched = resources_changed
            || self.summary.glyphs_removed != before.glyphs_removed
            || self.summary.paths_removed != before.paths_removed;
        if !touched {
            return Ok(None);
        }

        let mut dict = form.dict.clone();
        if own.is_some() || resources_changed {
            dict.set("Resources", Object::Dictionary(resources));
        }
        let mut rewritten = Stream::new(dict, Vec::new());
        rewritten.set_plain_content(encode(operations)?);
        if let Err(e) = rewritten.compress() {
            log::debug!("[Commit] leaving form uncompressed: {}", e);
        }
        log::debug!("[Commit] form {:?} rewritten at depth {}", id, depth);
        Ok(Some(doc.add_object(rewritten)))
    }
}

/// Burn `masks` (user space) into one page.
pub(crate) fn commit_page(
    doc: &mut Document,
    page_id: ObjectId,
    masks: &[Mask],
    images: ImagePolicy,
) -> Result<CommitSummary, PdfError> {
    let mut pass = Pass {
        masks,
        images,
        summary: CommitSummary {
            marks: masks.len(),
            ..CommitSummary::default()
        },
    };

    let mut resources = page_resources(doc, page_id);
    let data = page_content(doc, page_id)?;
    let (operations, resources_changed) =
        pass.rewrite_stream(doc, &data, &mut resources, IDENTITY, 0)?;
    if resources_changed {
        set_page_resources(doc, page_id, resources)?;
    }

    let content = encode(append_overlay(operations, masks))?;
    replace_content(doc, page_id, content)?;
    Ok(pass.summary)
}
