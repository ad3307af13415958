//! Content stream rewriting
//!
//! Walks one content stream while tracking the CTM and text state. Every
//! character code whose glyph box overlaps a mask is cut out of the shown
//! string and replaced by a `TJ` offset of the same advance, so the rest of
//! the line keeps its position. Paths lying wholly inside a mask are
//! dropped; paths that only reach into one are left to the overlay.
//! XObject placements are recorded for the caller. All geometry here is PDF
//! user space (y grows upward).

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

use crate::error::PdfError;
use crate::fonts::{FontMetrics, FontSet};
use crate::geometry::{Rect, Rgb};
use crate::matrix::{multiply, numbers, transform, transform_rect, Bounds, Matrix, IDENTITY};
use crate::objects::get_number;

/// Glyph box extent relative to the baseline, in units of the font size.
const DESCENT: f32 = 0.25;
const ASCENT: f32 = 0.9;

const PATH_CONSTRUCTION: [&str; 7] = ["m", "l", "c", "v", "y", "h", "re"];
const PATH_PAINTING: [&str; 10] = ["S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n"];

/// A region to clear, in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Mask {
    pub rect: Rect,
    pub fill: Rgb,
}

/// Where an XObject was painted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placement {
    pub name: Vec<u8>,
    /// CTM at the `Do`; maps the unit square to user space
    pub matrix: Matrix,
}

impl Placement {
    pub fn bounds(&self) -> Rect {
        transform_rect(&self.matrix, 0.0, 0.0, 1.0, 1.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Rewrite {
    pub operations: Vec<Operation>,
    pub glyphs_removed: usize,
    pub paths_removed: usize,
    pub placements: Vec<Placement>,
}

/// Add a `TJ` offset, folding it into a trailing number.
fn push_offset(items: &mut Vec<Object>, offset: f32) {
    if let Some(last) = items.last_mut() {
        if let Some(n) = get_number(last) {
            *last = Object::Real(n + offset);
            return;
        }
    }
    items.push(Object::Real(offset));
}

#[derive(Debug, Clone, Copy)]
struct TextState<'f> {
    font: &'f FontMetrics,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// Horizontal scaling as a fraction
    scale: f32,
    leading: f32,
    rise: f32,
}

impl<'f> TextState<'f> {
    fn new(font: &'f FontMetrics) -> Self {
        Self {
            font,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Walker<'a> {
    masks: &'a [Mask],
    fonts: &'a FontSet,
    ctm: Matrix,
    text: TextState<'a>,
    stack: Vec<(Matrix, TextState<'a>)>,
    tm: Matrix,
    tlm: Matrix,
    /// Construction operators of the path being built
    path: Vec<Operation>,
    path_bounds: Bounds,
    clipping: bool,
    inline_image: bool,
    out: Rewrite,
}

impl<'a> Walker<'a> {
    fn new(masks: &'a [Mask], fonts: &'a FontSet, ctm: Matrix) -> Self {
        Self {
            masks,
            fonts,
            ctm,
            text: TextState::new(fonts.fallback()),
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            path: Vec::new(),
            path_bounds: Bounds::default(),
            clipping: false,
            inline_image: false,
            out: Rewrite::default(),
        }
    }

    fn hits_mask(&self, rect: &Rect) -> bool {
        self.masks.iter().any(|m| m.rect.intersects(rect))
    }

    fn emit(&mut self, operator: &str, operands: Vec<Object>) {
        self.out.operations.push(Operation::new(operator, operands));
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.tlm);
        self.tm = self.tlm;
    }

    fn advance(&mut self, tx: f32) {
        self.tm = multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.tm);
    }

    /// Show one string, moving the text matrix past it. Returns the `TJ`
    /// items that replace it, or `None` when no code falls under a mask.
    fn show(&mut self, bytes: &[u8], format: StringFormat) -> Option<Vec<Object>> {
        let font = self.text.font;
        let size = self.text.font_size;
        let mut items = Vec::new();
        let mut kept = Vec::new();
        let mut removed = 0;

        for code_bytes in bytes.chunks(font.code_len()) {
            let code = code_bytes
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            let glyph = font.advance(code) * size;
            let mut advance = glyph + self.text.char_spacing;
            if font.code_len() == 1 && code == 32 {
                advance += self.text.word_spacing;
            }

            let to_user = multiply(&self.tm, &self.ctm);
            let rise = self.text.rise;
            let bounds = transform_rect(
                &to_user,
                0.0,
                rise - DESCENT * size,
                glyph * self.text.scale,
                rise + ASCENT * size,
            );

            if size > 0.0 && self.hits_mask(&bounds) {
                if !kept.is_empty() {
                    items.push(Object::String(std::mem::take(&mut kept), format));
                }
                push_offset(&mut items, -advance / size * 1000.0);
                removed += 1;
            } else {
                kept.extend_from_slice(code_bytes);
            }
            self.advance(advance * self.text.scale);
        }

        if removed == 0 {
            return None;
        }
        if !kept.is_empty() {
            items.push(Object::String(kept, format));
        }
        self.out.glyphs_removed += removed;
        Some(items)
    }

    fn show_operand(&mut self, operand: Option<&Object>) -> Option<Vec<Object>> {
        match operand {
            Some(Object::String(bytes, format)) => self.show(bytes, *format),
            _ => None,
        }
    }

    fn show_array(&mut self, items: &[Object]) -> Option<Vec<Object>> {
        let mut rebuilt = Vec::with_capacity(items.len());
        let mut changed = false;
        for item in items {
            match item {
                Object::String(bytes, format) => match self.show(bytes, *format) {
                    Some(parts) => {
                        changed = true;
                        for part in parts {
                            match get_number(&part) {
                                Some(n) => push_offset(&mut rebuilt, n),
                                None => rebuilt.push(part),
                            }
                        }
                    }
                    None => rebuilt.push(item.clone()),
                },
                other => {
                    if let Some(n) = get_number(other) {
                        let tx = -n / 1000.0 * self.text.font_size * self.text.scale;
                        self.advance(tx);
                    }
                    rebuilt.push(other.clone());
                }
            }
        }
        changed.then_some(rebuilt)
    }

    fn extend_path(&mut self, operator: &str, operands: &[Object]) {
        if operator == "re" {
            if let Some([x, y, w, h]) = numbers::<4>(operands) {
                for (px, py) in [(x, y), (x + w, y), (x, y + h), (x + w, y + h)] {
                    let (ux, uy) = transform(&self.ctm, px, py);
                    self.path_bounds.add(ux, uy);
                }
            }
            return;
        }
        for pair in operands.chunks_exact(2) {
            if let (Some(x), Some(y)) = (get_number(&pair[0]), get_number(&pair[1])) {
                let (ux, uy) = transform(&self.ctm, x, y);
                self.path_bounds.add(ux, uy);
            }
        }
    }

    fn reset_path(&mut self) {
        self.path_bounds = Bounds::default();
        self.clipping = false;
    }

    fn flush_path(&mut self) {
        self.out.operations.append(&mut self.path);
        self.reset_path();
    }

    /// Paint or drop the pending path. A clipping path is always kept.
    fn finish_path(&mut self, paint: Operation) {
        let inside = !self.clipping
            && paint.operator != "n"
            && self
                .path_bounds
                .rect()
                .is_some_and(|b| self.masks.iter().any(|m| m.rect.contains(&b)));
        if inside {
            self.path.clear();
            self.out.paths_removed += 1;
            self.reset_path();
        } else {
            self.flush_path();
            self.out.operations.push(paint);
        }
    }

    fn visit(&mut self, op: Operation) {
        let name = op.operator.as_str();
        if PATH_CONSTRUCTION.contains(&name) {
            self.extend_path(name, &op.operands);
            self.path.push(op);
            return;
        }
        if !self.path.is_empty() {
            if name == "W" || name == "W*" {
                self.clipping = true;
                self.path.push(op);
                return;
            }
            if PATH_PAINTING.contains(&name) {
                self.finish_path(op);
                return;
            }
            self.flush_path();
        }

        let Operation { operator, mut operands } = op;
        match operator.as_str() {
            "q" => self.stack.push((self.ctm, self.text)),
            "Q" => {
                if let Some((ctm, text)) = self.stack.pop() {
                    self.ctm = ctm;
                    self.text = text;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(&operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(&operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(&operands) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(&operands) {
                    self.text.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "T*" => self.next_line(0.0, -self.text.leading),
            "TL" => {
                if let Some([leading]) = numbers::<1>(&operands) {
                    self.text.leading = leading;
                }
            }
            "Tc" => {
                if let Some([spacing]) = numbers::<1>(&operands) {
                    self.text.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some([spacing]) = numbers::<1>(&operands) {
                    self.text.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let Some([scale]) = numbers::<1>(&operands) {
                    self.text.scale = scale / 100.0;
                }
            }
            "Ts" => {
                if let Some([rise]) = numbers::<1>(&operands) {
                    self.text.rise = rise;
                }
            }
            "Tf" => {
                if let Some(Object::Name(font)) = operands.first() {
                    self.text.font = self.fonts.get(font);
                }
                if let Some(size) = operands.get(1).and_then(get_number) {
                    self.text.font_size = size.abs();
                }
            }
            "Tj" => {
                if let Some(items) = self.show_operand(operands.first()) {
                    self.emit("TJ", vec![Object::Array(items)]);
                    return;
                }
            }
            "'" => {
                self.next_line(0.0, -self.text.leading);
                if let Some(items) = self.show_operand(operands.first()) {
                    self.emit("T*", vec![]);
                    self.emit("TJ", vec![Object::Array(items)]);
                    return;
                }
            }
            "\"" => {
                if let Some([aw, ac]) = numbers::<2>(&operands) {
                    self.text.word_spacing = aw;
                    self.text.char_spacing = ac;
                }
                self.next_line(0.0, -self.text.leading);
                if let Some(items) = self.show_operand(operands.get(2)) {
                    self.emit("Tw", vec![operands[0].clone()]);
                    self.emit("Tc", vec![operands[1].clone()]);
                    self.emit("T*", vec![]);
                    self.emit("TJ", vec![Object::Array(items)]);
                    return;
                }
            }
            "TJ" => {
                let rebuilt = match operands.first() {
                    Some(Object::Array(items)) => self.show_array(items),
                    _ => None,
                };
                if let Some(rebuilt) = rebuilt {
                    operands = vec![Object::Array(rebuilt)];
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.out.placements.push(Placement {
                        name: name.clone(),
                        matrix: self.ctm,
                    });
                }
            }
            "BI" => self.inline_image = true,
            _ => {}
        }

        self.out.operations.push(Operation::new(&operator, operands));
    }
}

/// Strip the text and paths under `masks` from one content stream. `ctm` is
/// the transformation in force when the stream starts and `fonts` the fonts
/// its resources name.
pub(crate) fn rewrite_content(
    data: &[u8],
    masks: &[Mask],
    fonts: &FontSet,
    ctm: Matrix,
) -> Result<Rewrite, PdfError> {
    let content = Content::decode(data).map_err(|e| PdfError::Content(e.to_string()))?;
    let mut walker = Walker::new(masks, fonts, ctm);
    for op in content.operations {
        walker.visit(op);
    }
    walker.flush_path();

    // The content parser stops at inline image data, so whatever follows
    // the image is missing from `operations`.
    if walker.inline_image {
        return Err(PdfError::Content(
            "inline image (BI ... EI) in content stream cannot be rewritten".to_string(),
        ));
    }
    Ok(walker.out)
}

/// Isolate the original operators in their own graphics state and paint an
/// opaque rectangle for every mask on top.
pub(crate) fn append_overlay(operations: Vec<Operation>, masks: &[Mask]) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len() + masks.len() * 5 + 2);
    out.push(Operation::new("q", vec![]));
    out.extend(operations);
    out.push(Operation::new("Q", vec![]));

    for mask in masks {
        let [r, g, b] = mask.fill.unit();
        let rect = mask.rect;
        out.push(Operation::new("q", vec![]));
        out.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        out.push(Operation::new(
            "re",
            vec![
                (rect.x0 as f32).into(),
                (rect.y0 as f32).into(),
                (rect.width() as f32).into(),
                (rect.height() as f32).into(),
            ],
        ));
        out.push(Operation::new("f", vec![]));
        out.push(Operation::new("Q", vec![]));
    }
    out
}

pub(crate) fn encode(operations: Vec<Operation>) -> Result<Vec<u8>, PdfError> {
    Content { operations }
        .encode()
        .map_err(|e| PdfError::Content(e.to_string()))
}
