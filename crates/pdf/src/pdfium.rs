//! Pdfium + lopdf engine
//!
//! pdfium reads: text with per-glyph bounds, and rasterisation. lopdf
//! writes: committing a page rewrites its content streams in place. pdfium
//! keeps one parsed copy of the document and re-reads the serialised writer
//! only when a page committed since the last read is looked at again.

use image::DynamicImage;
use lopdf::{Document, ObjectId};
use pdfium_render::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::commit::commit_page;
use crate::content::Mask;
use crate::engine::{
    check_page, CommitSummary, DocumentEngine, ImagePolicy, RedactableDocument, RedactionMark,
    SaveOptions, SearchOutcome, Word,
};
use crate::error::PdfError;
use crate::geometry::{PageSize, Rect, Rgb};
use crate::layout::TextLayout;
use crate::metadata::stamp_redaction;
use crate::objects::{page_box, page_rotation};

fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            paths.push(dir.join("libs"));
            paths.push(dir.to_path_buf());
        }
    }
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

/// Bind the pdfium shared library: the explicit path (file or directory),
/// the executable directory and its `libs/`, the working directory, then
/// the system library.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, PdfError> {
    for path in search_paths(explicit) {
        let lib = if path.is_file() {
            path.clone()
        } else {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        };
        log::debug!("[Pdfium] trying {:?}", lib);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
            log::info!("[Pdfium] loaded from {:?}", lib);
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::Library(e.to_string()))
}

fn is_password_error(e: &PdfiumError) -> bool {
    matches!(
        e,
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError)
    )
}

pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
}

impl PdfiumEngine {
    /// Binds the library once; the bindings live for the rest of the process.
    pub fn new(library: Option<&Path>) -> Result<Self, PdfError> {
        Ok(Self {
            pdfium: Box::leak(Box::new(bind_pdfium(library)?)),
        })
    }
}

impl DocumentEngine for PdfiumEngine {
    type Document = PdfiumDocument;

    fn open(&self, path: &Path) -> Result<PdfiumDocument, PdfError> {
        let bytes = fs::read(path).map_err(|e| PdfError::Open(format!("{}: {}", path.display(), e)))?;
        PdfiumDocument::from_bytes(self.pdfium, bytes)
    }
}

pub struct PdfiumDocument {
    pdfium: &'static Pdfium,
    /// File contents as opened
    original: Vec<u8>,
    encrypted: bool,
    unlocked: bool,
    page_count: usize,
    writer: RefCell<Option<Document>>,
    page_ids: Vec<ObjectId>,
    /// Visible page boxes in user space
    boxes: Vec<Rect>,
    rotations: Vec<u16>,
    pending: BTreeMap<usize, Vec<RedactionMark>>,
    committed: BTreeSet<usize>,
    /// pdfium's parsed view; `None` until unlocked
    reader: RefCell<Option<PdfDocument<'static>>>,
    /// Committed pages the reader has not seen yet
    stale: RefCell<BTreeSet<usize>>,
    layouts: RefCell<HashMap<usize, Rc<TextLayout>>>,
}

impl PdfiumDocument {
    pub fn from_bytes(pdfium: &'static Pdfium, bytes: Vec<u8>) -> Result<Self, PdfError> {
        let (reader, locked) = match pdfium.load_pdf_from_byte_vec(bytes.clone(), None) {
            Ok(reader) => (Some(reader), false),
            Err(e) if is_password_error(&e) => (None, true),
            Err(e) => return Err(PdfError::Open(e.to_string())),
        };

        let writer = match Document::load_mem(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) if locked => {
                log::debug!("[Pdfium] lopdf deferred until unlocked: {}", e);
                None
            }
            Err(e) => return Err(PdfError::Open(e.to_string())),
        };
        let encrypted = locked || writer.as_ref().is_some_and(|w| w.is_encrypted());

        let mut doc = Self {
            pdfium,
            original: bytes,
            encrypted,
            unlocked: !encrypted,
            page_count: 0,
            writer: RefCell::new(writer),
            page_ids: Vec::new(),
            boxes: Vec::new(),
            rotations: Vec::new(),
            pending: BTreeMap::new(),
            committed: BTreeSet::new(),
            reader: RefCell::new(reader),
            stale: RefCell::new(BTreeSet::new()),
            layouts: RefCell::new(HashMap::new()),
        };
        if doc.unlocked {
            doc.index_pages()?;
        }
        Ok(doc)
    }

    /// Run `f` against pdfium's view of the document, re-reading the
    /// writer first when `page` was committed since the last read.
    fn with_reader<T>(
        &self,
        page: usize,
        f: impl FnOnce(&PdfDocument<'static>) -> Result<T, PdfError>,
    ) -> Result<T, PdfError> {
        if !self.unlocked {
            return Err(PdfError::PasswordRequired);
        }
        if self.stale.borrow().contains(&page) {
            self.refresh()?;
        }
        let reader = self.reader.borrow();
        let doc = reader.as_ref().ok_or(PdfError::PasswordRequired)?;
        f(doc)
    }

    /// Re-serialise the writer so pdfium reads every committed page.
    fn refresh(&self) -> Result<(), PdfError> {
        let mut bytes = Vec::new();
        {
            let mut writer = self.writer.borrow_mut();
            let Some(writer) = writer.as_mut() else {
                return Ok(());
            };
            writer
                .save_to(&mut bytes)
                .map_err(|e| PdfError::Write(e.to_string()))?;
        }
        let reader = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| PdfError::Open(e.to_string()))?;
        *self.reader.borrow_mut() = Some(reader);

        let stale = std::mem::take(&mut *self.stale.borrow_mut());
        let mut layouts = self.layouts.borrow_mut();
        for page in &stale {
            layouts.remove(page);
        }
        log::debug!("[Pdfium] re-read document after commits to page(s) {:?}", stale);
        Ok(())
    }

    fn index_pages(&mut self) -> Result<(), PdfError> {
        let count = {
            let reader = self.reader.borrow();
            let doc = reader.as_ref().ok_or(PdfError::PasswordRequired)?;
            doc.pages().len() as usize
        };
        self.page_count = count;
        if let Some(writer) = self.writer.get_mut().as_ref() {
            self.page_ids = writer.page_iter().collect();
            self.boxes = self.page_ids.iter().map(|id| page_box(writer, *id)).collect();
            self.rotations = self.page_ids.iter().map(|id| page_rotation(writer, *id)).collect();
        }
        let rotated = self.rotations.iter().filter(|r| **r != 0).count();
        log::debug!("[Pdfium] {} page(s), {} rotated", count, rotated);
        Ok(())
    }

    fn page_box(&self, index: usize) -> Result<Rect, PdfError> {
        check_page(index, self.page_count)?;
        if let Some(b) = self.boxes.get(index) {
            return Ok(*b);
        }
        self.with_reader(index, |doc| {
            let page = doc
                .pages()
                .get(index as u16)
                .map_err(|e| PdfError::Open(e.to_string()))?;
            Ok(Rect::new(0.0, 0.0, page.width().value as f64, page.height().value as f64))
        })
    }

    fn layout(&self, index: usize) -> Result<Rc<TextLayout>, PdfError> {
        let fresh = !self.stale.borrow().contains(&index);
        if fresh {
            if let Some(layout) = self.layouts.borrow().get(&index) {
                return Ok(layout.clone());
            }
        }

        let pbox = self.page_box(index)?;
        let layout = self.with_reader(index, |doc| {
            let page = doc
                .pages()
                .get(index as u16)
                .map_err(|e| PdfError::Open(e.to_string()))?;
            let text = page.text().map_err(|e| PdfError::Open(e.to_string()))?;

            let mut layout = TextLayout::new();
            for ch in text.chars().iter() {
                let Some(c) = ch.unicode_char() else { continue };
                let rect = ch.loose_bounds().ok().map(|b| {
                    let user = Rect::new(
                        b.left().value as f64,
                        b.bottom().value as f64,
                        b.right().value as f64,
                        b.top().value as f64,
                    );
                    Rect::from_user_space(&user, &pbox)
                });
                layout.push(c, rect);
            }
            Ok(layout)
        })?;

        let layout = Rc::new(layout);
        self.layouts.borrow_mut().insert(index, layout.clone());
        Ok(layout)
    }
}

impl RedactableDocument for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn authenticate(&mut self, password: &str) -> bool {
        if !self.encrypted {
            return true;
        }
        let reader = match self
            .pdfium
            .load_pdf_from_byte_vec(self.original.clone(), Some(password))
        {
            Ok(reader) => reader,
            Err(e) => {
                log::debug!("[Pdfium] authentication rejected: {}", e);
                return false;
            }
        };

        let writer = self.writer.get_mut();
        if writer.is_none() {
            match Document::load_mem(&self.original) {
                Ok(doc) => *writer = Some(doc),
                Err(e) => {
                    log::warn!("[Pdfium] cannot parse unlocked document for writing: {}", e);
                    return false;
                }
            }
        }
        if let Some(writer) = writer.as_mut() {
            if writer.is_encrypted() {
                if let Err(e) = writer.decrypt(password) {
                    log::warn!("[Pdfium] decrypt for writing failed: {}", e);
                    return false;
                }
            }
        }

        *self.reader.get_mut() = Some(reader);
        self.unlocked = true;
        match self.index_pages() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Pdfium] unlocked document unreadable: {}", e);
                self.unlocked = false;
                false
            }
        }
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        let b = self.page_box(page)?;
        Ok(PageSize::new(b.width(), b.height()))
    }

    fn page_rotation(&self, page: usize) -> Result<u16, PdfError> {
        check_page(page, self.page_count)?;
        Ok(self.rotations.get(page).copied().unwrap_or(0))
    }

    fn page_text(&self, page: usize) -> Result<String, PdfError> {
        check_page(page, self.page_count)?;
        Ok(self.layout(page)?.text().to_string())
    }

    fn page_words(&self, page: usize) -> Result<Vec<Word>, PdfError> {
        check_page(page, self.page_count)?;
        Ok(self.layout(page)?.words())
    }

    fn search_regex(&self, page: usize, pattern: &str) -> Result<SearchOutcome, PdfError> {
        check_page(page, self.page_count)?;
        Ok(self.layout(page)?.search(pattern))
    }

    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage, PdfError> {
        check_page(page, self.page_count)?;
        let scale = dpi as f32 / 72.0;
        self.with_reader(page, |doc| {
            let pdf_page = doc
                .pages()
                .get(page as u16)
                .map_err(|e| PdfError::Render(e.to_string()))?;
            // pdfium sizes the bitmap from the displayed page, so rotation and
            // aspect come from the document itself
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| PdfError::Render(e.to_string()))?;
            log::debug!(
                "[Pdfium] rendered page {} at {}x{} px ({} dpi)",
                page,
                bitmap.width(),
                bitmap.height(),
                dpi
            );
            Ok(bitmap.as_image())
        })
    }

    fn add_redaction_mark(&mut self, page: usize, rect: Rect, fill: Rgb) -> Result<(), PdfError> {
        check_page(page, self.page_count)?;
        if self.committed.contains(&page) {
            return Err(PdfError::AlreadyCommitted(page));
        }
        self.pending
            .entry(page)
            .or_default()
            .push(RedactionMark { rect, fill });
        Ok(())
    }

    fn pending_marks(&self, page: usize) -> &[RedactionMark] {
        self.pending.get(&page).map_or(&[], |marks| marks.as_slice())
    }

    fn commit_redactions(
        &mut self,
        page: usize,
        images: ImagePolicy,
    ) -> Result<CommitSummary, PdfError> {
        check_page(page, self.page_count)?;
        if self.committed.contains(&page) {
            return Err(PdfError::AlreadyCommitted(page));
        }
        let pbox = self.page_box(page)?;
        let page_id = *self.page_ids.get(page).ok_or(PdfError::PasswordRequired)?;
        let writer = self.writer.get_mut().as_mut().ok_or(PdfError::PasswordRequired)?;

        let marks = self.pending.remove(&page).unwrap_or_default();
        self.committed.insert(page);
        if marks.is_empty() {
            return Ok(CommitSummary::default());
        }

        let masks: Vec<Mask> = marks
            .iter()
            .map(|m| Mask {
                rect: m.rect.to_user_space(&pbox),
                fill: m.fill,
            })
            .collect();
        let summary = commit_page(writer, page_id, &masks, images)?;

        log::info!(
            "[Commit] page {}: {} mark(s), {} glyph(s) and {} path(s) removed, {} image(s) scrubbed, {} left under the overlay",
            page,
            summary.marks,
            summary.glyphs_removed,
            summary.paths_removed,
            summary.images_scrubbed,
            summary.images_unscrubbed
        );

        self.stale.get_mut().insert(page);
        Ok(summary)
    }

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfError> {
        if self.committed.is_empty() && *options == SaveOptions::copy() {
            fs::write(path, &self.original)?;
            return Ok(());
        }

        let writer = self.writer.get_mut().as_mut().ok_or(PdfError::PasswordRequired)?;
        if options.stamp_metadata {
            stamp_redaction(writer)?;
        }
        if options.prune_unused {
            let pruned = writer.prune_objects();
            log::debug!("[Pdfium] pruned {} unreachable object(s)", pruned.len());
        }
        if options.compress {
            writer.compress();
        }

        let mut file = fs::File::create(path)?;
        writer
            .save_to(&mut file)
            .map_err(|e| PdfError::Write(e.to_string()))?;
        log::info!("[Pdfium] saved {}", path.display());
        Ok(())
    }
}
