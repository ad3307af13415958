//! Document engines for pagescrub
//!
//! The [`RedactableDocument`] contract, page geometry, the shared text
//! layout, a pdfium + lopdf implementation for real PDF files and an
//! in-memory implementation.

mod commit;
mod content;
mod engine;
mod error;
mod fonts;
mod geometry;
mod layout;
mod matrix;
mod memory;
mod metadata;
mod objects;
mod pdfium;
mod scrub;

pub use engine::{
    CommitSummary, DocumentEngine, ImagePolicy, RedactableDocument, RedactionMark, SaveOptions,
    SearchOutcome, TextHit, Word,
};
pub use error::PdfError;
pub use geometry::{PageSize, Rect, Rgb};
pub use layout::TextLayout;
pub use memory::{ImageArea, MemoryDocument, MemoryEngine, MemoryPage, TextLine};
pub use pdfium::{bind_pdfium, PdfiumDocument, PdfiumEngine};
