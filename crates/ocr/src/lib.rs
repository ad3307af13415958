//! OCR for pagescrub
//!
//! An engine-neutral [`OcrEngine`] trait and a Tesseract CLI implementation
//! returning word boxes in raster pixel space.

mod engine;
mod error;
mod tesseract;
mod types;

pub use engine::OcrEngine;
pub use error::OcrError;
pub use tesseract::{get_tesseract_version, parse_tsv, TesseractEngine};
pub use types::{OcrRequest, OcrWord, PixelBox, TesseractConfig};
