//! The three detection strategies

mod direct;
mod fallback;
mod ocr;

pub use direct::{match_direct, DirectOutcome};
pub use fallback::match_tokens;
pub use ocr::{recognize_page, remap, unrotate, OcrPass, OcrToken};
