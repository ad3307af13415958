//! OCR errors

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR binary unavailable: {0}")]
    Binary(String),

    #[error("OCR process failed: {0}")]
    Process(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreadable OCR output: {0}")]
    Parse(String),

    #[error("image handling failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OcrError::Timeout(_))
    }
}
