//! Document engine errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("cannot open document: {0}")]
    Open(String),

    #[error("document is locked, authenticate first")]
    PasswordRequired,

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("redactions on page {0} were already committed")]
    AlreadyCommitted(usize),

    #[error("pdfium unavailable: {0}")]
    Library(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("content rewrite failed: {0}")]
    Content(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
