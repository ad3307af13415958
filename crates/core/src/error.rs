use pagescrub_pdf::PdfError;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: PdfError,
    },

    #[error("document is encrypted and does not open with an empty password")]
    UnsupportedEncryption,

    #[error(
        "page {page}: raster {raster_width}x{raster_height} px does not match the page aspect ratio \
         ({raster_aspect:.4} vs {page_aspect:.4}), OCR boxes would be misplaced"
    )]
    RasterGeometry {
        page: usize,
        raster_width: u32,
        raster_height: u32,
        raster_aspect: f64,
        page_aspect: f64,
    },

    #[error("document engine: {0}")]
    Engine(#[from] PdfError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no redaction patterns available")]
    NoPatterns,
}
