//! OCR engine abstraction

use image::DynamicImage;

use crate::error::OcrError;
use crate::types::{OcrRequest, OcrWord};

/// Recognises words in a raster image.
pub trait OcrEngine: Send {
    /// Short identifier for logs and reports
    fn name(&self) -> &str;

    /// Words with boxes in the pixel space of `image`.
    fn recognize(
        &mut self,
        image: &DynamicImage,
        request: &OcrRequest,
    ) -> Result<Vec<OcrWord>, OcrError>;
}
