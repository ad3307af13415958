//! OCR data types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Word box in raster pixel space, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBox {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// One recognised word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// 0-100
    pub confidence: f32,
    pub bbox: PixelBox,
}

/// Per-call recognition parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    pub language: String,
    /// The engine gives up once this elapses.
    pub timeout: Option<Duration>,
}

impl Default for OcrRequest {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            timeout: None,
        }
    }
}

/// Tesseract CLI settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TesseractConfig {
    /// Executable; `tesseract` on PATH when unset
    pub binary_path: Option<PathBuf>,
    /// Exported as TESSDATA_PREFIX
    pub tessdata_path: Option<PathBuf>,
    /// Page segmentation mode
    pub psm: Option<u8>,
    /// OCR engine mode
    pub oem: Option<u8>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> PathBuf {
        self.binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"))
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(6)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }
}
