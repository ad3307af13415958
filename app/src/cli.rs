//! Command-line arguments

use clap::{Parser, ValueEnum};
use pagescrub_core::RedactConfig;
use pagescrub_ocr::TesseractConfig;
use pagescrub_pdf::ImagePolicy;
use pagescrub_rules::TokenMatchMode;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenMatch {
    /// Pattern may match anywhere inside a word
    Substring,
    /// Pattern must cover the whole word
    FullToken,
}

impl From<TokenMatch> for TokenMatchMode {
    fn from(value: TokenMatch) -> Self {
        match value {
            TokenMatch::Substring => TokenMatchMode::Substring,
            TokenMatch::FullToken => TokenMatchMode::FullToken,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pagescrub", version, about = "Permanently redact sensitive numbers in PDF documents")]
pub struct Cli {
    /// PDF to redact
    pub input: PathBuf,

    /// Output path [default: <input>_redacted.<ext>]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// YAML pattern file; built-in patterns are used when it is missing
    #[arg(short, long, default_value = "patterns.yaml")]
    pub patterns: PathBuf,

    /// Extra pattern, may be repeated
    #[arg(long = "pattern", value_name = "REGEX")]
    pub extra_patterns: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Never run OCR, even on scanned pages
    #[arg(long)]
    pub no_ocr: bool,

    /// Rasterisation resolution for OCR
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Discard OCR words below this confidence (0-100)
    #[arg(long)]
    pub min_confidence: Option<f32>,

    /// Tesseract language
    #[arg(long)]
    pub ocr_lang: Option<String>,

    /// Seconds before an OCR call is abandoned, 0 for no limit
    #[arg(long, value_name = "SECS")]
    pub ocr_timeout: Option<u64>,

    /// Only cover images instead of blanking their pixels
    #[arg(long)]
    pub preserve_images: bool,

    /// How fallback patterns are applied to words
    #[arg(long, value_enum)]
    pub token_match: Option<TokenMatch>,

    /// Tesseract executable
    #[arg(long, value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// Directory or file of the pdfium shared library
    #[arg(long, value_name = "PATH")]
    pub pdfium_lib: Option<PathBuf>,

    /// Write a JSON run report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.input))
    }

    /// Apply command-line overrides on top of `config`.
    pub fn apply_overrides(&self, config: &mut RedactConfig) {
        if self.no_ocr {
            config.ocr.enabled = false;
        }
        if let Some(dpi) = self.dpi {
            config.ocr.dpi = dpi;
        }
        if let Some(min) = self.min_confidence {
            config.ocr.min_confidence = min;
        }
        if let Some(lang) = &self.ocr_lang {
            config.ocr.language = lang.clone();
        }
        if let Some(secs) = self.ocr_timeout {
            config.ocr.timeout_secs = secs;
        }
        if self.preserve_images {
            config.image_policy = ImagePolicy::Preserve;
        }
        if let Some(mode) = self.token_match {
            config.token_match = mode.into();
        }
        if let Some(binary) = &self.tesseract {
            config.ocr.tesseract = TesseractConfig {
                binary_path: Some(binary.clone()),
                ..config.ocr.tesseract.clone()
            };
        }
    }
}

/// `dir/name.pdf` becomes `dir/name_redacted.pdf`.
pub fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_redacted.{}", stem, ext.to_string_lossy()),
        None => format!("{}_redacted", stem),
    };
    input.with_file_name(name)
}
