//! Run configuration
//!
//! Every knob of the pipeline lives in one explicit value that is threaded
//! through the driver; nothing is read from process-wide state.

use pagescrub_ocr::{OcrRequest, TesseractConfig};
use pagescrub_pdf::{ImagePolicy, Rgb};
use pagescrub_rules::TokenMatchMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// When token matching runs for a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackTrigger {
    /// Only for patterns the engine's search cannot evaluate.
    #[default]
    Unsupported,
    /// For every pattern, after direct search.
    Always,
}

/// What to write when a run finds nothing to redact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoMatchOutput {
    /// Write an unmodified copy, unless output and input are the same file.
    #[default]
    Copy,
    /// Write nothing.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrSettings {
    pub enabled: bool,
    pub dpi: u32,
    /// Tokens below this confidence (0-100) are discarded.
    pub min_confidence: f32,
    pub language: String,
    /// Zero disables the limit.
    pub timeout_secs: u64,
    /// Allowed relative difference between raster and page aspect ratios.
    pub aspect_tolerance: f64,
    pub tesseract: TesseractConfig,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dpi: 300,
            min_confidence: 50.0,
            language: "eng".to_string(),
            timeout_secs: 120,
            aspect_tolerance: 0.01,
            tesseract: TesseractConfig::default(),
        }
    }
}

impl OcrSettings {
    pub fn request(&self) -> OcrRequest {
        OcrRequest {
            language: self.language.clone(),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedactConfig {
    /// Pages with less stripped text are treated as scanned.
    pub text_threshold: usize,
    /// Text-bearing pages with no matches and less text than this get an
    /// OCR pass as well.
    pub sparse_text_threshold: usize,
    pub token_match: TokenMatchMode,
    pub fallback_trigger: FallbackTrigger,
    pub image_policy: ImagePolicy,
    pub fill_color: Rgb,
    pub no_match_output: NoMatchOutput,
    pub verify: bool,
    pub ocr: OcrSettings,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            text_threshold: 100,
            sparse_text_threshold: 500,
            token_match: TokenMatchMode::Substring,
            fallback_trigger: FallbackTrigger::Unsupported,
            image_policy: ImagePolicy::Scrub,
            fill_color: Rgb::BLACK,
            no_match_output: NoMatchOutput::Copy,
            verify: true,
            ocr: OcrSettings::default(),
        }
    }
}

impl RedactConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::info!("[Config] loaded {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ocr.dpi == 0 {
            return Err(CoreError::Config("ocr.dpi must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.ocr.min_confidence) {
            return Err(CoreError::Config(
                "ocr.minConfidence must be within 0-100".to_string(),
            ));
        }
        if self.ocr.aspect_tolerance < 0.0 {
            return Err(CoreError::Config(
                "ocr.aspectTolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RedactConfig::default();
        assert_eq!(config.text_threshold, 100);
        assert_eq!(config.sparse_text_threshold, 500);
        assert_eq!(config.image_policy, ImagePolicy::Scrub);
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.ocr.min_confidence, 50.0);
        assert_eq!(
            config.ocr.request().timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: RedactConfig = serde_json::from_str(
            r#"{
                "tokenMatch": "full-token",
                "imagePolicy": "preserve",
                "fillColor": [255, 0, 0],
                "noMatchOutput": "skip",
                "ocr": { "minConfidence": 60, "timeoutSecs": 0 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.token_match, TokenMatchMode::FullToken);
        assert_eq!(config.image_policy, ImagePolicy::Preserve);
        assert_eq!(config.fill_color, Rgb([255, 0, 0]));
        assert_eq!(config.no_match_output, NoMatchOutput::Skip);
        assert_eq!(config.ocr.min_confidence, 60.0);
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.ocr.request().timeout, None);
        assert_eq!(config.fallback_trigger, FallbackTrigger::Unsupported);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "ocr": {{ "dpi": 0 }} }}"#).unwrap();
        assert!(matches!(
            RedactConfig::load(file.path()),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RedactConfig::load(Path::new("/nonexistent/config.json")),
            Err(CoreError::Config(_))
        ));
    }
}
