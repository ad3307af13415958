//! YAML pattern files
//!
//! ```yaml
//! patterns:
//!   - '\b\d{8,17}\b'
//!   - name: iban
//!     pattern: '\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b'
//!     enabled: true
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::RuleError;
use crate::set::{PatternSpec, DEFAULT_PATTERNS};

#[derive(Debug, Clone, Deserialize)]
struct DetailedEntry {
    #[serde(default)]
    name: Option<String>,
    pattern: serde_yaml::Value,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawPatternFile {
    #[serde(default)]
    patterns: Vec<serde_yaml::Value>,
}

/// Scalar entries become pattern text as written; `123456789` and `'123456789'`
/// are the same pattern.
fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert one `patterns` entry. `Ok(None)` is a disabled entry.
fn convert_entry(value: serde_yaml::Value) -> Result<Option<PatternSpec>, String> {
    if let Some(pattern) = scalar_text(&value) {
        return Ok(Some(PatternSpec::new(pattern)));
    }
    match value {
        serde_yaml::Value::Mapping(_) => {
            let entry: DetailedEntry =
                serde_yaml::from_value(value).map_err(|e| e.to_string())?;
            let pattern = scalar_text(&entry.pattern)
                .ok_or_else(|| "`pattern` is not a scalar".to_string())?;
            Ok(entry.enabled.then_some(PatternSpec {
                name: entry.name,
                pattern,
            }))
        }
        serde_yaml::Value::Null => Err("empty entry".to_string()),
        _ => Err("expected a string or a mapping".to_string()),
    }
}

/// Parsed contents of a pattern file.
#[derive(Debug, Clone, Default)]
pub struct PatternFile {
    specs: Vec<PatternSpec>,
}

impl PatternFile {
    /// Parse a pattern document. Only a document whose shape is wrong is an
    /// error; individual bad entries are skipped with a warning.
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let file: Option<RawPatternFile> = serde_yaml::from_str(raw)?;
        let mut specs = Vec::new();
        for (index, value) in file.unwrap_or_default().patterns.into_iter().enumerate() {
            match convert_entry(value) {
                Ok(Some(spec)) => specs.push(spec),
                Ok(None) => {}
                Err(reason) => {
                    log::warn!("[Rules] skipping pattern entry {}: {}", index + 1, reason)
                }
            }
        }
        Ok(Self { specs })
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        if !path.exists() {
            return Err(RuleError::NotFound(path.display().to_string()));
        }
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Load `path`, falling back to [`DEFAULT_PATTERNS`] when the file is
    /// missing, malformed or lists nothing.
    pub fn load_or_default(path: &Path) -> Vec<PatternSpec> {
        match Self::load(path) {
            Ok(file) if !file.specs.is_empty() => {
                log::info!(
                    "[Rules] loaded {} patterns from {}",
                    file.specs.len(),
                    path.display()
                );
                file.specs
            }
            Ok(_) => {
                log::warn!(
                    "[Rules] no patterns in {}, using built-in defaults",
                    path.display()
                );
                default_specs()
            }
            Err(e) => {
                log::warn!("[Rules] {}, using built-in defaults", e);
                default_specs()
            }
        }
    }

    pub fn specs(&self) -> &[PatternSpec] {
        &self.specs
    }

    pub fn into_specs(self) -> Vec<PatternSpec> {
        self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn default_specs() -> Vec<PatternSpec> {
    DEFAULT_PATTERNS.iter().map(|p| PatternSpec::new(*p)).collect()
}
