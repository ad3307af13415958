//! Redaction pipeline for pagescrub
//!
//! Classifies pages, collects candidate regions from direct search, token
//! fallback and OCR, resolves them and burns them into the document.

pub mod applier;
pub mod classify;
pub mod config;
mod error;
pub mod matching;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod resolver;

pub use applier::RedactionApplier;
pub use classify::{PageClass, PageClassifier};
pub use config::{FallbackTrigger, NoMatchOutput, OcrSettings, RedactConfig};
pub use error::{CoreError, Result};
pub use model::{Confidence, Match, Provenance, Region};
pub use pipeline::Redactor;
pub use report::{
    DocumentReport, OcrStatus, OutputDisposition, PageReport, ProvenanceCounts, RunReport,
};
pub use resolver::{Acceptance, RegionResolver};
