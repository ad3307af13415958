//! Pipeline driver
//!
//! Pages are processed in index order: classify, direct search, token
//! fallback, optional OCR, resolve, commit. Each page is committed at most
//! once per run.

use pagescrub_ocr::OcrEngine;
use pagescrub_pdf::{DocumentEngine, RedactableDocument, SaveOptions, Word};
use pagescrub_rules::PatternSet;
use pagescrub_verify::verify_document;
use std::path::Path;
use std::time::Instant;

use crate::applier::RedactionApplier;
use crate::classify::{PageClass, PageClassifier};
use crate::config::{FallbackTrigger, NoMatchOutput, RedactConfig};
use crate::error::{CoreError, Result};
use crate::matching::{match_direct, match_tokens, recognize_page, DirectOutcome};
use crate::report::{DocumentReport, OcrStatus, OutputDisposition, PageReport, ProvenanceCounts, RunReport};
use crate::resolver::RegionResolver;

pub struct Redactor {
    config: RedactConfig,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl Redactor {
    pub fn new(config: RedactConfig) -> Self {
        Self { config, ocr: None }
    }

    pub fn with_ocr(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn config(&self) -> &RedactConfig {
        &self.config
    }

    /// Redact every page of an open document in place.
    ///
    /// An encrypted document is first unlocked with the empty password; any
    /// other protection fails the run before a page is touched.
    pub fn redact_document<D: RedactableDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        patterns: &PatternSet,
    ) -> Result<DocumentReport> {
        if patterns.is_empty() {
            return Err(CoreError::NoPatterns);
        }

        let encrypted = doc.is_encrypted();
        if encrypted {
            if !doc.authenticate("") {
                log::error!("[Pipeline] document needs a password, aborting");
                return Err(CoreError::UnsupportedEncryption);
            }
            log::info!("[Pipeline] encrypted document opened with the empty password");
        }

        let start = Instant::now();
        let page_count = doc.page_count();
        log::info!(
            "[Pipeline] {} page(s), {} pattern(s)",
            page_count,
            patterns.len()
        );

        let mut pages = Vec::with_capacity(page_count);
        for page in 0..page_count {
            pages.push(self.redact_page(doc, page, patterns)?);
        }

        let total = pages.iter().map(PageReport::committed).sum();
        log::info!(
            "[Pipeline] done: {} region(s) across {} page(s) in {} ms",
            total,
            page_count,
            start.elapsed().as_millis()
        );

        Ok(DocumentReport {
            pages,
            total,
            encrypted,
        })
    }

    fn redact_page<D: RedactableDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        page: usize,
        patterns: &PatternSet,
    ) -> Result<PageReport> {
        let classifier = PageClassifier::new(self.config.text_threshold, self.config.sparse_text_threshold);
        let text = doc.page_text(page)?;
        let class = classifier.classify(&text);

        let mut candidates = Vec::new();
        let mut unsupported = Vec::new();
        let mut words: Option<Vec<Word>> = None;

        for (pattern_index, rule) in patterns.iter().enumerate() {
            let run_tokens = match match_direct(&*doc, page, pattern_index, rule)? {
                DirectOutcome::Matches(found) => {
                    candidates.extend(found);
                    self.config.fallback_trigger == FallbackTrigger::Always
                }
                DirectOutcome::Unsupported { reason } => {
                    log::debug!(
                        "[Direct] page {} pattern {}: engine search cannot evaluate it ({}), matching tokens",
                        page,
                        pattern_index,
                        reason
                    );
                    unsupported.push(pattern_index);
                    true
                }
            };

            if run_tokens {
                if words.is_none() {
                    words = Some(doc.page_words(page)?);
                }
                if let Some(words) = &words {
                    let found = match_tokens(words, pattern_index, rule, self.config.token_match);
                    log::debug!(
                        "[Fallback] page {} pattern {}: {} token match(es)",
                        page,
                        pattern_index,
                        found.len()
                    );
                    candidates.extend(found);
                }
            }
        }

        let promoted = classifier.should_promote(class, &text, candidates.len());
        let ocr = if class == PageClass::LikelyScanned || promoted {
            match self.ocr.as_mut() {
                Some(engine) if self.config.ocr.enabled => {
                    let pass = recognize_page(&*doc, page, &mut **engine, patterns, &self.config.ocr)?;
                    candidates.extend(pass.matches);
                    pass.status
                }
                _ => {
                    log::warn!("[Ocr] page {} needs OCR but no engine is enabled", page);
                    OcrStatus::Disabled
                }
            }
        } else {
            OcrStatus::NotRun
        };

        let regions = RegionResolver::resolve(candidates);
        let applier = RedactionApplier::new(self.config.fill_color, self.config.image_policy);
        let summary = applier.apply(doc, page, &regions)?;
        if summary.images_unscrubbed > 0 {
            log::warn!(
                "[Pipeline] page {}: {} image(s) under a region kept their pixels, only the overlay hides them",
                page,
                summary.images_unscrubbed
            );
        }

        let counts = ProvenanceCounts::tally(&regions);
        log::info!(
            "[Pipeline] page {}: {:?}{}, {} region(s) (direct {}, fallback {}, ocr {})",
            page,
            class,
            if promoted { " (promoted)" } else { "" },
            regions.len(),
            counts.direct,
            counts.fallback_token,
            counts.ocr
        );

        Ok(PageReport {
            index: page,
            class,
            promoted,
            regions,
            counts,
            ocr,
            unsupported_patterns: unsupported,
            images_unscrubbed: summary.images_unscrubbed,
        })
    }

    /// Open `input`, redact it and write the result to `output`.
    ///
    /// A run with no regions writes an unmodified copy or nothing, per
    /// [`NoMatchOutput`]; a copy is never written over the input itself.
    /// Verification failures are reported as warnings, not errors.
    pub fn redact_file<E: DocumentEngine>(
        &mut self,
        engine: &E,
        input: &Path,
        output: &Path,
        patterns: &PatternSet,
    ) -> Result<RunReport> {
        let mut doc = engine.open(input).map_err(|source| CoreError::Open {
            path: input.to_path_buf(),
            source,
        })?;
        let document = self.redact_document(&mut doc, patterns)?;

        let disposition = if document.total > 0 {
            doc.save(output, &SaveOptions::redacted())?;
            OutputDisposition::Written
        } else {
            match self.config.no_match_output {
                NoMatchOutput::Copy if !same_file(input, output) => {
                    doc.save(output, &SaveOptions::copy())?;
                    OutputDisposition::CopiedUnmodified
                }
                _ => OutputDisposition::NotWritten,
            }
        };
        log::info!("[Pipeline] output {}: {:?}", output.display(), disposition);

        let mut warnings: Vec<String> = document
            .pages
            .iter()
            .filter_map(|p| match &p.ocr {
                OcrStatus::Failed { reason } => Some(format!("page {}: OCR failed: {}", p.index, reason)),
                OcrStatus::TimedOut => Some(format!("page {}: OCR timed out", p.index)),
                OcrStatus::Disabled => Some(format!("page {}: needs OCR but OCR is disabled", p.index)),
                _ => None,
            })
            .collect();
        warnings.extend(document.pages.iter().filter(|p| p.images_unscrubbed > 0).map(|p| {
            format!(
                "page {}: {} image(s) under a region could not be scrubbed, only covered",
                p.index, p.images_unscrubbed
            )
        }));

        let verification = if self.config.verify && disposition != OutputDisposition::NotWritten {
            match reverify(engine, output, patterns) {
                Ok(result) => {
                    warnings.extend(result.warnings.iter().cloned());
                    Some(result)
                }
                Err(e) => {
                    log::warn!("[Verify] could not re-open {}: {}", output.display(), e);
                    warnings.push(format!("verification skipped: {}", e));
                    None
                }
            }
        } else {
            None
        };

        Ok(RunReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            document,
            output_disposition: disposition,
            verification,
            warnings,
        })
    }
}

fn reverify<E: DocumentEngine>(
    engine: &E,
    path: &Path,
    patterns: &PatternSet,
) -> std::result::Result<pagescrub_verify::VerifyResult, pagescrub_pdf::PdfError> {
    let mut doc = engine.open(path)?;
    if doc.is_encrypted() && !doc.authenticate("") {
        return Err(pagescrub_pdf::PdfError::PasswordRequired);
    }
    verify_document(&doc, patterns)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
