//! pagescrub command-line entry point

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pagescrub_core::{RedactConfig, Redactor, RunReport};
use pagescrub_ocr::TesseractEngine;
use pagescrub_pdf::PdfiumEngine;
use pagescrub_rules::{PatternFile, PatternSet, PatternSpec};
use std::fs;
use std::process::ExitCode;

use cli::Cli;

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_patterns(cli: &Cli) -> PatternSet {
    let mut specs = PatternFile::load_or_default(&cli.patterns);
    specs.extend(cli.extra_patterns.iter().map(|p| PatternSpec::new(p.as_str())));
    let (patterns, rejected) = PatternSet::from_specs(specs);
    if !rejected.is_empty() {
        log::warn!("[Rules] {} pattern(s) rejected", rejected.len());
    }
    patterns
}

fn load_config(cli: &Cli) -> Result<RedactConfig> {
    let mut config = match &cli.config {
        Some(path) => RedactConfig::load(path)?,
        None => RedactConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<RunReport> {
    if !cli.input.is_file() {
        bail!("input file not found: {}", cli.input.display());
    }
    let output = cli.output_path();
    let config = load_config(cli)?;
    let patterns = load_patterns(cli);

    let mut redactor = Redactor::new(config.clone());
    if config.ocr.enabled {
        match TesseractEngine::new(config.ocr.tesseract.clone()) {
            Ok(engine) => {
                log::info!("[Ocr] using tesseract {}", engine.version());
                redactor = redactor.with_ocr(Box::new(engine));
            }
            Err(e) => log::warn!("[Ocr] {}, scanned pages will not be OCRed", e),
        }
    }

    let engine = PdfiumEngine::new(cli.pdfium_lib.as_deref()).context("failed to load pdfium")?;
    let report = redactor.redact_file(&engine, &cli.input, &output, &patterns)?;

    if let Some(path) = &cli.report {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(report) => {
            let counts = report.document.counts();
            println!(
                "Redacted {} region(s) (direct {}, fallback {}, ocr {}), output {:?}: {}",
                report.total(),
                counts.direct,
                counts.fallback_token,
                counts.ocr,
                report.output_disposition,
                report.output.display()
            );
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
