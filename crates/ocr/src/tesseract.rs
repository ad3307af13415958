//! Tesseract OCR engine (CLI wrapper)

use image::{DynamicImage, ImageFormat};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{OcrRequest, OcrWord, PixelBox, TesseractConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Word-level rows of `tesseract ... tsv` output.
const WORD_LEVEL: i32 = 5;

pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// Probes the binary; fails when it cannot be executed.
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(&config.binary_or_default())?;
        log::info!("[Tesseract] version {}", version);
        Ok(Self { config, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn command(&self, input: &Path, output_base: &Path, language: &str) -> Command {
        let mut cmd = Command::new(self.config.binary_or_default());
        cmd.arg(input)
            .arg(output_base)
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string())
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if let Some(tessdata) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }
        cmd
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(
        &mut self,
        image: &DynamicImage,
        request: &OcrRequest,
    ) -> Result<Vec<OcrWord>, OcrError> {
        let start = Instant::now();
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("page.png");
        let output_base = scratch.path().join("page");
        image.save_with_format(&input, ImageFormat::Png)?;

        log::debug!(
            "[Tesseract] {}x{} px, -l {} --psm {} --oem {}",
            image.width(),
            image.height(),
            request.language,
            self.config.psm_or_default(),
            self.config.oem_or_default()
        );

        let command = self.command(&input, &output_base, &request.language);
        let (status, stderr) = run_with_deadline(command, request.timeout)?;

        if !status.success() {
            return Err(OcrError::Process(format!("{}: {}", status, stderr.trim())));
        }

        let tsv = std::fs::read_to_string(output_base.with_extension("tsv"))?;
        let words = parse_tsv(&tsv)?;

        log::info!(
            "[Tesseract] {} word(s) in {} ms",
            words.len(),
            start.elapsed().as_millis()
        );
        Ok(words)
    }
}

/// Spawn `command` and wait for it under `timeout`.
///
/// Stderr is drained on a separate thread so a chatty child never blocks
/// on a full pipe while we poll for its exit.
fn run_with_deadline(
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<(ExitStatus, String), OcrError> {
    let mut child = command
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OcrError::Binary(e.to_string()))?;
    let drain = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                log::debug!("[Tesseract] reading stderr failed: {}", e);
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = wait_with_deadline(&mut child, timeout);
    let stderr = drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    Ok((status?, stderr))
}

/// Wait for `child`, killing it once `timeout` elapses.
fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, OcrError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    log::debug!("[Tesseract] kill after timeout failed: {}", e);
                }
                child.wait()?;
                return Err(OcrError::Timeout(timeout));
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Parse tesseract TSV output into word-level results.
///
/// Columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Rows above word level, rows with negative
/// confidence and blank words are dropped.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, OcrError> {
    let mut lines = tsv.lines();
    match lines.next() {
        None => return Ok(Vec::new()),
        Some(header) if header.starts_with("level") => {}
        Some(_) => return Err(OcrError::Parse("missing TSV header".to_string())),
    }

    let mut words = Vec::new();
    for (row, line) in lines.enumerate() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        if cols[0].parse::<i32>().ok() != Some(WORD_LEVEL) {
            continue;
        }

        let number = |i: usize| -> Result<u32, OcrError> {
            cols[i]
                .parse()
                .map_err(|_| OcrError::Parse(format!("row {}: column {} is not a number", row + 1, i)))
        };
        let confidence: f32 = cols[10]
            .parse()
            .map_err(|_| OcrError::Parse(format!("row {}: bad confidence", row + 1)))?;
        let text = cols[11].trim();
        if confidence < 0.0 || text.is_empty() {
            continue;
        }

        words.push(OcrWord {
            text: text.to_string(),
            confidence,
            bbox: PixelBox::new(number(6)?, number(7)?, number(8)?, number(9)?),
        });
    }
    Ok(words)
}

/// Version reported by `<binary> --version`.
pub fn get_tesseract_version(binary: &Path) -> Result<String, OcrError> {
    let output = Command::new(binary)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::Binary(format!("{}: {}", binary.display(), e)))?;

    if !output.status.success() {
        return Err(OcrError::Binary(format!(
            "{} --version exited with {}",
            binary.display(),
            output.status
        )));
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let version = combined
        .lines()
        .find(|line| line.to_lowercase().contains("tesseract"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_word_level() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t2550\t3300\t-1\t\n\
             4\t1\t1\t1\t1\t0\t100\t200\t800\t40\t-1\t\n\
             5\t1\t1\t1\t1\t1\t100\t200\t300\t40\t96.5\tAccount\n\
             5\t1\t1\t1\t1\t2\t420\t200\t380\t40\t80\t123456789\n\
             5\t1\t1\t1\t1\t3\t820\t200\t10\t40\t-1\t \n\
             5\t1\t1\t1\t1\t4\t840\t200\t90\t40\t12\t  \n"
        );

        let words = parse_tsv(&tsv).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Account");
        assert_eq!(words[0].confidence, 96.5);
        assert_eq!(words[1].text, "123456789");
        assert_eq!(words[1].bbox, PixelBox::new(420, 200, 380, 40));
    }

    #[test]
    fn test_parse_tsv_empty_and_garbage() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(parse_tsv(HEADER).unwrap().is_empty());
        assert!(matches!(parse_tsv("not tsv"), Err(OcrError::Parse(_))));

        let bad = format!("{HEADER}\n5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword\n");
        assert!(matches!(parse_tsv(&bad), Err(OcrError::Parse(_))));
    }

    #[test]
    fn test_missing_binary() {
        let config = TesseractConfig {
            binary_path: Some("/nonexistent/tesseract".into()),
            ..Default::default()
        };
        assert!(matches!(TesseractEngine::new(config), Err(OcrError::Binary(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_process_is_killed() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let start = Instant::now();
        let result = wait_with_deadline(&mut child, Some(Duration::from_millis(100)));
        assert!(matches!(result, Err(OcrError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_stderr_does_not_stall() {
        // Far more than a pipe buffer holds.
        let mut command = Command::new("sh");
        command.arg("-c").arg("head -c 300000 /dev/zero | tr '\\0' x >&2");
        let start = Instant::now();
        let (status, stderr) = run_with_deadline(command, Some(Duration::from_secs(10))).unwrap();
        assert!(status.success());
        assert_eq!(stderr.len(), 300000);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_process_keeps_stderr() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo 'Error opening data file' >&2; exit 1");
        let (status, stderr) = run_with_deadline(command, None).unwrap();
        assert!(!status.success());
        assert!(stderr.contains("Error opening data file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_fast_process_completes() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(&mut child, Some(Duration::from_secs(5))).unwrap();
        assert!(status.success());
    }
}
