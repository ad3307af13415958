use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pagescrub() -> Command {
    Command::cargo_bin("pagescrub").unwrap()
}

#[test]
fn test_help_lists_options() {
    pagescrub()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--patterns"))
        .stdout(predicate::str::contains("--preserve-images"))
        .stdout(predicate::str::contains("--no-ocr"));
}

#[test]
fn test_missing_input_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.pdf");

    pagescrub()
        .arg(&missing)
        .arg("--no-ocr")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("input file not found"));

    assert!(!dir.path().join("missing_redacted.pdf").exists());
}

#[test]
fn test_bad_config_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("doc.pdf");
    std::fs::write(&input, b"%PDF-1.4\n").unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{ "ocr": { "minConfidence": 150 } }"#).unwrap();

    pagescrub()
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_requires_input() {
    pagescrub().assert().failure();
}
