//! Pattern loading errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("pattern #{index} does not compile: {reason}")]
    Compile { index: usize, reason: String },

    #[error("pattern file not found: {0}")]
    NotFound(String),

    #[error("pattern file is malformed: {0}")]
    Malformed(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
