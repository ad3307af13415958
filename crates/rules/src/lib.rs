//! Redaction patterns: loading, validation and evaluation.

mod error;
mod file;
mod rule;
mod set;

pub use error::RuleError;
pub use file::PatternFile;
pub use rule::{PatternRule, TokenMatchMode};
pub use set::{PatternSet, PatternSpec, RejectedPattern, DEFAULT_PATTERNS};
