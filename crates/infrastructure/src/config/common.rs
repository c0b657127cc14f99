//! Config error type and shared parsing helpers.

use domain::conntrack::flags::{CompareMode, ComparisonFlags};

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

// ── Shared serde defaults ──────────────────────────────────────────

pub(super) fn default_true() -> bool {
    true
}

// ── Parsing helpers ────────────────────────────────────────────────

/// Parse a comparison scope name into its scope bits.
///
/// `none` yields the empty scope, which matches every pair of records.
pub(super) fn parse_scope(s: &str) -> Result<ComparisonFlags, ()> {
    match s.to_lowercase().as_str() {
        "all" => Ok(ComparisonFlags::ALL),
        "original" | "orig" => Ok(ComparisonFlags::ORIGINAL),
        "reply" => Ok(ComparisonFlags::REPLY),
        "both" | "tuples" => Ok(ComparisonFlags::ORIGINAL | ComparisonFlags::REPLY),
        "none" => Ok(ComparisonFlags::empty()),
        _ => Err(()),
    }
}

pub(super) fn parse_compare_mode(s: &str) -> Result<CompareMode, ()> {
    match s.to_lowercase().as_str() {
        "wildcard" | "default" => Ok(CompareMode::Wildcard),
        "mask" | "pattern" => Ok(CompareMode::Mask),
        "strict" => Ok(CompareMode::Strict),
        _ => Err(()),
    }
}

/// Parse one timeout ordering: `lt`, `gt` or `eq` (long forms accepted).
pub(super) fn parse_timeout_ordering(s: &str) -> Result<ComparisonFlags, ()> {
    match s.to_lowercase().as_str() {
        "lt" | "less" | "less_than" => Ok(ComparisonFlags::TIMEOUT_LESS_THAN),
        "gt" | "greater" | "greater_than" => Ok(ComparisonFlags::TIMEOUT_GREATER_THAN),
        "eq" | "equal" => Ok(ComparisonFlags::TIMEOUT_EQUAL),
        _ => Err(()),
    }
}
